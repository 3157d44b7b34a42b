//! Live battle state for a character within a session
//!
//! Distinct from the permanent character record: this is the transient
//! state combat and rest mechanics mutate. It is created by copying from
//! the permanent record when a session activates and optionally synced
//! back (HP, accumulated XP) when the session ends.
//!
//! All mutation goes through [`BattleState::apply`] with a
//! [`BattleStatePatch`]; every applied patch is captured in the embedded
//! append-only change log.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{CharacterId, SessionId, UserId};

/// Condition name used by the revive escalation boundary check.
pub const CONDITION_UNCONSCIOUS: &str = "unconscious";

/// Availability of spell slots at one slot level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotState {
    pub max: u8,
    pub used: u8,
}

impl SlotState {
    pub fn fresh(max: u8) -> Self {
        Self { max, used: 0 }
    }

    pub fn available(self) -> u8 {
        self.max.saturating_sub(self.used)
    }
}

/// A character's hit-dice pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HitDice {
    /// Die size (8 for a d8).
    pub die: u8,
    pub total: u8,
    pub remaining: u8,
}

impl HitDice {
    pub fn fresh(die: u8, total: u8) -> Self {
        Self {
            die,
            total,
            remaining: total,
        }
    }
}

/// Death saving throw tallies while at 0 HP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeathSaves {
    pub successes: u8,
    pub failures: u8,
}

/// An ongoing concentration effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Concentration {
    pub spell_name: String,
    pub started_round: u32,
}

/// One entry in the battle-state change log.
///
/// Captures the raw requested patch, not the resulting state; replaying
/// the log against the initial state reproduces the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleLogEntry {
    pub at: DateTime<Utc>,
    pub actor: UserId,
    pub reason: String,
    pub changes: serde_json::Value,
}

/// Live, session-scoped battle state for one character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleState {
    pub session_id: SessionId,
    pub character_id: CharacterId,
    pub hp_current: i32,
    pub hp_max: i32,
    pub hp_temp: i32,
    pub conditions: BTreeSet<String>,
    pub spell_slots: BTreeMap<u8, SlotState>,
    pub hit_dice: HitDice,
    pub class_resources: BTreeMap<String, i32>,
    pub inspiration: bool,
    pub death_saves: DeathSaves,
    pub concentration: Option<Concentration>,
    pub xp_gained: i64,
    pub change_log: Vec<BattleLogEntry>,
}

impl BattleState {
    /// Fully-populated initial state, as copied from a permanent character
    /// record at session activation. There is no partial construction and
    /// no default-filling at read time.
    pub fn new(
        session_id: SessionId,
        character_id: CharacterId,
        hp_max: i32,
        hit_dice: HitDice,
        spell_slots: BTreeMap<u8, SlotState>,
    ) -> Self {
        Self {
            session_id,
            character_id,
            hp_current: hp_max,
            hp_max,
            hp_temp: 0,
            conditions: BTreeSet::new(),
            spell_slots,
            hit_dice,
            class_resources: BTreeMap::new(),
            inspiration: false,
            death_saves: DeathSaves::default(),
            concentration: None,
            xp_gained: 0,
            change_log: Vec::new(),
        }
    }

    /// Apply a patch: only supplied fields change. HP fields are clamped
    /// to their invariants; set- and map-valued fields are replaced
    /// wholesale.
    pub fn apply(&mut self, patch: &BattleStatePatch) {
        if let Some(hp_max) = patch.hp_max {
            self.hp_max = hp_max.max(0);
        }
        if let Some(hp_current) = patch.hp_current {
            self.hp_current = hp_current.clamp(0, self.hp_max);
        } else {
            // A lowered maximum still clamps the current value.
            self.hp_current = self.hp_current.clamp(0, self.hp_max);
        }
        if let Some(hp_temp) = patch.hp_temp {
            self.hp_temp = hp_temp.max(0);
        }
        if let Some(conditions) = &patch.conditions {
            self.conditions = conditions.clone();
        }
        if let Some(spell_slots) = &patch.spell_slots {
            self.spell_slots = spell_slots.clone();
        }
        if let Some(mut hit_dice) = patch.hit_dice {
            hit_dice.remaining = hit_dice.remaining.min(hit_dice.total);
            self.hit_dice = hit_dice;
        }
        if let Some(class_resources) = &patch.class_resources {
            self.class_resources = class_resources.clone();
        }
        if let Some(inspiration) = patch.inspiration {
            self.inspiration = inspiration;
        }
        if let Some(death_saves) = patch.death_saves {
            self.death_saves = death_saves;
        }
        if let Some(concentration) = &patch.concentration {
            self.concentration = concentration.clone();
        }
        if let Some(xp_gained) = patch.xp_gained {
            self.xp_gained = xp_gained;
        }
    }

    /// Append a change-log entry. The log is append-only; nothing ever
    /// rewrites or removes entries.
    pub fn record(&mut self, entry: BattleLogEntry) {
        self.change_log.push(entry);
    }

    /// Invariants every stored state satisfies.
    pub fn is_consistent(&self) -> bool {
        0 <= self.hp_current
            && self.hp_current <= self.hp_max
            && self.hp_temp >= 0
            && self.hit_dice.remaining <= self.hit_dice.total
    }
}

/// A partial update to a [`BattleState`]. `None` fields are untouched.
///
/// `concentration` uses a nested option: the outer level marks the field
/// as supplied, the inner level is the new value (`Some(None)` clears).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleStatePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hp_current: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hp_max: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hp_temp: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spell_slots: Option<BTreeMap<u8, SlotState>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hit_dice: Option<HitDice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_resources: Option<BTreeMap<String, i32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inspiration: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub death_saves: Option<DeathSaves>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concentration: Option<Option<Concentration>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xp_gained: Option<i64>,
}

impl BattleStatePatch {
    /// True when no field is supplied; applying such a patch is a pure
    /// no-op and must not produce a change-log entry.
    pub fn is_empty(&self) -> bool {
        self.hp_current.is_none()
            && self.hp_max.is_none()
            && self.hp_temp.is_none()
            && self.conditions.is_none()
            && self.spell_slots.is_none()
            && self.hit_dice.is_none()
            && self.class_resources.is_none()
            && self.inspiration.is_none()
            && self.death_saves.is_none()
            && self.concentration.is_none()
            && self.xp_gained.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> BattleState {
        BattleState::new(
            SessionId::new(),
            CharacterId::new(),
            20,
            HitDice::fresh(8, 3),
            BTreeMap::from([(1, SlotState::fresh(4)), (2, SlotState::fresh(2))]),
        )
    }

    #[test]
    fn new_state_is_fully_populated_and_consistent() {
        let state = state();
        assert_eq!(state.hp_current, 20);
        assert_eq!(state.hp_temp, 0);
        assert_eq!(state.hit_dice.remaining, 3);
        assert!(state.conditions.is_empty());
        assert!(state.change_log.is_empty());
        assert!(state.is_consistent());
    }

    #[test]
    fn hp_current_is_clamped_to_the_valid_range() {
        let mut state = state();
        state.apply(&BattleStatePatch {
            hp_current: Some(99),
            ..Default::default()
        });
        assert_eq!(state.hp_current, 20);

        state.apply(&BattleStatePatch {
            hp_current: Some(-5),
            ..Default::default()
        });
        assert_eq!(state.hp_current, 0);
    }

    #[test]
    fn lowering_hp_max_clamps_current() {
        let mut state = state();
        state.apply(&BattleStatePatch {
            hp_max: Some(12),
            ..Default::default()
        });
        assert_eq!(state.hp_max, 12);
        assert_eq!(state.hp_current, 12);
        assert!(state.is_consistent());
    }

    #[test]
    fn temporary_hp_never_goes_negative() {
        let mut state = state();
        state.apply(&BattleStatePatch {
            hp_temp: Some(-3),
            ..Default::default()
        });
        assert_eq!(state.hp_temp, 0);
    }

    #[test]
    fn set_valued_fields_are_replaced_wholesale() {
        let mut state = state();
        state.conditions.insert("poisoned".to_string());

        state.apply(&BattleStatePatch {
            conditions: Some(BTreeSet::from(["stunned".to_string()])),
            ..Default::default()
        });
        assert!(!state.conditions.contains("poisoned"));
        assert!(state.conditions.contains("stunned"));
    }

    #[test]
    fn hit_dice_remaining_is_clamped_to_total() {
        let mut state = state();
        state.apply(&BattleStatePatch {
            hit_dice: Some(HitDice {
                die: 8,
                total: 3,
                remaining: 7,
            }),
            ..Default::default()
        });
        assert_eq!(state.hit_dice.remaining, 3);
    }

    #[test]
    fn concentration_supports_set_and_clear() {
        let mut state = state();
        state.apply(&BattleStatePatch {
            concentration: Some(Some(Concentration {
                spell_name: "Bless".to_string(),
                started_round: 2,
            })),
            ..Default::default()
        });
        assert!(state.concentration.is_some());

        state.apply(&BattleStatePatch {
            concentration: Some(None),
            ..Default::default()
        });
        assert!(state.concentration.is_none());
    }

    #[test]
    fn empty_patch_is_detected() {
        assert!(BattleStatePatch::default().is_empty());
        assert!(!BattleStatePatch {
            hp_current: Some(1),
            ..Default::default()
        }
        .is_empty());
    }
}
