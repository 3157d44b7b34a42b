//! Mechanical outcomes and their pure resolution rules
//!
//! Outcomes are best-effort annotations produced by an upstream narrative
//! process; unrecognized types deserialize to [`MechanicalOutcome::Unknown`]
//! and are treated as no-ops rather than failures. The resolution functions
//! here are pure: they compute what would change without touching state,
//! so the applier can build a patch and the caller can decide about
//! escalations and saving throws.

use serde::{Deserialize, Serialize};

use crate::battle::{BattleState, CONDITION_UNCONSCIOUS};

/// A structured mechanical outcome to apply to a character's battle state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MechanicalOutcome {
    Damage {
        amount: i32,
        #[serde(default)]
        critical: bool,
    },
    Healing {
        amount: i32,
    },
    ConditionAdd {
        condition: String,
    },
    ConditionRemove {
        condition: String,
    },
    SpellSlotUse {
        level: u8,
    },
    ConcentrationStart {
        spell_name: String,
    },
    ConcentrationBreak,
    /// Any outcome type this engine does not recognize. Logged and ignored.
    #[serde(other)]
    Unknown,
}

/// What applying damage would do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageResolution {
    pub absorbed_by_temp: i32,
    pub temp_after: i32,
    pub hp_after: i32,
    /// The character was above 0 HP and this damage brought them to
    /// exactly 0 - the death/unconscious escalation boundary.
    pub dropped_to_zero: bool,
}

/// Damage absorbs into temporary HP first; the remainder reduces current
/// HP, floored at 0.
pub fn resolve_damage(state: &BattleState, amount: i32) -> DamageResolution {
    let amount = amount.max(0);
    let absorbed = state.hp_temp.min(amount);
    let remainder = amount - absorbed;
    let hp_after = (state.hp_current - remainder).max(0);

    DamageResolution {
        absorbed_by_temp: absorbed,
        temp_after: state.hp_temp - absorbed,
        hp_after,
        dropped_to_zero: state.hp_current > 0 && hp_after == 0,
    }
}

/// What applying healing would do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealingResolution {
    pub hp_after: i32,
    pub healed: i32,
    /// The character was at exactly 0 HP and unconscious - the revive
    /// escalation boundary.
    pub revived_from_zero: bool,
}

/// Healing raises current HP, capped at the maximum. Temporary HP is
/// untouched.
pub fn resolve_healing(state: &BattleState, amount: i32) -> HealingResolution {
    let amount = amount.max(0);
    let hp_after = (state.hp_current + amount).min(state.hp_max);

    HealingResolution {
        hp_after,
        healed: hp_after - state.hp_current,
        revived_from_zero: state.hp_current == 0
            && hp_after > 0
            && state.conditions.contains(CONDITION_UNCONSCIOUS),
    }
}

/// The Constitution saving-throw DC to maintain concentration after
/// taking damage: `max(10, floor(damage / 2))`.
pub fn concentration_check_dc(damage: i32) -> i32 {
    (damage.max(0) / 2).max(10)
}
