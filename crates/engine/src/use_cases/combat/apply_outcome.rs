//! Mechanical outcome application.
//!
//! Translates a structured outcome into one locked battle-state patch.
//! The zero-HP and heal-from-0 boundaries delegate to the escalation
//! collaborator after the state is committed; unrecognized outcome types
//! are logged and ignored so a best-effort upstream can never abort
//! gameplay.

use std::sync::Arc;

use dmforge_domain::{
    concentration_check_dc, resolve_damage, resolve_healing, BattleLogEntry, BattleState,
    BattleStatePatch, CharacterId, Concentration, MechanicalOutcome, SessionId, UserId,
};

use crate::infrastructure::locks::{LockKey, LockRegistry};
use crate::infrastructure::ports::{
    BattleStateRepo, ClockPort, EscalationPort, RepoError, SessionStateRepo,
};

use super::patch_state::BattleStateError;

/// The result of applying one outcome.
#[derive(Debug, Clone)]
pub struct AppliedOutcome {
    pub state: BattleState,
    /// Set when damage hit a concentrating character: the Constitution
    /// save DC to maintain concentration. Collecting the roll (and
    /// breaking concentration on a failure) is the caller's decision.
    pub concentration_dc: Option<i32>,
}

pub struct ApplyOutcome {
    battle: Arc<dyn BattleStateRepo>,
    sessions: Arc<dyn SessionStateRepo>,
    escalation: Arc<dyn EscalationPort>,
    locks: Arc<LockRegistry>,
    clock: Arc<dyn ClockPort>,
}

impl ApplyOutcome {
    pub fn new(
        battle: Arc<dyn BattleStateRepo>,
        sessions: Arc<dyn SessionStateRepo>,
        escalation: Arc<dyn EscalationPort>,
        locks: Arc<LockRegistry>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            battle,
            sessions,
            escalation,
            locks,
            clock,
        }
    }

    pub async fn execute(
        &self,
        session_id: SessionId,
        character_id: CharacterId,
        outcome: MechanicalOutcome,
        actor: UserId,
    ) -> Result<AppliedOutcome, BattleStateError> {
        let _lock = self
            .locks
            .acquire(LockKey::Battle(session_id, character_id))
            .await;

        let mut state = self
            .battle
            .get(session_id, character_id)
            .await?
            .ok_or(BattleStateError::NotFound {
                session: session_id,
                character: character_id,
            })?;

        let mut concentration_dc = None;
        let mut escalate_zero_hp: Option<(i32, bool)> = None;
        let mut escalate_revive = false;

        let (patch, reason) = match &outcome {
            MechanicalOutcome::Damage { amount, critical } => {
                let resolution = resolve_damage(&state, *amount);
                if resolution.dropped_to_zero {
                    escalate_zero_hp = Some((*amount, *critical));
                }
                if state.concentration.is_some() {
                    concentration_dc = Some(concentration_check_dc(*amount));
                }
                (
                    BattleStatePatch {
                        hp_current: Some(resolution.hp_after),
                        hp_temp: Some(resolution.temp_after),
                        ..Default::default()
                    },
                    "damage",
                )
            }
            MechanicalOutcome::Healing { amount } => {
                let resolution = resolve_healing(&state, *amount);
                escalate_revive = resolution.revived_from_zero;
                (
                    BattleStatePatch {
                        hp_current: Some(resolution.hp_after),
                        ..Default::default()
                    },
                    "healing",
                )
            }
            MechanicalOutcome::ConditionAdd { condition } => {
                if state.conditions.contains(condition) {
                    return Ok(AppliedOutcome {
                        state,
                        concentration_dc: None,
                    });
                }
                let mut conditions = state.conditions.clone();
                conditions.insert(condition.clone());
                (
                    BattleStatePatch {
                        conditions: Some(conditions),
                        ..Default::default()
                    },
                    "condition_add",
                )
            }
            MechanicalOutcome::ConditionRemove { condition } => {
                if !state.conditions.contains(condition) {
                    return Ok(AppliedOutcome {
                        state,
                        concentration_dc: None,
                    });
                }
                let mut conditions = state.conditions.clone();
                conditions.remove(condition);
                (
                    BattleStatePatch {
                        conditions: Some(conditions),
                        ..Default::default()
                    },
                    "condition_remove",
                )
            }
            MechanicalOutcome::SpellSlotUse { level } => {
                let Some(slot) = state.spell_slots.get(level).copied() else {
                    // No slots at this level: silently inapplicable.
                    tracing::debug!(level = *level, "Spell slot use ignored: no slots at level");
                    return Ok(AppliedOutcome {
                        state,
                        concentration_dc: None,
                    });
                };
                if slot.used >= slot.max {
                    tracing::debug!(level = *level, "Spell slot use ignored: level exhausted");
                    return Ok(AppliedOutcome {
                        state,
                        concentration_dc: None,
                    });
                }
                let mut spell_slots = state.spell_slots.clone();
                if let Some(entry) = spell_slots.get_mut(level) {
                    entry.used += 1;
                }
                (
                    BattleStatePatch {
                        spell_slots: Some(spell_slots),
                        ..Default::default()
                    },
                    "spell_slot_use",
                )
            }
            MechanicalOutcome::ConcentrationStart { spell_name } => {
                let started_round = self
                    .sessions
                    .get(session_id)
                    .await?
                    .map(|s| s.round_number)
                    .unwrap_or(1);
                (
                    BattleStatePatch {
                        concentration: Some(Some(Concentration {
                            spell_name: spell_name.clone(),
                            started_round,
                        })),
                        ..Default::default()
                    },
                    "concentration_start",
                )
            }
            MechanicalOutcome::ConcentrationBreak => (
                BattleStatePatch {
                    concentration: Some(None),
                    ..Default::default()
                },
                "concentration_break",
            ),
            MechanicalOutcome::Unknown => {
                tracing::warn!(
                    session_id = %session_id,
                    character_id = %character_id,
                    "Unrecognized mechanical outcome type ignored"
                );
                return Ok(AppliedOutcome {
                    state,
                    concentration_dc: None,
                });
            }
        };

        let changes = serde_json::to_value(&patch).map_err(RepoError::from)?;
        state.apply(&patch);
        state.record(BattleLogEntry {
            at: self.clock.now(),
            actor,
            reason: reason.to_string(),
            changes,
        });
        self.battle.put(&state).await?;

        // Boundary escalations fire after the state is committed, exactly
        // once per crossing.
        if let Some((damage, critical)) = escalate_zero_hp {
            self.escalation
                .on_zero_hp(session_id, character_id, damage, critical)
                .await;
        }
        if escalate_revive {
            self.escalation.on_revive(session_id, character_id).await;
        }

        Ok(AppliedOutcome {
            state,
            concentration_dc,
        })
    }
}
