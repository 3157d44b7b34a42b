//! Rest resolution.
//!
//! Short rests are interactive: each hit die is spent explicitly and
//! heals its roll plus the Constitution modifier (never less than 1).
//! Long rests are a bulk reset across every live state in the session.
//! The asymmetry is intentional - a short rest restores nothing beyond
//! the dice a player chooses to spend.

use std::sync::Arc;

use dmforge_domain::{
    game_systems, BattleLogEntry, BattleState, BattleStatePatch, CharacterId, DeathSaves,
    DiceFormula, HitDice, SessionId, SlotState, UserId,
};

use crate::infrastructure::locks::{LockKey, LockRegistry};
use crate::infrastructure::ports::{
    BattleStateRepo, CharacterRecordRepo, ClockPort, RandomPort, RepoError,
};
use crate::use_cases::ErrorKind;

#[derive(Debug, thiserror::Error)]
pub enum RestError {
    #[error("No hit dice remaining")]
    NoHitDiceRemaining,
    #[error("Live battle state not found for character {character} in session {session}")]
    StateNotFound {
        session: SessionId,
        character: CharacterId,
    },
    #[error("Character record not found: {0}")]
    CharacterNotFound(CharacterId),
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
}

impl RestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoHitDiceRemaining => ErrorKind::Conflict,
            Self::StateNotFound { .. } | Self::CharacterNotFound(_) => ErrorKind::NotFound,
            Self::Repo(RepoError::NotFound) => ErrorKind::NotFound,
            Self::Repo(_) => ErrorKind::Unavailable,
        }
    }
}

/// The result of spending one hit die.
#[derive(Debug, Clone)]
pub struct HitDieSpend {
    pub state: BattleState,
    pub rolled: i32,
    pub healed: i32,
}

/// Short rest: spend one hit die.
pub struct SpendHitDie {
    battle: Arc<dyn BattleStateRepo>,
    records: Arc<dyn CharacterRecordRepo>,
    locks: Arc<LockRegistry>,
    clock: Arc<dyn ClockPort>,
    random: Arc<dyn RandomPort>,
}

impl SpendHitDie {
    pub fn new(
        battle: Arc<dyn BattleStateRepo>,
        records: Arc<dyn CharacterRecordRepo>,
        locks: Arc<LockRegistry>,
        clock: Arc<dyn ClockPort>,
        random: Arc<dyn RandomPort>,
    ) -> Self {
        Self {
            battle,
            records,
            locks,
            clock,
            random,
        }
    }

    pub async fn execute(
        &self,
        session_id: SessionId,
        character_id: CharacterId,
        actor: UserId,
    ) -> Result<HitDieSpend, RestError> {
        let _lock = self
            .locks
            .acquire(LockKey::Battle(session_id, character_id))
            .await;

        let mut state = self
            .battle
            .get(session_id, character_id)
            .await?
            .ok_or(RestError::StateNotFound {
                session: session_id,
                character: character_id,
            })?;

        if state.hit_dice.remaining == 0 {
            return Err(RestError::NoHitDiceRemaining);
        }

        let record = self
            .records
            .get(character_id)
            .await?
            .ok_or(RestError::CharacterNotFound(character_id))?;
        let con_modifier = game_systems::ability_modifier(record.abilities.constitution);

        let roll = DiceFormula {
            dice_count: 1,
            die_size: state.hit_dice.die,
            modifier: con_modifier,
        }
        .roll_with(|die| self.random.gen_range(1, die as i32));
        let rolled = roll.dice_total;
        let healed = roll.total.max(1);

        let patch = BattleStatePatch {
            hp_current: Some(state.hp_current + healed),
            hit_dice: Some(HitDice {
                die: state.hit_dice.die,
                total: state.hit_dice.total,
                remaining: state.hit_dice.remaining - 1,
            }),
            ..Default::default()
        };

        let changes = serde_json::to_value(&patch).map_err(RepoError::from)?;
        state.apply(&patch);
        state.record(BattleLogEntry {
            at: self.clock.now(),
            actor,
            reason: "short_rest_hit_die".to_string(),
            changes,
        });
        self.battle.put(&state).await?;

        tracing::info!(
            session_id = %session_id,
            character_id = %character_id,
            rolled,
            healed,
            remaining = state.hit_dice.remaining,
            "Hit die spent"
        );

        Ok(HitDieSpend {
            state,
            rolled,
            healed,
        })
    }
}

/// Long rest: full restoration for every live state in the session.
pub struct CompleteLongRest {
    battle: Arc<dyn BattleStateRepo>,
    locks: Arc<LockRegistry>,
    clock: Arc<dyn ClockPort>,
}

impl CompleteLongRest {
    pub fn new(
        battle: Arc<dyn BattleStateRepo>,
        locks: Arc<LockRegistry>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            battle,
            locks,
            clock,
        }
    }

    /// Returns the restored states.
    pub async fn execute(
        &self,
        session_id: SessionId,
        actor: UserId,
    ) -> Result<Vec<BattleState>, RestError> {
        let characters: Vec<CharacterId> = self
            .battle
            .list_for_session(session_id)
            .await?
            .into_iter()
            .map(|s| s.character_id)
            .collect();

        let mut restored = Vec::with_capacity(characters.len());
        for character_id in characters {
            let _lock = self
                .locks
                .acquire(LockKey::Battle(session_id, character_id))
                .await;

            // Re-read under the lock; the listing above was unlocked.
            let Some(mut state) = self.battle.get(session_id, character_id).await? else {
                continue;
            };

            let regained = (state.hit_dice.total / 2).max(1);
            let patch = BattleStatePatch {
                hp_current: Some(state.hp_max),
                hp_temp: Some(0),
                spell_slots: Some(
                    state
                        .spell_slots
                        .iter()
                        .map(|(&level, slot)| (level, SlotState::fresh(slot.max)))
                        .collect(),
                ),
                hit_dice: Some(HitDice {
                    die: state.hit_dice.die,
                    total: state.hit_dice.total,
                    remaining: (state.hit_dice.remaining + regained).min(state.hit_dice.total),
                }),
                death_saves: Some(DeathSaves::default()),
                concentration: Some(None),
                ..Default::default()
            };

            let changes = serde_json::to_value(&patch).map_err(RepoError::from)?;
            state.apply(&patch);
            state.record(BattleLogEntry {
                at: self.clock.now(),
                actor,
                reason: "long_rest".to_string(),
                changes,
            });
            self.battle.put(&state).await?;
            restored.push(state);
        }

        tracing::info!(
            session_id = %session_id,
            restored = restored.len(),
            "Long rest completed"
        );

        Ok(restored)
    }
}
