//! Leveling resolution.
//!
//! Evaluates the XP threshold table against accumulated experience
//! (permanent record XP plus any XP gained in an active session) and
//! applies one level's growth: hit points from a rolled or average hit
//! die, spell slots from the class progression tables, both propagated
//! into the live battle state when a session is active.

use std::sync::Arc;

use dmforge_domain::{
    game_systems, BattleLogEntry, BattleStatePatch, CharacterId, DiceFormula, SessionId,
    SlotState, UserId,
};
use std::collections::BTreeMap;

use crate::infrastructure::locks::{LockKey, LockRegistry};
use crate::infrastructure::ports::{
    BattleStateRepo, CharacterRecordRepo, ClockPort, RandomPort, RepoError,
};
use crate::use_cases::ErrorKind;

#[derive(Debug, thiserror::Error)]
pub enum LevelingError {
    #[error("Character record not found: {0}")]
    CharacterNotFound(CharacterId),
    #[error("Already at maximum level ({level})")]
    MaxLevelReached { level: u8 },
    #[error("Not eligible: {xp} XP accumulated, next level at {next_threshold}")]
    NotEligible { xp: i64, next_threshold: i64 },
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
}

impl LevelingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CharacterNotFound(_) | Self::Repo(RepoError::NotFound) => ErrorKind::NotFound,
            Self::MaxLevelReached { .. } | Self::NotEligible { .. } => ErrorKind::Conflict,
            Self::Repo(_) => ErrorKind::Unavailable,
        }
    }
}

/// How the hit-point gain is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HpGrowth {
    /// Roll the class hit die.
    Rolled,
    /// Take the deterministic average: ceil(die/2) + 1.
    Average,
}

/// The applied growth.
#[derive(Debug, Clone)]
pub struct LevelUpResult {
    pub new_level: u8,
    pub hp_gain: i32,
    pub new_hit_points: i32,
    pub spell_slots: BTreeMap<u8, u8>,
}

pub struct LevelUp {
    records: Arc<dyn CharacterRecordRepo>,
    battle: Arc<dyn BattleStateRepo>,
    locks: Arc<LockRegistry>,
    clock: Arc<dyn ClockPort>,
    random: Arc<dyn RandomPort>,
}

impl LevelUp {
    pub fn new(
        records: Arc<dyn CharacterRecordRepo>,
        battle: Arc<dyn BattleStateRepo>,
        locks: Arc<LockRegistry>,
        clock: Arc<dyn ClockPort>,
        random: Arc<dyn RandomPort>,
    ) -> Self {
        Self {
            records,
            battle,
            locks,
            clock,
            random,
        }
    }

    /// Apply one level of growth when the accumulated XP allows it.
    ///
    /// `session_id` ties in the active session: its live state
    /// contributes `xp_gained` to eligibility and receives the new HP
    /// maximum and slot table.
    pub async fn execute(
        &self,
        character_id: CharacterId,
        session_id: Option<SessionId>,
        growth: HpGrowth,
        actor: UserId,
    ) -> Result<LevelUpResult, LevelingError> {
        let record = self
            .records
            .get(character_id)
            .await?
            .ok_or(LevelingError::CharacterNotFound(character_id))?;

        if record.level >= game_systems::MAX_LEVEL {
            return Err(LevelingError::MaxLevelReached {
                level: record.level,
            });
        }

        // Session XP counts toward eligibility before it is synced back.
        let session_xp = match session_id {
            Some(session_id) => self
                .battle
                .get(session_id, character_id)
                .await?
                .map(|s| s.xp_gained)
                .unwrap_or(0),
            None => 0,
        };
        let total_xp = record.xp + session_xp;

        let earned_level = game_systems::level_from_xp(total_xp);
        if earned_level <= record.level {
            return Err(LevelingError::NotEligible {
                xp: total_xp,
                next_threshold: game_systems::xp_for_next_level(record.level),
            });
        }

        let con_modifier = game_systems::ability_modifier(record.abilities.constitution);
        let die = game_systems::hit_die_for_class(&record.class);
        let hp_gain = match growth {
            HpGrowth::Rolled => DiceFormula {
                dice_count: 1,
                die_size: die,
                modifier: con_modifier,
            }
            .roll_with(|d| self.random.gen_range(1, d as i32))
            .total
            .max(1),
            HpGrowth::Average => game_systems::average_hit_die_gain(die, con_modifier),
        };

        let new_level = record.level + 1;
        let new_hit_points = record.hit_points + hp_gain;
        let spell_slots = game_systems::spell_slots_for_class(&record.class, new_level);

        self.records
            .apply_level_up(character_id, new_level, new_hit_points, &spell_slots)
            .await?;

        tracing::info!(
            character_id = %character_id,
            new_level,
            hp_gain,
            "Level up applied"
        );

        // Propagate into the live state while a session is active.
        if let Some(session_id) = session_id {
            let _lock = self
                .locks
                .acquire(LockKey::Battle(session_id, character_id))
                .await;

            if let Some(mut state) = self.battle.get(session_id, character_id).await? {
                let slots: BTreeMap<u8, SlotState> = spell_slots
                    .iter()
                    .map(|(&level, &max)| {
                        let used = state
                            .spell_slots
                            .get(&level)
                            .map(|s| s.used.min(max))
                            .unwrap_or(0);
                        (level, SlotState { max, used })
                    })
                    .collect();

                let patch = BattleStatePatch {
                    hp_max: Some(new_hit_points),
                    spell_slots: Some(slots),
                    ..Default::default()
                };
                let changes = serde_json::to_value(&patch).map_err(RepoError::from)?;
                state.apply(&patch);
                state.record(BattleLogEntry {
                    at: self.clock.now(),
                    actor,
                    reason: "level_up".to_string(),
                    changes,
                });
                self.battle.put(&state).await?;
            }
        }

        Ok(LevelUpResult {
            new_level,
            hp_gain,
            new_hit_points,
            spell_slots,
        })
    }
}
