//! Session activation and end-of-session sync.
//!
//! Activation copies live battle states out of the permanent character
//! records and initializes the session state machine; ending a session
//! flushes HP and accumulated XP back. Both are invoked once per session
//! lifecycle by the hosting layer.

use std::collections::BTreeMap;
use std::sync::Arc;

use dmforge_domain::{
    game_systems, BattleState, CampaignId, HitDice, SessionGameState, SessionId, SlotState,
    UserId,
};

use crate::infrastructure::locks::{LockKey, LockRegistry};
use crate::infrastructure::ports::{
    BattleStateRepo, CampaignRepo, CharacterRecordRepo, RepoError,
};
use crate::use_cases::session::{SessionStateError, SessionStateMachine};
use crate::use_cases::ErrorKind;

#[derive(Debug, thiserror::Error)]
pub enum ActivationError {
    #[error(transparent)]
    Session(#[from] SessionStateError),
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
}

impl ActivationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Session(err) => err.kind(),
            Self::Repo(RepoError::NotFound) => ErrorKind::NotFound,
            Self::Repo(_) => ErrorKind::Unavailable,
        }
    }
}

/// Seed live battle states for the campaign party and initialize the
/// session state machine.
pub struct ActivateSession {
    campaigns: Arc<dyn CampaignRepo>,
    records: Arc<dyn CharacterRecordRepo>,
    battle: Arc<dyn BattleStateRepo>,
    machine: Arc<SessionStateMachine>,
}

impl ActivateSession {
    pub fn new(
        campaigns: Arc<dyn CampaignRepo>,
        records: Arc<dyn CharacterRecordRepo>,
        battle: Arc<dyn BattleStateRepo>,
        machine: Arc<SessionStateMachine>,
    ) -> Self {
        Self {
            campaigns,
            records,
            battle,
            machine,
        }
    }

    pub async fn execute(
        &self,
        session_id: SessionId,
        campaign_id: CampaignId,
        actor: UserId,
    ) -> Result<SessionGameState, ActivationError> {
        // 1. Copy a live state out of every member's permanent record.
        let members = self.campaigns.active_members(campaign_id).await?;
        for member in members {
            let Some(character_id) = member.character_id else {
                continue;
            };
            let Some(record) = self.records.get(character_id).await? else {
                tracing::warn!(
                    character_id = %character_id,
                    "Member has no character record; skipping live state"
                );
                continue;
            };

            // Re-activation keeps an existing live state untouched.
            if self.battle.get(session_id, character_id).await?.is_some() {
                continue;
            }

            let spell_slots: BTreeMap<u8, SlotState> = record
                .spell_slots
                .iter()
                .map(|(&level, &max)| (level, SlotState::fresh(max)))
                .collect();
            let hit_dice = HitDice::fresh(
                game_systems::hit_die_for_class(&record.class),
                record.level,
            );

            let state = BattleState::new(
                session_id,
                character_id,
                record.hit_points,
                hit_dice,
                spell_slots,
            );
            self.battle.insert(&state).await?;

            tracing::debug!(
                session_id = %session_id,
                character_id = %character_id,
                hp = record.hit_points,
                "Live battle state seeded"
            );
        }

        // 2. Initialize the authoritative session state.
        Ok(self.machine.initialize(session_id, campaign_id, actor).await?)
    }
}

/// Flush live HP and accumulated XP back to the permanent records when a
/// session ends. Live states are retained for history.
pub struct EndSession {
    battle: Arc<dyn BattleStateRepo>,
    records: Arc<dyn CharacterRecordRepo>,
    locks: Arc<LockRegistry>,
}

impl EndSession {
    pub fn new(
        battle: Arc<dyn BattleStateRepo>,
        records: Arc<dyn CharacterRecordRepo>,
        locks: Arc<LockRegistry>,
    ) -> Self {
        Self {
            battle,
            records,
            locks,
        }
    }

    /// Returns the number of records synced.
    pub async fn execute(&self, session_id: SessionId) -> Result<usize, ActivationError> {
        let states = self.battle.list_for_session(session_id).await?;
        let mut synced = 0;

        for state in states {
            let _lock = self
                .locks
                .acquire(LockKey::Battle(session_id, state.character_id))
                .await;

            match self
                .records
                .sync_back(state.character_id, state.hp_current, state.xp_gained)
                .await
            {
                Ok(()) => synced += 1,
                Err(RepoError::NotFound) => {
                    tracing::warn!(
                        character_id = %state.character_id,
                        "Permanent record vanished; skipping sync"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }

        tracing::info!(session_id = %session_id, synced, "Session live state synced back");
        Ok(synced)
    }
}
