//! The locked patch operation on live battle state.
//!
//! This is the sole mutation path for battle state. Every non-empty
//! patch appends exactly one change-log entry capturing the raw
//! requested changes; an empty patch is a pure no-op that returns the
//! unmodified row.

use std::sync::Arc;

use dmforge_domain::{
    BattleLogEntry, BattleState, BattleStatePatch, CharacterId, SessionId, UserId,
};

use crate::infrastructure::locks::{LockKey, LockRegistry};
use crate::infrastructure::ports::{BattleStateRepo, ClockPort, RepoError};
use crate::use_cases::ErrorKind;

#[derive(Debug, thiserror::Error)]
pub enum BattleStateError {
    #[error("Live battle state not found for character {character} in session {session}")]
    NotFound {
        session: SessionId,
        character: CharacterId,
    },
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
}

impl BattleStateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } | Self::Repo(RepoError::NotFound) => ErrorKind::NotFound,
            Self::Repo(_) => ErrorKind::Unavailable,
        }
    }
}

pub struct PatchBattleState {
    battle: Arc<dyn BattleStateRepo>,
    locks: Arc<LockRegistry>,
    clock: Arc<dyn ClockPort>,
}

impl PatchBattleState {
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

    pub async fn execute(
        &self,
        session_id: SessionId,
        character_id: CharacterId,
        patch: BattleStatePatch,
        reason: &str,
        actor: UserId,
    ) -> Result<BattleState, BattleStateError> {
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

        if patch.is_empty() {
            return Ok(state);
        }

        let changes = serde_json::to_value(&patch).map_err(RepoError::from)?;
        state.apply(&patch);
        state.record(BattleLogEntry {
            at: self.clock.now(),
            actor,
            reason: reason.to_string(),
            changes,
        });

        self.battle.put(&state).await?;

        tracing::debug!(
            session_id = %session_id,
            character_id = %character_id,
            reason,
            "Battle state patched"
        );

        Ok(state)
    }
}
