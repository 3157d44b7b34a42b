//! Repository port traits for database access.

use async_trait::async_trait;
use std::collections::BTreeMap;

use dmforge_domain::{
    BattleState, CampaignId, CharacterId, EncounterId, GameStateLogEntry, SessionGameState,
    SessionId, UserId,
};

use super::error::RepoError;
use super::types::{
    CampaignMember, CampaignRole, CharacterRecord, EncounterParticipant, MoveAuditRow,
    PathSegment, PositionRecord,
};

// =============================================================================
// Session game state
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStateRepo: Send + Sync {
    /// The single current state row for a session, if initialized.
    async fn get(&self, id: SessionId) -> Result<Option<SessionGameState>, RepoError>;

    /// Persist the new current state and append its audit-log entry in
    /// one transaction. The log is never ahead of or behind the state.
    async fn put_with_log(
        &self,
        state: &SessionGameState,
        entry: &GameStateLogEntry,
    ) -> Result<(), RepoError>;

    /// The append-only log for a session, oldest first.
    async fn log_entries(&self, id: SessionId) -> Result<Vec<GameStateLogEntry>, RepoError>;
}

// =============================================================================
// Live battle state
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BattleStateRepo: Send + Sync {
    async fn get(
        &self,
        session_id: SessionId,
        character_id: CharacterId,
    ) -> Result<Option<BattleState>, RepoError>;

    /// Persist the full current state (embedded change log included).
    async fn put(&self, state: &BattleState) -> Result<(), RepoError>;

    /// Create the row at session activation. Fails if it already exists.
    async fn insert(&self, state: &BattleState) -> Result<(), RepoError>;

    async fn list_for_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<BattleState>, RepoError>;
}

// =============================================================================
// Movement
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MovementRepo: Send + Sync {
    async fn get_position(
        &self,
        campaign_id: CampaignId,
        character_id: CharacterId,
    ) -> Result<Option<PositionRecord>, RepoError>;

    /// Write the new position plus one audit row and one path segment in
    /// one transaction.
    async fn put_move(
        &self,
        position: &PositionRecord,
        audit: &MoveAuditRow,
        path: &PathSegment,
    ) -> Result<(), RepoError>;
}

// =============================================================================
// Campaign membership (read-only collaborator surface)
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CampaignRepo: Send + Sync {
    /// Active members ordered by join time ascending.
    async fn active_members(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Vec<CampaignMember>, RepoError>;

    async fn role_of(
        &self,
        campaign_id: CampaignId,
        user_id: UserId,
    ) -> Result<Option<CampaignRole>, RepoError>;
}

// =============================================================================
// Encounters (read-only collaborator surface)
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EncounterRepo: Send + Sync {
    /// Registered combatants; callers sort by initiative.
    async fn participants(
        &self,
        encounter_id: EncounterId,
    ) -> Result<Vec<EncounterParticipant>, RepoError>;
}

// =============================================================================
// Permanent character records (collaborator surface)
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CharacterRecordRepo: Send + Sync {
    async fn get(&self, id: CharacterId) -> Result<Option<CharacterRecord>, RepoError>;

    /// End-of-session sync: push live HP and accumulated XP back into the
    /// permanent record.
    async fn sync_back(
        &self,
        id: CharacterId,
        hit_points: i32,
        xp_gained: i64,
    ) -> Result<(), RepoError>;

    /// Persist one level's growth.
    async fn apply_level_up(
        &self,
        id: CharacterId,
        level: u8,
        hit_points: i32,
        spell_slots: &BTreeMap<u8, u8>,
    ) -> Result<(), RepoError>;
}
