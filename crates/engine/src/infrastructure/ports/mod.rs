//! Port traits for infrastructure boundaries.
//!
//! These are the ONLY abstractions in the engine. Everything else is
//! concrete types. Ports exist for:
//! - Database access (could swap SQLite -> Postgres)
//! - Collaborator escalations (death/unconscious and revive handling)
//! - Clock/Random (for testing)

mod error;
mod external;
mod repos;
mod testing;
pub mod types;

pub use error::RepoError;
pub use external::{EscalationPort, LoggingEscalation};
pub use repos::{
    BattleStateRepo, CampaignRepo, CharacterRecordRepo, EncounterRepo, MovementRepo,
    SessionStateRepo,
};
pub use testing::{ClockPort, RandomPort};
pub use types::{
    Abilities, CampaignMember, CampaignRole, CharacterRecord, EncounterParticipant, MoveAuditRow,
    MoveMode, PathSegment, PositionRecord,
};

#[cfg(test)]
pub use external::MockEscalationPort;
#[cfg(test)]
pub use repos::{
    MockBattleStateRepo, MockCampaignRepo, MockCharacterRecordRepo, MockEncounterRepo,
    MockMovementRepo, MockSessionStateRepo,
};
#[cfg(test)]
pub use testing::{MockClockPort, MockRandomPort};
