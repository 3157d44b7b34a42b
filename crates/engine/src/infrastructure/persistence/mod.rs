//! SQLite persistence adapters.
//!
//! One current-state row per session, one per (session, character) battle
//! state, one position row per (campaign, character), and append-only
//! log/audit/path tables that are never updated or deleted.

mod battle_state_repository;
mod campaign_repository;
mod character_record_repository;
mod connection;
mod encounter_repository;
mod movement_repository;
mod session_state_repository;

pub use battle_state_repository::SqliteBattleStateRepo;
pub use campaign_repository::SqliteCampaignRepo;
pub use character_record_repository::SqliteCharacterRecordRepo;
pub use connection::Database;
pub use encounter_repository::SqliteEncounterRepo;
pub use movement_repository::SqliteMovementRepo;
pub use session_state_repository::SqliteSessionStateRepo;
