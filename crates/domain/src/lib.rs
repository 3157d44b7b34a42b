//! DM Forge domain model.
//!
//! Pure types and rules for the session game-state engine: typed IDs,
//! participants, phases and the phase transition table, grid geometry,
//! live battle state with its patch algebra, mechanical outcome
//! resolution, dice, and the D&D 5e calculation tables.
//!
//! Nothing in this crate performs I/O or holds locks; everything is safe
//! for unlimited concurrent use.

extern crate self as dmforge_domain;

pub mod battle;
pub mod dice;
pub mod error;
pub mod game_systems;
pub mod grid;
pub mod ids;
pub mod outcome;
pub mod participant;
pub mod phase;
pub mod session;

pub use battle::{
    BattleLogEntry, BattleState, BattleStatePatch, Concentration, DeathSaves, HitDice, SlotState,
    CONDITION_UNCONSCIOUS,
};
pub use dice::{DiceFormula, DiceParseError, DiceRollResult};
pub use error::DomainError;
pub use grid::{GridConfig, GridKind, MapBounds, Point};
pub use ids::{CampaignId, CharacterId, EncounterId, NpcId, SessionId, UserId};
pub use outcome::{
    concentration_check_dc, resolve_damage, resolve_healing, DamageResolution, HealingResolution,
    MechanicalOutcome,
};
pub use participant::Participant;
pub use phase::GamePhase;
pub use session::{GameStateEvent, GameStateLogEntry, RestContext, SessionGameState, TurnBudget};
