//! DM Forge Engine library.
//!
//! The session game-state engine of the platform: the session state
//! machine, turn-order building, grid movement resolution, live battle
//! state with mechanical outcome application, rests, and leveling.
//!
//! ## Structure
//!
//! - `infrastructure/` - Ports, SQLite adapters, lock registry, settings
//! - `use_cases/` - One struct per operation, orchestrating ports under
//!   the per-row lock discipline
//!
//! Every mutating operation runs as a locked read-modify-write cycle:
//! acquire the row's lock, load, validate, compute, persist the new state
//! together with its audit entry in one transaction, release. Failures
//! are surfaced as typed errors; nothing is retried internally.

pub mod infrastructure;
pub mod use_cases;

/// End-to-end flows against an in-memory database.
#[cfg(test)]
mod e2e_tests;
