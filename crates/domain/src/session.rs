//! Authoritative per-session game state and its audit log entry
//!
//! One value per active session, owned by the session state machine and
//! mutated only inside a locked read-modify-write cycle. The constructor
//! always produces a fully-populated value; there is no default-filling
//! of partially stored state at read time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{CampaignId, EncounterId, SessionId, UserId};
use crate::participant::Participant;
use crate::phase::GamePhase;

/// Action economy for the active player-controlled combatant.
///
/// Present only while a player acts in combat; non-player turns carry no
/// budget (the DM adjudicates those directly).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnBudget {
    pub action_available: bool,
    pub bonus_action_available: bool,
    pub reaction_available: bool,
    /// Movement left this turn, in map units.
    pub movement_remaining: f64,
}

impl TurnBudget {
    /// A fresh budget at the start of a turn.
    pub fn fresh(speed: f64) -> Self {
        Self {
            action_available: true,
            bonus_action_available: true,
            reaction_available: true,
            movement_remaining: speed,
        }
    }
}

/// Context carried while a session sits in the rest phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestContext {
    pub started_at: DateTime<Utc>,
}

/// Event types recorded in the game-state log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GameStateEvent {
    Initialized,
    PhaseChanged,
    TurnEnded,
    TurnSkipped,
    WorldTurnExecuted,
    TurnOrderSet,
}

impl std::fmt::Display for GameStateEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialized => write!(f, "initialized"),
            Self::PhaseChanged => write!(f, "phase_changed"),
            Self::TurnEnded => write!(f, "turn_ended"),
            Self::TurnSkipped => write!(f, "turn_skipped"),
            Self::WorldTurnExecuted => write!(f, "world_turn_executed"),
            Self::TurnOrderSet => write!(f, "turn_order_set"),
        }
    }
}

impl std::str::FromStr for GameStateEvent {
    type Err = crate::error::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initialized" => Ok(Self::Initialized),
            "phase_changed" => Ok(Self::PhaseChanged),
            "turn_ended" => Ok(Self::TurnEnded),
            "turn_skipped" => Ok(Self::TurnSkipped),
            "world_turn_executed" => Ok(Self::WorldTurnExecuted),
            "turn_order_set" => Ok(Self::TurnOrderSet),
            other => Err(crate::error::DomainError::parse(format!(
                "Unknown game state event: '{}'",
                other
            ))),
        }
    }
}

/// One append-only audit row per state mutation: the event, who acted,
/// and full before/after snapshots for replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateLogEntry {
    pub session_id: SessionId,
    pub event: GameStateEvent,
    pub actor: UserId,
    pub previous_state: Option<SessionGameState>,
    pub new_state: SessionGameState,
    pub metadata: serde_json::Value,
    pub at: DateTime<Utc>,
}

/// The authoritative game state of one active session.
///
/// Invariant: `active_participant` is a member of `turn_order` whenever
/// the order is non-empty; the order is empty only in the rest phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionGameState {
    pub session_id: SessionId,
    pub campaign_id: CampaignId,
    pub phase: GamePhase,
    pub previous_phase: Option<GamePhase>,
    pub turn_order: Vec<Participant>,
    pub active_participant: Option<Participant>,
    pub round_number: u32,
    pub world_turn_pending: bool,
    pub encounter_id: Option<EncounterId>,
    pub phase_entered_at: DateTime<Utc>,
    pub combat_turn_budget: Option<TurnBudget>,
    pub rest_context: Option<RestContext>,
}

impl SessionGameState {
    /// A fully-populated initial state in the exploration phase.
    pub fn new(session_id: SessionId, campaign_id: CampaignId, now: DateTime<Utc>) -> Self {
        Self {
            session_id,
            campaign_id,
            phase: GamePhase::Exploration,
            previous_phase: None,
            turn_order: Vec::new(),
            active_participant: None,
            round_number: 1,
            world_turn_pending: false,
            encounter_id: None,
            phase_entered_at: now,
            combat_turn_budget: None,
            rest_context: None,
        }
    }

    /// Index of the active participant in the turn order, when present.
    pub fn active_index(&self) -> Option<usize> {
        let active = self.active_participant?;
        self.turn_order.iter().position(|p| *p == active)
    }

    /// Replace the turn order and reset the active participant to its
    /// first entry (or none, for an empty order).
    pub fn reset_turn_order(&mut self, order: Vec<Participant>) {
        self.active_participant = order.first().copied();
        self.turn_order = order;
    }

    /// Advance the active participant circularly. Returns true when the
    /// advance wrapped back to the first entry, which increments the
    /// round counter and flags a pending world turn.
    ///
    /// The caller must ensure the turn order is non-empty.
    pub fn advance_turn(&mut self) -> bool {
        let len = self.turn_order.len();
        if len == 0 {
            return false;
        }
        let next_index = match self.active_index() {
            Some(index) => (index + 1) % len,
            None => 0,
        };
        self.active_participant = self.turn_order.get(next_index).copied();

        let wrapped = next_index == 0;
        if wrapped {
            self.round_number += 1;
            self.world_turn_pending = true;
        }
        wrapped
    }

    /// Invariant check used by tests and debug assertions.
    pub fn is_consistent(&self) -> bool {
        match (&self.active_participant, self.turn_order.is_empty()) {
            (Some(active), false) => self.turn_order.contains(active),
            (None, true) => true,
            // Non-empty order requires an active participant; an active
            // participant requires a non-empty order.
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::UserId;

    fn participants(n: usize) -> Vec<Participant> {
        (0..n).map(|_| Participant::Player(UserId::new())).collect()
    }

    fn state_with_order(n: usize) -> SessionGameState {
        let mut state = SessionGameState::new(SessionId::new(), CampaignId::new(), Utc::now());
        state.reset_turn_order(participants(n));
        state
    }

    #[test]
    fn new_state_starts_in_exploration_at_round_one() {
        let state = SessionGameState::new(SessionId::new(), CampaignId::new(), Utc::now());
        assert_eq!(state.phase, GamePhase::Exploration);
        assert_eq!(state.round_number, 1);
        assert!(!state.world_turn_pending);
        assert!(state.is_consistent());
    }

    #[test]
    fn three_end_turns_wrap_once_and_return_to_the_first() {
        let mut state = state_with_order(3);
        let first = state.active_participant;

        assert!(!state.advance_turn());
        assert!(!state.advance_turn());
        assert_eq!(state.round_number, 1);

        // Third advance wraps: back to the first, round goes 1 -> 2.
        assert!(state.advance_turn());
        assert_eq!(state.active_participant, first);
        assert_eq!(state.round_number, 2);
        assert!(state.world_turn_pending);
    }

    #[test]
    fn advance_keeps_the_active_participant_in_the_order() {
        let mut state = state_with_order(4);
        for _ in 0..10 {
            state.advance_turn();
            assert!(state.is_consistent());
        }
    }

    #[test]
    fn reset_turn_order_activates_the_first_entry() {
        let mut state = state_with_order(3);
        let replacement = participants(2);
        state.reset_turn_order(replacement.clone());
        assert_eq!(state.active_participant, Some(replacement[0]));
        assert!(state.is_consistent());
    }

    #[test]
    fn empty_order_has_no_active_participant() {
        let mut state = state_with_order(2);
        state.reset_turn_order(Vec::new());
        assert_eq!(state.active_participant, None);
        assert!(state.is_consistent());
    }

    #[test]
    fn fresh_turn_budget_has_everything_available() {
        let budget = TurnBudget::fresh(30.0);
        assert!(budget.action_available);
        assert!(budget.bonus_action_available);
        assert!(budget.reaction_available);
        assert_eq!(budget.movement_remaining, 30.0);
    }
}
