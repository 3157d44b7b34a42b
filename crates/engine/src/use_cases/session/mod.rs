//! Session state machine: the owner of per-session game state.
//!
//! Every operation runs as one locked read-modify-write cycle against
//! the session row and appends exactly one audit-log entry in the same
//! transaction as the state write. Two concurrent operations on the same
//! session serialize through the lock; the second observes the first's
//! committed result.

mod activation;
mod turn_order;

pub use activation::{ActivateSession, ActivationError, EndSession};
pub use turn_order::TurnOrderBuilder;

use std::sync::Arc;

use serde_json::json;

use dmforge_domain::{
    CampaignId, EncounterId, GamePhase, GameStateEvent, GameStateLogEntry, Participant,
    RestContext, SessionGameState, SessionId, TurnBudget, UserId,
};

use crate::infrastructure::locks::{LockKey, LockRegistry};
use crate::infrastructure::ports::{ClockPort, RepoError, SessionStateRepo};
use crate::infrastructure::settings::EngineSettings;
use crate::use_cases::ErrorKind;

#[derive(Debug, thiserror::Error)]
pub enum SessionStateError {
    #[error("Session state not found: {0}")]
    NotFound(SessionId),
    #[error("Unknown phase: '{0}'")]
    InvalidPhase(String),
    #[error("Invalid phase transition: {from} -> {to}")]
    InvalidTransition { from: GamePhase, to: GamePhase },
    #[error("The current phase has no turn order")]
    NoTurnOrder,
    #[error("No world turn is pending")]
    NoWorldTurnPending,
    #[error("{target} is not the active participant")]
    NotActiveParticipant { target: Participant },
    #[error("Turn order must not be empty")]
    InvalidTurnOrder,
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
}

impl SessionStateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) | Self::Repo(RepoError::NotFound) => ErrorKind::NotFound,
            Self::InvalidPhase(_) | Self::InvalidTurnOrder => ErrorKind::InvalidArgument,
            Self::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            Self::NoTurnOrder | Self::NoWorldTurnPending | Self::NotActiveParticipant { .. } => {
                ErrorKind::Conflict
            }
            Self::Repo(_) => ErrorKind::Unavailable,
        }
    }
}

/// Owns all mutations of [`SessionGameState`].
pub struct SessionStateMachine {
    states: Arc<dyn SessionStateRepo>,
    turn_orders: Arc<TurnOrderBuilder>,
    locks: Arc<LockRegistry>,
    clock: Arc<dyn ClockPort>,
    settings: Arc<EngineSettings>,
}

impl SessionStateMachine {
    pub fn new(
        states: Arc<dyn SessionStateRepo>,
        turn_orders: Arc<TurnOrderBuilder>,
        locks: Arc<LockRegistry>,
        clock: Arc<dyn ClockPort>,
        settings: Arc<EngineSettings>,
    ) -> Self {
        Self {
            states,
            turn_orders,
            locks,
            clock,
            settings,
        }
    }

    /// Set up state for a session that just activated: exploration phase,
    /// round-robin turn order, round 1.
    ///
    /// Calling this more than once per activation is the caller's bug;
    /// the operation itself simply writes a fresh state.
    pub async fn initialize(
        &self,
        session_id: SessionId,
        campaign_id: CampaignId,
        actor: UserId,
    ) -> Result<SessionGameState, SessionStateError> {
        let _lock = self.locks.acquire(LockKey::Session(session_id)).await;

        let order = self
            .turn_orders
            .build(GamePhase::Exploration, campaign_id, None)
            .await?;

        let mut state = SessionGameState::new(session_id, campaign_id, self.clock.now());
        state.reset_turn_order(order);

        tracing::info!(
            session_id = %session_id,
            participants = state.turn_order.len(),
            "Session game state initialized"
        );

        self.commit(GameStateEvent::Initialized, actor, None, state, json!({}))
            .await
    }

    /// Move the session to another phase.
    ///
    /// Rebuilds the turn order for the new phase, resets the round
    /// counter, clears any pending world turn, and allocates a combat
    /// turn budget only when combat opens on a player-controlled
    /// participant.
    pub async fn change_phase(
        &self,
        session_id: SessionId,
        target: &str,
        encounter_id: Option<EncounterId>,
        actor: UserId,
    ) -> Result<SessionGameState, SessionStateError> {
        let target_phase: GamePhase = target
            .parse()
            .map_err(|_| SessionStateError::InvalidPhase(target.to_string()))?;

        let _lock = self.locks.acquire(LockKey::Session(session_id)).await;
        let current = self.load(session_id).await?;

        if !current.phase.can_transition_to(target_phase) {
            return Err(SessionStateError::InvalidTransition {
                from: current.phase,
                to: target_phase,
            });
        }

        let now = self.clock.now();
        let mut next = current.clone();
        next.previous_phase = Some(current.phase);
        next.phase = target_phase;
        next.encounter_id = match target_phase {
            GamePhase::Combat => encounter_id,
            _ => None,
        };
        next.round_number = 1;
        next.world_turn_pending = false;
        next.phase_entered_at = now;
        next.rest_context = match target_phase {
            GamePhase::Rest => Some(RestContext { started_at: now }),
            _ => None,
        };

        let order = self
            .turn_orders
            .build(target_phase, next.campaign_id, next.encounter_id)
            .await?;
        next.reset_turn_order(order);
        next.combat_turn_budget = self.budget_for(&next);

        tracing::info!(
            session_id = %session_id,
            from = %current.phase,
            to = %target_phase,
            "Phase changed"
        );

        let metadata = json!({ "from": current.phase, "to": target_phase });
        self.commit(GameStateEvent::PhaseChanged, actor, Some(current), next, metadata)
            .await
    }

    /// Advance to the next participant's turn, wrapping circularly.
    ///
    /// Wrap-around increments the round counter and flags a pending world
    /// turn. Authorization is deliberately the caller's concern: the
    /// engine accepts an end-turn from any actor and guarantees only
    /// state consistency.
    pub async fn end_turn(
        &self,
        session_id: SessionId,
        actor: UserId,
    ) -> Result<SessionGameState, SessionStateError> {
        let _lock = self.locks.acquire(LockKey::Session(session_id)).await;
        let current = self.load(session_id).await?;

        if current.turn_order.is_empty() {
            return Err(SessionStateError::NoTurnOrder);
        }

        let mut next = current.clone();
        let wrapped = next.advance_turn();
        next.combat_turn_budget = self.budget_for(&next);

        tracing::info!(
            session_id = %session_id,
            round = next.round_number,
            wrapped,
            "Turn ended"
        );

        let metadata = json!({ "wrapped": wrapped });
        self.commit(GameStateEvent::TurnEnded, actor, Some(current), next, metadata)
            .await
    }

    /// Execute the DM-driven world step between rounds.
    pub async fn execute_world_turn(
        &self,
        session_id: SessionId,
        actor: UserId,
    ) -> Result<SessionGameState, SessionStateError> {
        let _lock = self.locks.acquire(LockKey::Session(session_id)).await;
        let current = self.load(session_id).await?;

        if !current.world_turn_pending {
            return Err(SessionStateError::NoWorldTurnPending);
        }

        let mut next = current.clone();
        next.world_turn_pending = false;
        next.active_participant = next.turn_order.first().copied();
        next.combat_turn_budget = self.budget_for(&next);

        tracing::info!(session_id = %session_id, round = next.round_number, "World turn executed");

        self.commit(
            GameStateEvent::WorldTurnExecuted,
            actor,
            Some(current),
            next,
            json!({}),
        )
        .await
    }

    /// Replace the turn order verbatim (manual DM reordering). The first
    /// entry becomes active.
    pub async fn set_turn_order(
        &self,
        session_id: SessionId,
        order: Vec<Participant>,
        actor: UserId,
    ) -> Result<SessionGameState, SessionStateError> {
        if order.is_empty() {
            return Err(SessionStateError::InvalidTurnOrder);
        }

        let _lock = self.locks.acquire(LockKey::Session(session_id)).await;
        let current = self.load(session_id).await?;

        let mut next = current.clone();
        next.reset_turn_order(order);
        next.combat_turn_budget = self.budget_for(&next);

        tracing::info!(
            session_id = %session_id,
            participants = next.turn_order.len(),
            "Turn order replaced"
        );

        let metadata = json!({ "participants": next.turn_order.len() });
        self.commit(GameStateEvent::TurnOrderSet, actor, Some(current), next, metadata)
            .await
    }

    /// End the active participant's turn on their behalf, recorded as a
    /// skip. Fails unless `target` actually is the active participant.
    pub async fn skip_turn(
        &self,
        session_id: SessionId,
        target: Participant,
        actor: UserId,
    ) -> Result<SessionGameState, SessionStateError> {
        let _lock = self.locks.acquire(LockKey::Session(session_id)).await;
        let current = self.load(session_id).await?;

        if current.turn_order.is_empty() {
            return Err(SessionStateError::NoTurnOrder);
        }
        if current.active_participant != Some(target) {
            return Err(SessionStateError::NotActiveParticipant { target });
        }

        let mut next = current.clone();
        let wrapped = next.advance_turn();
        next.combat_turn_budget = self.budget_for(&next);

        tracing::info!(session_id = %session_id, skipped = %target, "Turn skipped");

        let metadata = json!({ "skipped": target, "wrapped": wrapped });
        self.commit(GameStateEvent::TurnSkipped, actor, Some(current), next, metadata)
            .await
    }

    async fn load(&self, session_id: SessionId) -> Result<SessionGameState, SessionStateError> {
        self.states
            .get(session_id)
            .await?
            .ok_or(SessionStateError::NotFound(session_id))
    }

    /// A fresh combat budget for a player-controlled active participant;
    /// nothing otherwise. Non-player turns are adjudicated by the DM and
    /// carry no automatic budget.
    fn budget_for(&self, state: &SessionGameState) -> Option<TurnBudget> {
        match (state.phase, state.active_participant) {
            (GamePhase::Combat, Some(active)) if active.is_player() => {
                Some(TurnBudget::fresh(self.settings.default_speed))
            }
            _ => None,
        }
    }

    async fn commit(
        &self,
        event: GameStateEvent,
        actor: UserId,
        previous: Option<SessionGameState>,
        next: SessionGameState,
        metadata: serde_json::Value,
    ) -> Result<SessionGameState, SessionStateError> {
        let entry = GameStateLogEntry {
            session_id: next.session_id,
            event,
            actor,
            previous_state: previous,
            new_state: next.clone(),
            metadata,
            at: self.clock.now(),
        };
        self.states.put_with_log(&next, &entry).await?;
        Ok(next)
    }
}
