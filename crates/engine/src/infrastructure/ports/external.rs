//! Collaborator escalation ports.
//!
//! The engine detects the 0-HP and heal-from-0 boundary crossings and
//! delegates what happens next (death saves, unconsciousness narration,
//! revival) to the surrounding system.

use async_trait::async_trait;

use dmforge_domain::{CharacterId, SessionId};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EscalationPort: Send + Sync {
    /// A character just dropped to exactly 0 HP.
    async fn on_zero_hp(
        &self,
        session_id: SessionId,
        character_id: CharacterId,
        damage: i32,
        critical: bool,
    );

    /// A character at 0 HP was healed back above 0 while unconscious.
    async fn on_revive(&self, session_id: SessionId, character_id: CharacterId);
}

/// Stand-in escalation handler that only logs the boundary crossing.
pub struct LoggingEscalation;

#[async_trait]
impl EscalationPort for LoggingEscalation {
    async fn on_zero_hp(
        &self,
        session_id: SessionId,
        character_id: CharacterId,
        damage: i32,
        critical: bool,
    ) {
        tracing::info!(
            session_id = %session_id,
            character_id = %character_id,
            damage,
            critical,
            "Character dropped to 0 HP"
        );
    }

    async fn on_revive(&self, session_id: SessionId, character_id: CharacterId) {
        tracing::info!(
            session_id = %session_id,
            character_id = %character_id,
            "Character revived from 0 HP"
        );
    }
}
