//! Turn-order building.
//!
//! Read-only and deterministic given its inputs: combat orders come from
//! encounter initiative (descending, registration order on ties), every
//! other phase round-robins the active campaign members by join time.
//! Rest has no individual turns.

use std::sync::Arc;

use dmforge_domain::{CampaignId, EncounterId, GamePhase, Participant};

use crate::infrastructure::ports::{CampaignRepo, CampaignRole, EncounterRepo, RepoError};

pub struct TurnOrderBuilder {
    campaigns: Arc<dyn CampaignRepo>,
    encounters: Arc<dyn EncounterRepo>,
}

impl TurnOrderBuilder {
    pub fn new(campaigns: Arc<dyn CampaignRepo>, encounters: Arc<dyn EncounterRepo>) -> Self {
        Self {
            campaigns,
            encounters,
        }
    }

    /// Build the participant order for a phase.
    ///
    /// Combat with a registered encounter sorts by initiative; an
    /// encounter with no registered participants falls through to the
    /// round-robin default.
    pub async fn build(
        &self,
        phase: GamePhase,
        campaign_id: CampaignId,
        encounter_id: Option<EncounterId>,
    ) -> Result<Vec<Participant>, RepoError> {
        match phase {
            GamePhase::Rest => Ok(Vec::new()),
            GamePhase::Combat => {
                if let Some(encounter_id) = encounter_id {
                    let mut combatants = self.encounters.participants(encounter_id).await?;
                    if !combatants.is_empty() {
                        combatants.sort_by(|a, b| {
                            b.initiative.cmp(&a.initiative).then(a.seq.cmp(&b.seq))
                        });
                        return Ok(combatants.into_iter().map(|c| c.participant).collect());
                    }
                }
                self.round_robin(campaign_id).await
            }
            GamePhase::Exploration | GamePhase::Social => self.round_robin(campaign_id).await,
        }
    }

    /// Active player members by join time ascending. The DM is not in
    /// the rotation; the world turn is their step.
    async fn round_robin(&self, campaign_id: CampaignId) -> Result<Vec<Participant>, RepoError> {
        let members = self.campaigns.active_members(campaign_id).await?;
        Ok(members
            .into_iter()
            .filter(|m| m.role == CampaignRole::Player)
            .map(|m| Participant::Player(m.user_id))
            .collect())
    }
}
