//! SQLite adapter for campaign membership reads.
//!
//! Membership rows are owned by the campaign CRUD subsystem; the engine
//! reads them for turn-order building and movement authority. The write
//! helper exists for session hosts and test setups.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use dmforge_domain::{CampaignId, CharacterId, UserId};

use super::Database;
use crate::infrastructure::ports::{CampaignMember, CampaignRepo, CampaignRole, RepoError};

pub struct SqliteCampaignRepo {
    db: Database,
}

impl SqliteCampaignRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Seed or update a membership row.
    pub async fn upsert_member(
        &self,
        campaign_id: CampaignId,
        member: &CampaignMember,
    ) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO campaign_members
                (campaign_id, user_id, role, character_id, active, joined_at)
            VALUES (?, ?, ?, ?, 1, ?)
            "#,
        )
        .bind(campaign_id.to_string())
        .bind(member.user_id.to_string())
        .bind(member.role.to_string())
        .bind(member.character_id.map(|id| id.to_string()))
        .bind(member.joined_at)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }
}

#[async_trait]
impl CampaignRepo for SqliteCampaignRepo {
    async fn active_members(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Vec<CampaignMember>, RepoError> {
        let rows: Vec<(String, String, Option<String>, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT user_id, role, character_id, joined_at
            FROM campaign_members
            WHERE campaign_id = ? AND active = 1
            ORDER BY joined_at ASC
            "#,
        )
        .bind(campaign_id.to_string())
        .fetch_all(self.db.pool())
        .await?;

        rows.into_iter()
            .map(|(user_id, role, character_id, joined_at)| {
                Ok(CampaignMember {
                    user_id: parse_id::<UserId>(&user_id)?,
                    role: role
                        .parse()
                        .map_err(|e: dmforge_domain::DomainError| {
                            RepoError::Serialization(e.to_string())
                        })?,
                    character_id: character_id
                        .map(|id| parse_id::<CharacterId>(&id))
                        .transpose()?,
                    joined_at,
                })
            })
            .collect()
    }

    async fn role_of(
        &self,
        campaign_id: CampaignId,
        user_id: UserId,
    ) -> Result<Option<CampaignRole>, RepoError> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT role FROM campaign_members WHERE campaign_id = ? AND user_id = ? AND active = 1",
        )
        .bind(campaign_id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(self.db.pool())
        .await?;

        row.map(|(role,)| {
            role.parse().map_err(|e: dmforge_domain::DomainError| {
                RepoError::Serialization(e.to_string())
            })
        })
        .transpose()
    }
}

fn parse_id<T: std::str::FromStr<Err = uuid::Error>>(raw: &str) -> Result<T, RepoError> {
    raw.parse()
        .map_err(|e: uuid::Error| RepoError::Serialization(e.to_string()))
}
