//! SQLite adapter for token positions, movement audit rows, and path
//! segments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use dmforge_domain::{CampaignId, CharacterId, Point};

use super::Database;
use crate::infrastructure::ports::{MoveAuditRow, MovementRepo, PathSegment, PositionRecord, RepoError};

pub struct SqliteMovementRepo {
    db: Database,
}

impl SqliteMovementRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Audit row count for a character, used by tests and retention
    /// tooling.
    pub async fn audit_count(
        &self,
        campaign_id: CampaignId,
        character_id: CharacterId,
    ) -> Result<i64, RepoError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM movement_audit WHERE campaign_id = ? AND character_id = ?",
        )
        .bind(campaign_id.to_string())
        .bind(character_id.to_string())
        .fetch_one(self.db.pool())
        .await?;
        Ok(count)
    }

    /// Path segment count for a character.
    pub async fn path_count(
        &self,
        campaign_id: CampaignId,
        character_id: CharacterId,
    ) -> Result<i64, RepoError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM movement_paths WHERE campaign_id = ? AND character_id = ?",
        )
        .bind(campaign_id.to_string())
        .bind(character_id.to_string())
        .fetch_one(self.db.pool())
        .await?;
        Ok(count)
    }
}

#[async_trait]
impl MovementRepo for SqliteMovementRepo {
    async fn get_position(
        &self,
        campaign_id: CampaignId,
        character_id: CharacterId,
    ) -> Result<Option<PositionRecord>, RepoError> {
        let row: Option<(f64, f64, DateTime<Utc>)> = sqlx::query_as(
            "SELECT x, y, updated_at FROM positions WHERE campaign_id = ? AND character_id = ?",
        )
        .bind(campaign_id.to_string())
        .bind(character_id.to_string())
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|(x, y, updated_at)| PositionRecord {
            campaign_id,
            character_id,
            point: Point::new(x, y),
            updated_at,
        }))
    }

    async fn put_move(
        &self,
        position: &PositionRecord,
        audit: &MoveAuditRow,
        path: &PathSegment,
    ) -> Result<(), RepoError> {
        // Position update, audit row, and path segment commit together.
        let mut tx = self.db.pool().begin().await?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO positions (campaign_id, character_id, x, y, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(position.campaign_id.to_string())
        .bind(position.character_id.to_string())
        .bind(position.point.x)
        .bind(position.point.y)
        .bind(position.updated_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO movement_audit
                (campaign_id, character_id, prev_x, prev_y, new_x, new_y, mode, moved_by, reason, at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(audit.campaign_id.to_string())
        .bind(audit.character_id.to_string())
        .bind(audit.previous_point.map(|p| p.x))
        .bind(audit.previous_point.map(|p| p.y))
        .bind(audit.new_point.x)
        .bind(audit.new_point.y)
        .bind(audit.mode.to_string())
        .bind(audit.moved_by.to_string())
        .bind(audit.reason.as_deref())
        .bind(audit.at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO movement_paths
                (campaign_id, character_id, start_x, start_y, start_at, end_x, end_y, end_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(path.campaign_id.to_string())
        .bind(path.character_id.to_string())
        .bind(path.start.x)
        .bind(path.start.y)
        .bind(path.start_at)
        .bind(path.end.x)
        .bind(path.end.y)
        .bind(path.end_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}
