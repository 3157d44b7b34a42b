//! SQLite adapter for session game state and its audit log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use dmforge_domain::{GameStateLogEntry, SessionGameState, SessionId};

use super::Database;
use crate::infrastructure::ports::{RepoError, SessionStateRepo};

pub struct SqliteSessionStateRepo {
    db: Database,
}

impl SqliteSessionStateRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionStateRepo for SqliteSessionStateRepo {
    async fn get(&self, id: SessionId) -> Result<Option<SessionGameState>, RepoError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT state FROM session_states WHERE session_id = ?")
                .bind(id.to_string())
                .fetch_optional(self.db.pool())
                .await?;

        row.map(|(state,)| serde_json::from_str(&state).map_err(RepoError::from))
            .transpose()
    }

    async fn put_with_log(
        &self,
        state: &SessionGameState,
        entry: &GameStateLogEntry,
    ) -> Result<(), RepoError> {
        let state_json = serde_json::to_string(state)?;
        let previous_json = entry
            .previous_state
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let new_json = serde_json::to_string(&entry.new_state)?;
        let metadata_json = serde_json::to_string(&entry.metadata)?;

        // State write and log append are one atomic unit: the log is
        // never ahead of or behind the authoritative state.
        let mut tx = self.db.pool().begin().await?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO session_states (session_id, campaign_id, state, updated_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(state.session_id.to_string())
        .bind(state.campaign_id.to_string())
        .bind(&state_json)
        .bind(entry.at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO game_state_log (session_id, event, actor, previous_state, new_state, metadata, at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.session_id.to_string())
        .bind(entry.event.to_string())
        .bind(entry.actor.to_string())
        .bind(previous_json)
        .bind(&new_json)
        .bind(&metadata_json)
        .bind(entry.at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn log_entries(&self, id: SessionId) -> Result<Vec<GameStateLogEntry>, RepoError> {
        let rows = sqlx::query(
            r#"
            SELECT session_id, event, actor, previous_state, new_state, metadata, at
            FROM game_state_log
            WHERE session_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(id.to_string())
        .fetch_all(self.db.pool())
        .await?;

        rows.into_iter()
            .map(|row| {
                let session_id: String = row.try_get("session_id")?;
                let event: String = row.try_get("event")?;
                let actor: String = row.try_get("actor")?;
                let previous_state: Option<String> = row.try_get("previous_state")?;
                let new_state: String = row.try_get("new_state")?;
                let metadata: String = row.try_get("metadata")?;
                let at: DateTime<Utc> = row.try_get("at")?;

                Ok(GameStateLogEntry {
                    session_id: session_id
                        .parse()
                        .map_err(|e: uuid::Error| RepoError::Serialization(e.to_string()))?,
                    event: event
                        .parse()
                        .map_err(|e: dmforge_domain::DomainError| {
                            RepoError::Serialization(e.to_string())
                        })?,
                    actor: actor
                        .parse()
                        .map_err(|e: uuid::Error| RepoError::Serialization(e.to_string()))?,
                    previous_state: previous_state
                        .map(|json| serde_json::from_str(&json))
                        .transpose()?,
                    new_state: serde_json::from_str(&new_state)?,
                    metadata: serde_json::from_str(&metadata)?,
                    at,
                })
            })
            .collect()
    }
}
