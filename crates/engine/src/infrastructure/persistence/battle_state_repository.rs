//! SQLite adapter for live battle state.
//!
//! The full state document (embedded change log included) is the row;
//! there is exactly one per (session, character).

use async_trait::async_trait;
use chrono::Utc;

use dmforge_domain::{BattleState, CharacterId, SessionId};

use super::Database;
use crate::infrastructure::ports::{BattleStateRepo, RepoError};

pub struct SqliteBattleStateRepo {
    db: Database,
}

impl SqliteBattleStateRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BattleStateRepo for SqliteBattleStateRepo {
    async fn get(
        &self,
        session_id: SessionId,
        character_id: CharacterId,
    ) -> Result<Option<BattleState>, RepoError> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT state FROM battle_states WHERE session_id = ? AND character_id = ?",
        )
        .bind(session_id.to_string())
        .bind(character_id.to_string())
        .fetch_optional(self.db.pool())
        .await?;

        row.map(|(state,)| serde_json::from_str(&state).map_err(RepoError::from))
            .transpose()
    }

    async fn put(&self, state: &BattleState) -> Result<(), RepoError> {
        let state_json = serde_json::to_string(state)?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO battle_states (session_id, character_id, state, updated_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(state.session_id.to_string())
        .bind(state.character_id.to_string())
        .bind(&state_json)
        .bind(Utc::now())
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    async fn insert(&self, state: &BattleState) -> Result<(), RepoError> {
        let state_json = serde_json::to_string(state)?;

        sqlx::query(
            r#"
            INSERT INTO battle_states (session_id, character_id, state, updated_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(state.session_id.to_string())
        .bind(state.character_id.to_string())
        .bind(&state_json)
        .bind(Utc::now())
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    async fn list_for_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<BattleState>, RepoError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT state FROM battle_states WHERE session_id = ? ORDER BY character_id ASC",
        )
        .bind(session_id.to_string())
        .fetch_all(self.db.pool())
        .await?;

        rows.into_iter()
            .map(|(state,)| serde_json::from_str(&state).map_err(RepoError::from))
            .collect()
    }
}
