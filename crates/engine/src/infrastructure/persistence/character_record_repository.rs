//! SQLite adapter for the permanent character record surface.
//!
//! The character-sheet subsystem owns these rows; this engine reads them
//! at session activation and leveling, and writes back HP/XP at session
//! end.

use std::collections::BTreeMap;

use async_trait::async_trait;

use dmforge_domain::{CharacterId, UserId};

use super::Database;
use crate::infrastructure::ports::{
    Abilities, CharacterRecord, CharacterRecordRepo, RepoError,
};

pub struct SqliteCharacterRecordRepo {
    db: Database,
}

impl SqliteCharacterRecordRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Seed or replace a full record (session hosts and test setups).
    pub async fn upsert(&self, record: &CharacterRecord) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO character_records
                (id, owner, name, class, level, hit_points, xp, abilities, spell_slots)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.owner.to_string())
        .bind(&record.name)
        .bind(&record.class)
        .bind(record.level as i32)
        .bind(record.hit_points)
        .bind(record.xp)
        .bind(serde_json::to_string(&record.abilities)?)
        .bind(serde_json::to_string(&record.spell_slots)?)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }
}

#[async_trait]
impl CharacterRecordRepo for SqliteCharacterRecordRepo {
    async fn get(&self, id: CharacterId) -> Result<Option<CharacterRecord>, RepoError> {
        let row: Option<(String, String, String, i32, i32, i64, String, String)> = sqlx::query_as(
            r#"
            SELECT owner, name, class, level, hit_points, xp, abilities, spell_slots
            FROM character_records
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(self.db.pool())
        .await?;

        row.map(
            |(owner, name, class, level, hit_points, xp, abilities, spell_slots)| {
                let owner: UserId = owner
                    .parse()
                    .map_err(|e: uuid::Error| RepoError::Serialization(e.to_string()))?;
                let abilities: Abilities = serde_json::from_str(&abilities)?;
                let spell_slots: BTreeMap<u8, u8> = serde_json::from_str(&spell_slots)?;

                Ok(CharacterRecord {
                    id,
                    owner,
                    name,
                    class,
                    level: level.clamp(1, 20) as u8,
                    hit_points,
                    xp,
                    abilities,
                    spell_slots,
                })
            },
        )
        .transpose()
    }

    async fn sync_back(
        &self,
        id: CharacterId,
        hit_points: i32,
        xp_gained: i64,
    ) -> Result<(), RepoError> {
        let result = sqlx::query(
            "UPDATE character_records SET hit_points = ?, xp = xp + ? WHERE id = ?",
        )
        .bind(hit_points)
        .bind(xp_gained)
        .bind(id.to_string())
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn apply_level_up(
        &self,
        id: CharacterId,
        level: u8,
        hit_points: i32,
        spell_slots: &BTreeMap<u8, u8>,
    ) -> Result<(), RepoError> {
        let result = sqlx::query(
            "UPDATE character_records SET level = ?, hit_points = ?, spell_slots = ? WHERE id = ?",
        )
        .bind(level as i32)
        .bind(hit_points)
        .bind(serde_json::to_string(spell_slots)?)
        .bind(id.to_string())
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
