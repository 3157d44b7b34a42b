//! SQLite adapter for encounter participant reads.

use async_trait::async_trait;

use dmforge_domain::{EncounterId, Participant};

use super::Database;
use crate::infrastructure::ports::{EncounterParticipant, EncounterRepo, RepoError};

pub struct SqliteEncounterRepo {
    db: Database,
}

impl SqliteEncounterRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Register a combatant. `seq` is assigned in registration order.
    pub async fn add_participant(
        &self,
        encounter_id: EncounterId,
        participant: Participant,
        initiative: i32,
    ) -> Result<(), RepoError> {
        let (next_seq,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(MAX(seq), 0) + 1 FROM encounter_participants WHERE encounter_id = ?",
        )
        .bind(encounter_id.to_string())
        .fetch_one(self.db.pool())
        .await?;

        sqlx::query(
            r#"
            INSERT INTO encounter_participants (encounter_id, seq, participant, initiative)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(encounter_id.to_string())
        .bind(next_seq)
        .bind(participant.to_string())
        .bind(initiative)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }
}

#[async_trait]
impl EncounterRepo for SqliteEncounterRepo {
    async fn participants(
        &self,
        encounter_id: EncounterId,
    ) -> Result<Vec<EncounterParticipant>, RepoError> {
        let rows: Vec<(String, i32, i64)> = sqlx::query_as(
            r#"
            SELECT participant, initiative, seq
            FROM encounter_participants
            WHERE encounter_id = ?
            ORDER BY seq ASC
            "#,
        )
        .bind(encounter_id.to_string())
        .fetch_all(self.db.pool())
        .await?;

        rows.into_iter()
            .map(|(participant, initiative, seq)| {
                Ok(EncounterParticipant {
                    participant: participant.parse().map_err(
                        |e: dmforge_domain::DomainError| RepoError::Serialization(e.to_string()),
                    )?,
                    initiative,
                    seq,
                })
            })
            .collect()
    }
}
