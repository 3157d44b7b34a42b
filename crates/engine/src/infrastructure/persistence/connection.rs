//! Database connection and idempotent schema creation.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

/// Shared SQLite pool with the engine schema applied.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if missing) and migrate a database.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// In-memory database for tests. A single connection keeps every
    /// query on the same memory store.
    pub async fn connect_in_memory() -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(&self) -> Result<(), sqlx::Error> {
        // Current session state: the single authoritative value.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS session_states (
                session_id TEXT PRIMARY KEY,
                campaign_id TEXT NOT NULL,
                state TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Append-only audit log, one row per state mutation.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS game_state_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                event TEXT NOT NULL,
                actor TEXT NOT NULL,
                previous_state TEXT,
                new_state TEXT NOT NULL,
                metadata TEXT NOT NULL,
                at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Live battle state, change log embedded in the document.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS battle_states (
                session_id TEXT NOT NULL,
                character_id TEXT NOT NULL,
                state TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (session_id, character_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Current token positions.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS positions (
                campaign_id TEXT NOT NULL,
                character_id TEXT NOT NULL,
                x REAL NOT NULL,
                y REAL NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (campaign_id, character_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Append-only movement audit rows.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS movement_audit (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                campaign_id TEXT NOT NULL,
                character_id TEXT NOT NULL,
                prev_x REAL,
                prev_y REAL,
                new_x REAL NOT NULL,
                new_y REAL NOT NULL,
                mode TEXT NOT NULL,
                moved_by TEXT NOT NULL,
                reason TEXT,
                at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Append-only traveled path segments.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS movement_paths (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                campaign_id TEXT NOT NULL,
                character_id TEXT NOT NULL,
                start_x REAL NOT NULL,
                start_y REAL NOT NULL,
                start_at TEXT NOT NULL,
                end_x REAL NOT NULL,
                end_y REAL NOT NULL,
                end_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Campaign membership (owned by the campaign CRUD subsystem; this
        // engine only reads it, plus seeds it in tests).
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS campaign_members (
                campaign_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                role TEXT NOT NULL,
                character_id TEXT,
                active INTEGER NOT NULL DEFAULT 1,
                joined_at TEXT NOT NULL,
                PRIMARY KEY (campaign_id, user_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Encounter participants (owned by the encounter subsystem).
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS encounter_participants (
                encounter_id TEXT NOT NULL,
                seq INTEGER NOT NULL,
                participant TEXT NOT NULL,
                initiative INTEGER NOT NULL,
                PRIMARY KEY (encounter_id, seq)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Permanent character records (owned by the character subsystem;
        // this engine reads them and writes back HP/XP/level growth).
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS character_records (
                id TEXT PRIMARY KEY,
                owner TEXT NOT NULL,
                name TEXT NOT NULL,
                class TEXT NOT NULL,
                level INTEGER NOT NULL,
                hit_points INTEGER NOT NULL,
                xp INTEGER NOT NULL,
                abilities TEXT NOT NULL,
                spell_slots TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
