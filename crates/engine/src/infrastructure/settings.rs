//! Engine settings loaded from the environment.
//!
//! Mirrors the platform convention: `.env` is honored when present, every
//! value has a default, and invalid values fall back with a warning
//! rather than aborting startup.

use std::time::Duration;

use dmforge_domain::{GridConfig, GridKind, Point};

/// Process-wide engine configuration.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// SQLite database URL.
    pub database_url: String,
    /// World grid configuration (immutable for the process lifetime).
    pub grid: GridConfig,
    /// Movement budget granted at the start of a player combat turn.
    pub default_speed: f64,
    /// Movement policy: maximum distance per move. Enforced by the API
    /// layer before calling the movement resolver, not by the resolver.
    pub max_move_distance: f64,
    /// Movement policy: minimum interval between moves, in milliseconds.
    /// Enforced by the API layer, same as `max_move_distance`.
    pub min_move_interval_ms: u64,
    /// Warn when a row lock is held longer than this many seconds.
    pub lock_warn_secs: u64,
}

impl EngineSettings {
    /// Load settings from the environment, with `.env` support.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let grid_kind = env_parse("DMFORGE_GRID_KIND", GridKind::Square);
        let grid_size = env_parse("DMFORGE_GRID_SIZE", 5.0_f64);
        let origin = Point::new(
            env_parse("DMFORGE_GRID_ORIGIN_X", 0.0),
            env_parse("DMFORGE_GRID_ORIGIN_Y", 0.0),
        );

        let grid = GridConfig::new(grid_kind, grid_size, origin).unwrap_or_else(|err| {
            tracing::warn!(%err, "Invalid grid configuration, using defaults");
            GridConfig {
                kind: GridKind::Square,
                size: 5.0,
                origin: Point::new(0.0, 0.0),
            }
        });

        Self {
            database_url: std::env::var("DMFORGE_DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://dmforge.db".to_string()),
            grid,
            default_speed: env_parse("DMFORGE_DEFAULT_SPEED", 30.0),
            max_move_distance: env_parse("DMFORGE_MAX_MOVE_DISTANCE", 120.0),
            min_move_interval_ms: env_parse("DMFORGE_MIN_MOVE_INTERVAL_MS", 250),
            lock_warn_secs: env_parse("DMFORGE_LOCK_WARN_SECS", 5),
        }
    }

    pub fn lock_warn(&self) -> Duration {
        Duration::from_secs(self.lock_warn_secs)
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://dmforge.db".to_string(),
            grid: GridConfig {
                kind: GridKind::Square,
                size: 5.0,
                origin: Point::new(0.0, 0.0),
            },
            default_speed: 30.0,
            max_move_distance: 120.0,
            min_move_interval_ms: 250,
            lock_warn_secs: 5,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key, raw = %raw, "Unparseable setting, using default");
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let settings = EngineSettings::default();
        assert_eq!(settings.grid.kind, GridKind::Square);
        assert!(settings.grid.size > 0.0);
        assert!(settings.default_speed > 0.0);
        assert!(settings.lock_warn().as_secs() >= 1);
    }
}
