//! Keyed async lock registry for row-level mutual exclusion.
//!
//! Every locked read-modify-write cycle in the engine holds exactly one
//! of these locks for its whole duration: session-state operations lock
//! the session, battle-state operations lock the (session, character)
//! row, movement locks the (campaign, character) position row.
//!
//! This registry is the single-writer arbitration for a single-instance
//! deployment. Multi-instance deployments must move arbitration into the
//! storage layer (`SELECT ... FOR UPDATE` semantics); the port layout
//! keeps that swap local to the adapters.
//!
//! Guards release on drop, so the lock is released on every exit path
//! including errors. A guard held longer than the watchdog threshold
//! emits a warning on release - observability, not correctness.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use dmforge_domain::{CampaignId, CharacterId, SessionId};

/// Identifies one lockable row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockKey {
    Session(SessionId),
    Battle(SessionId, CharacterId),
    Position(CampaignId, CharacterId),
}

/// Keyed mutex registry. Cheap to clone via `Arc` at composition time.
pub struct LockRegistry {
    locks: DashMap<LockKey, Arc<Mutex<()>>>,
    warn_after: Duration,
}

impl LockRegistry {
    pub fn new(warn_after: Duration) -> Self {
        Self {
            locks: DashMap::new(),
            warn_after,
        }
    }

    /// Acquire the lock for a row, waiting until the current holder
    /// commits or rolls back. No busy-polling; this suspends the task.
    pub async fn acquire(&self, key: LockKey) -> LockGuard {
        let mutex = self.locks.entry(key).or_default().clone();
        let guard = mutex.lock_owned().await;
        LockGuard {
            _guard: guard,
            key,
            acquired_at: Instant::now(),
            warn_after: self.warn_after,
        }
    }
}

/// RAII lock guard with a hold-duration watchdog.
pub struct LockGuard {
    _guard: OwnedMutexGuard<()>,
    key: LockKey,
    acquired_at: Instant,
    warn_after: Duration,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let held = self.acquired_at.elapsed();
        if held > self.warn_after {
            tracing::warn!(
                key = ?self.key,
                held_ms = held.as_millis() as u64,
                threshold_ms = self.warn_after.as_millis() as u64,
                "Row lock held unusually long"
            );
        }
    }
}
