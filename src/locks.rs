//! Per-user generation locks.
//!
//! A user who taps "generate" twice in quick succession must not run two
//! downstream generations concurrently against the same pending selection,
//! and must not double-charge quota with two interleaved consume calls. The
//! registry hands out one async mutex per user, created on first sight and
//! retained for the process lifetime (bounded by the set of distinct users
//! seen — fine at this bot's scale, an eviction policy is a non-goal).
//!
//! Acquisition has no timeout: a second request simply waits for the first
//! to finish. A bounded wait with a "still busy" reply is a possible future
//! refinement, not current behavior.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

/// Registry of per-user mutual-exclusion handles.
///
/// An explicit, injectable object rather than a process-wide global, so tests
/// can substitute their own instance and observe contention directly.
#[derive(Debug, Default)]
pub struct UserLockRegistry {
    locks: DashMap<u64, Arc<Mutex<()>>>,
}

impl UserLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock handle for `user`, created lazily.
    ///
    /// Callers hold the returned `Arc` and `.lock().await` it; the guard's
    /// drop is the release, so every exit path (including panics) releases.
    pub fn lock_for(&self, user: u64) -> Arc<Mutex<()>> {
        self.locks
            .entry(user)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Number of distinct users seen so far.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
