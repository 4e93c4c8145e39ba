//! Daily counter store with a shared and an in-process backend.
//!
//! The backend is resolved exactly once at startup: if the configured Redis
//! target answers a PING, counters live in Redis and are shared between bot
//! instances; on any failure (or no target configured) the store permanently
//! degrades to an in-process map for the lifetime of the process. There is no
//! retry loop back to Redis.
//!
//! # Degraded mode
//!
//! In fallback mode quota is NOT shared across bot instances — each process
//! enforces the daily allowance on its own. This is an accepted degradation:
//! a single instance still accounts correctly, and the bot keeps working
//! through a Redis outage instead of refusing every generation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use redis::aio::ConnectionManager;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Counter key: one counter per user per local calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaKey {
    pub user: u64,
    pub day: String,
}

impl QuotaKey {
    pub fn new(user: u64, day: &str) -> Self {
        Self {
            user,
            day: day.to_string(),
        }
    }

    /// Canonical Redis key, e.g. `quota:123456:2026-03-01`.
    fn storage_key(&self) -> String {
        format!("quota:{}:{}", self.user, self.day)
    }
}

/// Atomic increment-with-expiry counter store.
///
/// An explicit two-variant sum type rather than a runtime flag, so which
/// backend a process ended up on is visible at the type level and in logs.
#[derive(Clone)]
pub enum CounterStore {
    /// Shared counters in Redis.
    Redis(ConnectionManager),
    /// Process-local fallback map.
    Memory(MemoryCounters),
}

impl CounterStore {
    /// Resolve the backend once at startup.
    ///
    /// Attempts to connect and PING the configured Redis target; on any
    /// failure the in-process backend is selected for the rest of the
    /// process lifetime and the substitution is logged once.
    pub async fn connect(redis_url: Option<&str>) -> Self {
        let Some(url) = redis_url.filter(|u| !u.is_empty()) else {
            info!("no Redis target configured, using in-process quota counters");
            return Self::Memory(MemoryCounters::default());
        };

        match Self::try_redis(url).await {
            Ok(conn) => {
                info!(target_url = %url, "quota counters backed by Redis");
                Self::Redis(conn)
            }
            Err(e) => {
                warn!(
                    target_url = %url,
                    error = %e,
                    "Redis unreachable at startup, permanently falling back \
                     to in-process quota counters (not shared across instances)",
                );
                Self::Memory(MemoryCounters::default())
            }
        }
    }

    async fn try_redis(url: &str) -> std::result::Result<ConnectionManager, redis::RedisError> {
        let client = redis::Client::open(url)?;
        let mut conn = client.get_connection_manager().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(conn)
    }

    /// Atomically increment the counter for `key` and return the new value.
    ///
    /// The first increment of a key also arms its expiry (`ttl_secs`, the gap
    /// to local midnight) so the counter self-resets at day rollover.
    pub async fn increment_and_get(&self, key: &QuotaKey, ttl_secs: i64) -> Result<u64> {
        match self {
            Self::Redis(conn) => {
                let storage_key = key.storage_key();
                let mut conn = conn.clone();
                // SET NX seeds the key with its expiry only when absent, so
                // the INCR in the same atomic pipeline observes a key whose
                // TTL is already armed.
                let (count,): (u64,) = redis::pipe()
                    .atomic()
                    .cmd("SET")
                    .arg(&storage_key)
                    .arg(0)
                    .arg("EX")
                    .arg(ttl_secs.max(1))
                    .arg("NX")
                    .ignore()
                    .cmd("INCR")
                    .arg(&storage_key)
                    .query_async(&mut conn)
                    .await?;
                Ok(count)
            }
            Self::Memory(counters) => Ok(counters.increment_and_get(key)),
        }
    }

    /// Best-effort decrement, clamped so the stored value never goes below
    /// zero. Failures are swallowed and logged — a refund is an optimization,
    /// not a correctness requirement.
    pub async fn decrement(&self, key: &QuotaKey) {
        match self {
            Self::Redis(conn) => {
                let storage_key = key.storage_key();
                let mut conn = conn.clone();
                let decremented: std::result::Result<i64, redis::RedisError> =
                    redis::cmd("DECR")
                        .arg(&storage_key)
                        .query_async(&mut conn)
                        .await;
                match decremented {
                    Ok(v) if v < 0 => {
                        // Clamp back to zero; best-effort, a concurrent
                        // increment between the two commands is tolerated.
                        if let Err(e) = redis::cmd("INCR")
                            .arg(&storage_key)
                            .query_async::<i64>(&mut conn)
                            .await
                        {
                            debug!(key = %storage_key, error = %e, "quota clamp failed");
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(key = %storage_key, error = %e, "quota refund failed, ignoring");
                    }
                }
            }
            Self::Memory(counters) => counters.decrement(key),
        }
    }

    /// Human-readable backend name for startup logs and `Debug`.
    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Redis(_) => "redis",
            Self::Memory(_) => "memory",
        }
    }

    /// Process-local backend, used directly by tests and by the fallback path.
    pub fn memory() -> Self {
        Self::Memory(MemoryCounters::default())
    }
}

impl std::fmt::Debug for CounterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("CounterStore")
            .field(&self.backend_name())
            .finish()
    }
}

/// In-process counter map with a coarse day-rollover reset.
///
/// Instead of per-key expiry, the map records which day it belongs to and is
/// cleared wholesale the first time a key from a newer day arrives. With no
/// cross-process sharing to stay consistent with, that is equivalent to the
/// Redis TTL behavior for a single instance.
#[derive(Clone, Default)]
pub struct MemoryCounters {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    /// Day the current map contents belong to.
    day: String,
    counts: HashMap<String, u64>,
}

impl MemoryCounters {
    fn increment_and_get(&self, key: &QuotaKey) -> u64 {
        let mut state = self.state.lock().expect("quota counter lock poisoned");
        state.roll_over_if_needed(&key.day);
        let count = state.counts.entry(key.storage_key()).or_insert(0);
        *count += 1;
        *count
    }

    fn decrement(&self, key: &QuotaKey) {
        let mut state = self.state.lock().expect("quota counter lock poisoned");
        state.roll_over_if_needed(&key.day);
        if let Some(count) = state.counts.get_mut(&key.storage_key()) {
            *count = count.saturating_sub(1);
        }
    }
}

impl MemoryState {
    fn roll_over_if_needed(&mut self, day: &str) {
        if self.day != day {
            if !self.day.is_empty() {
                debug!(old_day = %self.day, new_day = %day, "quota day rolled over, clearing counters");
            }
            self.day = day.to_string();
            self.counts.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(user: u64, day: &str) -> QuotaKey {
        QuotaKey::new(user, day)
    }

    #[test]
    fn test_storage_key_format() {
        assert_eq!(
            key(123456, "2026-03-01").storage_key(),
            "quota:123456:2026-03-01"
        );
    }

    #[tokio::test]
    async fn test_memory_increment_counts_up() {
        let store = CounterStore::memory();
        let k = key(1, "2026-03-01");
        for expected in 1..=5 {
            let got = store.increment_and_get(&k, 3600).await.unwrap();
            assert_eq!(got, expected);
        }
    }

    #[tokio::test]
    async fn test_memory_counters_are_per_user() {
        let store = CounterStore::memory();
        let day = "2026-03-01";
        assert_eq!(store.increment_and_get(&key(1, day), 60).await.unwrap(), 1);
        assert_eq!(store.increment_and_get(&key(2, day), 60).await.unwrap(), 1);
        assert_eq!(store.increment_and_get(&key(1, day), 60).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_memory_day_rollover_clears_all_counters() {
        let store = CounterStore::memory();
        store
            .increment_and_get(&key(1, "2026-03-01"), 60)
            .await
            .unwrap();
        store
            .increment_and_get(&key(1, "2026-03-01"), 60)
            .await
            .unwrap();

        // First touch of the next day resets every user's counter.
        assert_eq!(
            store
                .increment_and_get(&key(1, "2026-03-02"), 60)
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            store
                .increment_and_get(&key(2, "2026-03-02"), 60)
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_memory_decrement_clamps_at_zero() {
        let store = CounterStore::memory();
        let k = key(7, "2026-03-01");

        // Decrement of a missing key is a no-op.
        store.decrement(&k).await;
        assert_eq!(store.increment_and_get(&k, 60).await.unwrap(), 1);

        store.decrement(&k).await;
        store.decrement(&k).await; // already zero, stays zero
        assert_eq!(store.increment_and_get(&k, 60).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_connect_without_target_uses_memory() {
        let store = CounterStore::connect(None).await;
        assert_eq!(store.backend_name(), "memory");
    }

    #[tokio::test]
    async fn test_connect_unreachable_target_falls_back() {
        // Nothing listens on this port; startup must degrade, not fail.
        let store = CounterStore::connect(Some("redis://127.0.0.1:1/")).await;
        assert_eq!(store.backend_name(), "memory");

        // And the fallback still enforces counting correctly.
        let k = key(1, "2026-03-01");
        assert_eq!(store.increment_and_get(&k, 60).await.unwrap(), 1);
        assert_eq!(store.increment_and_get(&k, 60).await.unwrap(), 2);
    }
}
