//! Per-user daily generation quota.
//!
//! Every user gets a fixed allowance of generation attempts per calendar day
//! (in the configured time zone). [`QuotaManager::consume`] charges one unit
//! and reports whether the attempt is within the allowance;
//! [`QuotaManager::refund`] gives a unit back when a charged attempt failed
//! downstream, so a broken generation does not count against the user.

pub mod store;

use chrono::Utc;
use chrono_tz::Tz;
use tracing::debug;

use crate::clock;
use crate::error::Result;

pub use store::{CounterStore, QuotaKey};

/// Whether an attempt that ends up denied still consumes a counter unit.
///
/// `true` matches the increment-then-compare flow below: the counter always
/// counts the attempt and the comparison only decides the verdict. A burst of
/// retries past the limit therefore keeps `used` growing instead of probing
/// for free slots, and denied attempts are never refunded — they never
/// reached the paid downstream call.
pub const COUNT_DENIED_ATTEMPTS: bool = true;

/// Result of a consume attempt. Transient, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaDecision {
    /// Whether this attempt may proceed to the generation call.
    pub allowed: bool,
    /// Attempts charged to the user today, including this one.
    pub used: u64,
    /// Attempts left today after this one.
    pub remaining: u64,
    /// The configured daily allowance.
    pub limit: u32,
}

/// Daily allowance bookkeeping on top of a [`CounterStore`].
///
/// Cheap to clone; clones share the underlying counters.
#[derive(Debug, Clone)]
pub struct QuotaManager {
    store: CounterStore,
    limit: u32,
    tz: Tz,
}

impl QuotaManager {
    pub fn new(store: CounterStore, limit: u32, tz: Tz) -> Self {
        Self { store, limit, tz }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Charge one attempt for `user` and decide whether it is within today's
    /// allowance.
    ///
    /// The increment is unconditional (see [`COUNT_DENIED_ATTEMPTS`]): the
    /// counter is never read-then-written, only atomically incremented, so
    /// two racing calls can never observe the same `used` value.
    pub async fn consume(&self, user: u64) -> Result<QuotaDecision> {
        let now = Utc::now();
        let key = QuotaKey::new(user, &clock::day_key(now, self.tz));
        let ttl = clock::seconds_until_rollover(now, self.tz);

        let used = self.store.increment_and_get(&key, ttl).await?;
        let limit = u64::from(self.limit);
        let decision = QuotaDecision {
            allowed: used <= limit,
            used,
            remaining: limit.saturating_sub(used),
            limit: self.limit,
        };
        debug!(
            user = user,
            used = decision.used,
            remaining = decision.remaining,
            allowed = decision.allowed,
            "quota consumed",
        );
        Ok(decision)
    }

    /// Give back one unit charged by an earlier allowed [`consume`] whose
    /// generation call then failed.
    ///
    /// A compensating action, not a transaction: if the day rolled over in
    /// between, or the store hiccups, the correction may be off by one unit.
    /// That tolerance is accepted — the decrement is best-effort and never
    /// fails the caller.
    ///
    /// [`consume`]: QuotaManager::consume
    pub async fn refund(&self, user: u64) {
        let now = Utc::now();
        let key = QuotaKey::new(user, &clock::day_key(now, self.tz));
        self.store.decrement(&key).await;
        debug!(user = user, "quota refunded");
    }
}
