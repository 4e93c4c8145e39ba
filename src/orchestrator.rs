//! Generation orchestration: lock, charge, generate, deliver or refund.
//!
//! Entry point for the channel layer once a selection is complete. For one
//! user the sequence is strictly serialized: acquire that user's lock, charge
//! one quota unit, run the generation call, then either deliver the result or
//! refund the unit. The lock is held across the whole sequence (and nothing
//! else is), so a double-tap cannot double-charge or run two generations
//! against the same pending selection. Requests from different users do not
//! block each other.

use std::sync::Arc;

use tracing::{info, warn};

use crate::audit::{AuditHandle, AuditOutcome, AuditRecord};
use crate::locks::UserLockRegistry;
use crate::providers::{GeneratedImage, ImageGenerator, TryOnJob};
use crate::quota::QuotaManager;

/// What a generation request produced, from the channel layer's view.
///
/// Errors are folded in rather than returned as `Err` — denial and downstream
/// failure are expected outcomes the channel must render, not faults to
/// propagate.
#[derive(Debug)]
pub enum Outcome {
    /// Generation succeeded.
    Delivered(GeneratedImage),
    /// Daily allowance exhausted; nothing was generated. Carries enough for
    /// a "come back tomorrow" message.
    Denied { used: u64, remaining: u64, limit: u32 },
    /// The generation call (or the counter store) failed; any charged unit
    /// has been refunded.
    Failed(String),
}

/// Sequences lock acquisition, quota, the generation call, and refunds.
///
/// All collaborators are injected, so tests drive it with a stub generator
/// and an in-process counter store.
pub struct Orchestrator {
    quota: QuotaManager,
    locks: Arc<UserLockRegistry>,
    generator: Arc<dyn ImageGenerator>,
    audit: AuditHandle,
}

impl Orchestrator {
    pub fn new(
        quota: QuotaManager,
        locks: Arc<UserLockRegistry>,
        generator: Arc<dyn ImageGenerator>,
        audit: AuditHandle,
    ) -> Self {
        Self {
            quota,
            locks,
            generator,
            audit,
        }
    }

    /// Run one generation request for `job.user`.
    ///
    /// Blocks (cooperatively) until the user's previous request finishes —
    /// there is no wait timeout, a second tap just queues behind the first.
    /// The lock guard is dropped on every exit path.
    pub async fn request_generation(&self, job: TryOnJob) -> Outcome {
        let user = job.user;
        let lock = self.locks.lock_for(user);
        let _guard = lock.lock().await;

        let decision = match self.quota.consume(user).await {
            Ok(decision) => decision,
            Err(e) => {
                // Nothing was charged, so there is nothing to refund.
                warn!(user = user, error = %e, "quota check failed");
                return Outcome::Failed(e.to_string());
            }
        };

        if !decision.allowed {
            info!(
                user = user,
                used = decision.used,
                limit = decision.limit,
                "generation denied: daily allowance exhausted",
            );
            return Outcome::Denied {
                used: decision.used,
                remaining: decision.remaining,
                limit: decision.limit,
            };
        }

        match self.generator.generate(&job).await {
            Ok(image) => {
                info!(
                    user = user,
                    used = decision.used,
                    remaining = decision.remaining,
                    selection = %job.summary(),
                    "generation delivered",
                );
                self.audit.notify(AuditRecord {
                    user,
                    summary: job.summary(),
                    outcome: AuditOutcome::Delivered(image.bytes.clone()),
                });
                Outcome::Delivered(image)
            }
            Err(e) => {
                // The attempt was charged but produced nothing — give the
                // unit back so a broken upstream doesn't eat the allowance.
                warn!(user = user, error = %e, "generation failed, refunding");
                self.quota.refund(user).await;
                self.audit.notify(AuditRecord {
                    user,
                    summary: job.summary(),
                    outcome: AuditOutcome::Failed(e.to_string()),
                });
                Outcome::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono_tz::Tz;

    use crate::error::FitroomError;
    use crate::quota::CounterStore;

    /// Stub generator that records how many calls overlap in flight.
    struct StubGenerator {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        delay: Duration,
        fail: bool,
    }

    impl StubGenerator {
        fn new(delay: Duration, fail: bool) -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                delay,
                fail,
            }
        }

        fn max_seen(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ImageGenerator for StubGenerator {
        async fn generate(&self, _job: &TryOnJob) -> crate::error::Result<GeneratedImage> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail {
                Err(FitroomError::Generation("stub failure".into()))
            } else {
                Ok(GeneratedImage { bytes: vec![0xFF] })
            }
        }
    }

    fn job(user: u64) -> TryOnJob {
        TryOnJob {
            user,
            photo_path: PathBuf::from("/tmp/photo.jpg"),
            product: "pocket_t_shirt".into(),
            color: "black".into(),
            print: "paint".into(),
        }
    }

    fn setup(limit: u32, generator: Arc<StubGenerator>) -> (Orchestrator, QuotaManager) {
        let quota = QuotaManager::new(CounterStore::memory(), limit, Tz::UTC);
        let orchestrator = Orchestrator::new(
            quota.clone(),
            Arc::new(UserLockRegistry::new()),
            generator,
            AuditHandle::disabled(),
        );
        (orchestrator, quota)
    }

    #[tokio::test]
    async fn test_delivers_within_allowance() {
        let generator = Arc::new(StubGenerator::new(Duration::ZERO, false));
        let (orchestrator, _) = setup(2, generator);

        match orchestrator.request_generation(job(1)).await {
            Outcome::Delivered(image) => assert_eq!(image.bytes, vec![0xFF]),
            other => panic!("expected Delivered, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_denied_when_allowance_exhausted() {
        let generator = Arc::new(StubGenerator::new(Duration::ZERO, false));
        let (orchestrator, _) = setup(1, generator.clone());

        assert!(matches!(
            orchestrator.request_generation(job(1)).await,
            Outcome::Delivered(_)
        ));
        match orchestrator.request_generation(job(1)).await {
            Outcome::Denied {
                used,
                remaining,
                limit,
            } => {
                assert_eq!(used, 2);
                assert_eq!(remaining, 0);
                assert_eq!(limit, 1);
            }
            other => panic!("expected Denied, got {:?}", other),
        }
        // The denied attempt never reached the generator.
        assert_eq!(generator.max_seen(), 1);
    }

    #[tokio::test]
    async fn test_failure_refunds_the_charged_unit() {
        let generator = Arc::new(StubGenerator::new(Duration::ZERO, true));
        let (orchestrator, quota) = setup(3, generator);

        match orchestrator.request_generation(job(1)).await {
            Outcome::Failed(msg) => assert!(msg.contains("stub failure")),
            other => panic!("expected Failed, got {:?}", other),
        }

        // The failed attempt was forgiven: next consume is used = 1 again.
        assert_eq!(quota.consume(1).await.unwrap().used, 1);
    }

    #[tokio::test]
    async fn test_same_user_requests_never_overlap() {
        let generator = Arc::new(StubGenerator::new(Duration::from_millis(30), false));
        let (orchestrator, _) = setup(10, generator.clone());
        let orchestrator = Arc::new(orchestrator);

        let a = tokio::spawn({
            let o = orchestrator.clone();
            async move { o.request_generation(job(1)).await }
        });
        let b = tokio::spawn({
            let o = orchestrator.clone();
            async move { o.request_generation(job(1)).await }
        });
        assert!(matches!(a.await.unwrap(), Outcome::Delivered(_)));
        assert!(matches!(b.await.unwrap(), Outcome::Delivered(_)));

        assert_eq!(generator.max_seen(), 1, "same-user generations overlapped");
    }

    #[tokio::test]
    async fn test_different_users_proceed_concurrently() {
        let generator = Arc::new(StubGenerator::new(Duration::from_millis(30), false));
        let (orchestrator, _) = setup(10, generator.clone());
        let orchestrator = Arc::new(orchestrator);

        let a = tokio::spawn({
            let o = orchestrator.clone();
            async move { o.request_generation(job(1)).await }
        });
        let b = tokio::spawn({
            let o = orchestrator.clone();
            async move { o.request_generation(job(2)).await }
        });
        a.await.unwrap();
        b.await.unwrap();

        assert_eq!(generator.max_seen(), 2, "different users were serialized");
    }

    #[tokio::test]
    async fn test_second_request_bills_after_first_completes() {
        // Back-to-back requests for one user: the second is billed only
        // after the first's full sequence, so with limit 1 it must observe
        // used = 2 and be denied, never a racy double-delivery.
        let generator = Arc::new(StubGenerator::new(Duration::from_millis(20), false));
        let (orchestrator, _) = setup(1, generator);
        let orchestrator = Arc::new(orchestrator);

        let a = tokio::spawn({
            let o = orchestrator.clone();
            async move { o.request_generation(job(1)).await }
        });
        let b = tokio::spawn({
            let o = orchestrator.clone();
            async move { o.request_generation(job(1)).await }
        });
        let (a, b) = (a.await.unwrap(), b.await.unwrap());

        let delivered = [&a, &b]
            .iter()
            .filter(|o| matches!(o, Outcome::Delivered(_)))
            .count();
        let denied = [&a, &b]
            .iter()
            .filter(|o| matches!(o, Outcome::Denied { .. }))
            .count();
        assert_eq!((delivered, denied), (1, 1));
    }
}
