//! Lock acquisition with jittered bounded retry.

use std::sync::Arc;
use std::time::Duration;

use common::{HolderId, ResourceId};
use resilience::{Backoff, Clock, Jitter, ResilienceError, RetryPolicy};

use crate::error::LockError;
use crate::lease::Lease;
use crate::store::{AcquireOutcome, LockStore};

/// Retry bounds for lock acquisition.
#[derive(Debug, Clone, Copy)]
pub struct LockManagerConfig {
    /// Acquisition attempts before giving up with `Unavailable`.
    pub max_attempts: u32,
    /// Base delay of the exponential backoff between attempts.
    pub backoff_base: Duration,
    /// Cap on the backoff delay.
    pub backoff_max: Duration,
}

impl Default for LockManagerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_base: Duration::from_millis(50),
            backoff_max: Duration::from_secs(1),
        }
    }
}

/// Acquires and releases per-resource leases against a [`LockStore`].
///
/// Contending callers back off with full jitter between attempts so they
/// do not re-collide in lockstep. A fresh holder identity is generated
/// per acquisition, so a manager can only release leases it acquired.
pub struct LockManager<S> {
    store: S,
    clock: Arc<dyn Clock>,
    config: LockManagerConfig,
}

impl<S: LockStore> LockManager<S> {
    /// Creates a manager with default retry bounds.
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        Self::with_config(store, clock, LockManagerConfig::default())
    }

    /// Creates a manager with explicit retry bounds.
    pub fn with_config(store: S, clock: Arc<dyn Clock>, config: LockManagerConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Returns the underlying lock store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Acquires the lock for `key`, holding it for at most `lease_duration`.
    ///
    /// `lease_duration` must exceed the worst-case critical-section time:
    /// the lease expires on schedule whether or not the holder is done.
    #[tracing::instrument(skip(self), fields(%key))]
    pub async fn acquire(&self, key: ResourceId, lease_duration: Duration) -> Result<Lease, LockError> {
        let holder = HolderId::new();
        let retry = RetryPolicy::<LockError>::builder()
            .max_attempts(self.config.max_attempts)
            .backoff(Backoff::new(
                self.config.backoff_base,
                2.0,
                self.config.backoff_max,
            ))
            .jitter(Jitter::Full)
            .clock(Arc::clone(&self.clock))
            .should_retry(|error| matches!(error, LockError::AlreadyHeld(_)))
            .build();

        let store = &self.store;
        let result = retry
            .execute(|| async move {
                match store
                    .set_if_absent_or_expired(key, holder, lease_duration)
                    .await?
                {
                    AcquireOutcome::Acquired => Ok(()),
                    AcquireOutcome::AlreadyHeld => Err(LockError::AlreadyHeld(key)),
                }
            })
            .await;

        match result {
            Ok(()) => {
                let now = self.clock.now();
                tracing::debug!(%holder, "lease acquired");
                Ok(Lease::new(key, holder, now, now + lease_duration))
            }
            Err(ResilienceError::RetriesExhausted { attempts, .. }) => {
                metrics::counter!("lock_acquire_failures_total").increment(1);
                tracing::debug!(attempts, "lock unavailable, giving up");
                Err(LockError::Unavailable { key, attempts })
            }
            Err(ResilienceError::Inner(error)) => Err(error),
            Err(other) => Err(LockError::Store(other.to_string())),
        }
    }

    /// Releases a held lease.
    ///
    /// Releasing a lease that already expired, or that another holder has
    /// since taken over, succeeds without effect — compensation paths must
    /// not fail merely because the lease is gone.
    pub async fn release(&self, lease: &Lease) -> Result<(), LockError> {
        self.store
            .delete_if_held_by(lease.resource_key(), lease.holder())
            .await
    }
}
