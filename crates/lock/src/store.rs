//! Lock store trait and in-memory single-authority implementation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use common::{HolderId, ResourceId};
use resilience::Clock;

use crate::error::LockError;

/// Outcome of an atomic lease-creation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// The lease was created for the caller.
    Acquired,
    /// A valid lease held by someone else already exists.
    AlreadyHeld,
}

/// The lock authority's contract.
///
/// `set_if_absent_or_expired` must be a single atomic check-and-create:
/// two concurrent callers must never both observe `Acquired` for the same
/// key while a lease is valid.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Atomically creates a lease for `holder` if none exists for `key`
    /// or the existing one has expired.
    async fn set_if_absent_or_expired(
        &self,
        key: ResourceId,
        holder: HolderId,
        ttl: Duration,
    ) -> Result<AcquireOutcome, LockError>;

    /// Deletes the lease for `key` only if `holder` holds it.
    ///
    /// Deleting an absent lease, or one held by another holder, succeeds
    /// without effect.
    async fn delete_if_held_by(&self, key: ResourceId, holder: HolderId) -> Result<(), LockError>;
}

#[derive(Debug, Clone, Copy)]
struct StoredLease {
    holder: HolderId,
    expires_at: Instant,
}

/// In-process single-authority lock store.
///
/// The whole lease map sits behind one mutex so the check-and-create in
/// `set_if_absent_or_expired` is atomic. Expired entries are overwritten
/// in place on the next acquisition attempt.
pub struct InMemoryLockStore {
    clock: Arc<dyn Clock>,
    leases: Mutex<HashMap<ResourceId, StoredLease>>,
}

impl InMemoryLockStore {
    /// Creates an empty lock store judging expiry against `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            leases: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the holder of a currently valid lease for `key`, if any.
    pub fn holder_of(&self, key: ResourceId) -> Option<HolderId> {
        let leases = self.leases.lock().unwrap();
        let lease = leases.get(&key)?;
        if self.clock.now() < lease.expires_at {
            Some(lease.holder)
        } else {
            None
        }
    }

    /// Number of currently valid leases.
    pub fn active_lease_count(&self) -> usize {
        let now = self.clock.now();
        self.leases
            .lock()
            .unwrap()
            .values()
            .filter(|lease| now < lease.expires_at)
            .count()
    }
}

#[async_trait]
impl LockStore for InMemoryLockStore {
    async fn set_if_absent_or_expired(
        &self,
        key: ResourceId,
        holder: HolderId,
        ttl: Duration,
    ) -> Result<AcquireOutcome, LockError> {
        let now = self.clock.now();
        let mut leases = self.leases.lock().unwrap();

        if let Some(existing) = leases.get(&key)
            && now < existing.expires_at
        {
            return Ok(AcquireOutcome::AlreadyHeld);
        }

        leases.insert(
            key,
            StoredLease {
                holder,
                expires_at: now + ttl,
            },
        );
        Ok(AcquireOutcome::Acquired)
    }

    async fn delete_if_held_by(&self, key: ResourceId, holder: HolderId) -> Result<(), LockError> {
        let mut leases = self.leases.lock().unwrap();
        if let Some(existing) = leases.get(&key)
            && existing.holder == holder
        {
            leases.remove(&key);
        }
        Ok(())
    }
}
