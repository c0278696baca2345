//! Time-bounded ownership of a resource lock.

use std::time::{Duration, Instant};

use common::{HolderId, ResourceId};

/// A time-bounded ownership grant over one resource's lock.
///
/// At most one valid (non-expired) lease exists per resource key. The
/// lease expires at `expires_at` whether or not the holder releases it,
/// which bounds how long a crashed holder can block contenders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lease {
    resource_key: ResourceId,
    holder: HolderId,
    acquired_at: Instant,
    expires_at: Instant,
}

impl Lease {
    /// Creates a lease held from `acquired_at` until `expires_at`.
    pub fn new(
        resource_key: ResourceId,
        holder: HolderId,
        acquired_at: Instant,
        expires_at: Instant,
    ) -> Self {
        Self {
            resource_key,
            holder,
            acquired_at,
            expires_at,
        }
    }

    /// The resource this lease locks.
    pub fn resource_key(&self) -> ResourceId {
        self.resource_key
    }

    /// The identity holding this lease.
    pub fn holder(&self) -> HolderId {
        self.holder
    }

    /// When the lease was granted.
    pub fn acquired_at(&self) -> Instant {
        self.acquired_at
    }

    /// When the lease expires regardless of release.
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Returns true if the lease is no longer valid at `now`.
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    /// Time left on the lease at `now`, zero if expired.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }
}
