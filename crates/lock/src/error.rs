//! Lock error types.

use common::ResourceId;
use thiserror::Error;

/// Errors that can occur acquiring or releasing a lock.
#[derive(Debug, Error)]
pub enum LockError {
    /// The lock could not be acquired within the retry budget.
    ///
    /// This is a contention outcome, not a system fault; the caller
    /// should try again later.
    #[error("lock for resource {key} unavailable after {attempts} attempts")]
    Unavailable { key: ResourceId, attempts: u32 },

    /// A valid lease for the resource is held by someone else.
    #[error("lease for resource {0} is already held")]
    AlreadyHeld(ResourceId),

    /// The lock store itself failed.
    #[error("lock store error: {0}")]
    Store(String),
}

/// Convenience type alias for lock results.
pub type Result<T> = std::result::Result<T, LockError>;
