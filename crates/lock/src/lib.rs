//! Distributed mutual exclusion keyed by resource id.
//!
//! A [`LockManager`] serializes the critical section of the reservation
//! workflow: it acquires a time-bounded [`Lease`] per resource through a
//! [`LockStore`], retrying with jittered backoff while another holder is
//! active. Leases self-expire so a crashed holder cannot deadlock the
//! resource.
//!
//! The store contract is a single atomic check-and-create
//! (`set_if_absent_or_expired`) plus a holder-scoped delete, so any
//! backing implementation with those two atomic operations can serve as
//! the lock authority. [`InMemoryLockStore`] is the in-process binding.

pub mod error;
pub mod lease;
pub mod manager;
pub mod store;

pub use error::LockError;
pub use lease::Lease;
pub use manager::{LockManager, LockManagerConfig};
pub use store::{AcquireOutcome, InMemoryLockStore, LockStore};
