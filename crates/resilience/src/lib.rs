//! Admission-control primitives for calling unreliable dependencies.
//!
//! This crate provides the building blocks that keep one degraded
//! dependency from taking the rest of the process down with it:
//!
//! - [`RetryPolicy`] — bounded retry with exponential backoff and jitter
//! - [`CircuitBreaker`] — per-dependency failure detection with fail-fast
//! - [`Bulkhead`] — bounded concurrency and a bounded FIFO wait queue
//! - [`StaleReadCache`] — last-known-good fallback for read paths
//! - [`ResilienceRegistry`] — process-wide per-dependency singletons
//!
//! Timing is abstracted behind the [`Clock`] trait so backoff and expiry
//! logic is deterministic in tests.

pub mod backoff;
pub mod breaker;
pub mod bulkhead;
pub mod cache;
pub mod clock;
pub mod error;
pub mod registry;
pub mod retry;

pub use backoff::{Backoff, Jitter};
pub use breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use bulkhead::{Bulkhead, BulkheadConfig};
pub use cache::{CachedValue, StaleReadCache};
pub use clock::{Clock, ManualClock, TokioClock};
pub use error::ResilienceError;
pub use registry::ResilienceRegistry;
pub use retry::{RetryPolicy, RetryPolicyBuilder};
