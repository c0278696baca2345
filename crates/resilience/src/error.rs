//! Shared error taxonomy for the admission-control primitives.

use std::time::Duration;

use thiserror::Error;

/// Errors produced by wrapping an operation in resilience primitives.
///
/// `E` is the wrapped operation's own error type. Every variant other than
/// `Inner` means the dependency was shielded — either never contacted
/// (circuit open, admission rejected) or cut off (timeouts, exhausted
/// retries).
#[derive(Debug, Error)]
pub enum ResilienceError<E> {
    /// The wrapped operation failed with its own error.
    #[error("{0}")]
    Inner(E),

    /// All retry attempts were consumed without success.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: E },

    /// The circuit breaker is open; the dependency was not contacted.
    #[error("circuit open for dependency '{dependency}'")]
    CircuitOpen { dependency: String },

    /// The bulkhead wait queue was full and the task was shed.
    #[error("admission rejected: wait queue full ({max_queue} waiting)")]
    AdmissionRejected { max_queue: usize },

    /// The task waited in the bulkhead queue past its deadline.
    #[error("admission timed out after {waited:?} in queue")]
    AdmissionTimeout { waited: Duration },

    /// The operation exceeded its deadline.
    #[error("deadline of {deadline:?} exceeded")]
    DeadlineExceeded { deadline: Duration },

    /// The live path failed and no stale cache entry was usable.
    #[error("no cached data available for fallback")]
    NoCachedData,
}

impl<E> ResilienceError<E> {
    /// Returns true if the call was rejected by an open circuit.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ResilienceError::CircuitOpen { .. })
    }

    /// Returns true if the call was shed by a full bulkhead queue.
    pub fn is_admission_rejected(&self) -> bool {
        matches!(self, ResilienceError::AdmissionRejected { .. })
    }

    /// Returns true if the call ran out of time — in the bulkhead queue
    /// or against an operation deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            ResilienceError::AdmissionTimeout { .. } | ResilienceError::DeadlineExceeded { .. }
        )
    }

    /// Returns true if the retry budget was exhausted.
    pub fn is_retries_exhausted(&self) -> bool {
        matches!(self, ResilienceError::RetriesExhausted { .. })
    }
}

impl<E> ResilienceError<ResilienceError<E>> {
    /// Collapses one level of nesting produced by composing primitives.
    ///
    /// Stacking primitives (a breaker around a retry, a bulkhead around a
    /// breaker) types the outer layer's `Inner` as the inner layer's whole
    /// error. Flattening restores a single-layer error for callers.
    pub fn flatten(self) -> ResilienceError<E> {
        match self {
            ResilienceError::Inner(inner) => inner,
            ResilienceError::RetriesExhausted { last, .. } => last,
            ResilienceError::CircuitOpen { dependency } => {
                ResilienceError::CircuitOpen { dependency }
            }
            ResilienceError::AdmissionRejected { max_queue } => {
                ResilienceError::AdmissionRejected { max_queue }
            }
            ResilienceError::AdmissionTimeout { waited } => {
                ResilienceError::AdmissionTimeout { waited }
            }
            ResilienceError::DeadlineExceeded { deadline } => {
                ResilienceError::DeadlineExceeded { deadline }
            }
            ResilienceError::NoCachedData => ResilienceError::NoCachedData,
        }
    }
}
