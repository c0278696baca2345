//! Reservation saga error types.

use common::ResourceId;
use thiserror::Error;

/// Faults surfaced by the saga as errors.
///
/// Business outcomes — rejections, cancellations — are not errors; they
/// are terminal states on the returned
/// [`ReservationAttempt`](crate::ReservationAttempt).
#[derive(Debug, Error)]
pub enum ReservationError {
    /// The request itself is malformed. Never retried.
    #[error("invalid reservation request: {0}")]
    InvalidRequest(String),

    /// The requested resource does not exist.
    #[error("resource not found: {0}")]
    ResourceNotFound(ResourceId),
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, ReservationError>;
