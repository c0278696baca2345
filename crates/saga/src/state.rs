//! Reservation saga state machine.

use serde::{Deserialize, Serialize};

/// The state of a reservation attempt in its lifecycle.
///
/// State transitions:
/// ```text
/// Initiated ──► Locked ──► AvailabilityConfirmed ──► InventoryDecremented ──► PaymentCaptured ──► Confirmed
///     │            │                │                        │
///     │            │                │                        ├──► CancelledPaymentFailed
///     │            │                │                        └──► CancelledPaymentTimeout
///     │            │                └──► RejectedInventoryRace
///     │            └──► RejectedUnavailable
///     └──► RejectedNoLock
/// ```
///
/// Rejections happen before any mutation and need no compensation;
/// cancellations happen after the inventory decrement and are preceded
/// by compensation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ReservationState {
    /// Request received, nothing acquired yet.
    #[default]
    Initiated,

    /// The per-resource lock is held.
    Locked,

    /// Availability covered the requested units (possibly from a stale read).
    AvailabilityConfirmed,

    /// Units were atomically taken from the resource.
    InventoryDecremented,

    /// Payment was captured.
    PaymentCaptured,

    /// Reservation complete (terminal state).
    Confirmed,

    /// The per-resource lock could not be acquired (terminal state).
    RejectedNoLock,

    /// Not enough units, or availability could not be determined
    /// (terminal state).
    RejectedUnavailable,

    /// The conditional decrement lost a race after an optimistic read
    /// (terminal state).
    RejectedInventoryRace,

    /// Payment failed after the decrement; inventory was compensated
    /// (terminal state).
    CancelledPaymentFailed,

    /// Payment timed out after the decrement; inventory was compensated
    /// (terminal state).
    CancelledPaymentTimeout,
}

impl ReservationState {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReservationState::Confirmed
                | ReservationState::RejectedNoLock
                | ReservationState::RejectedUnavailable
                | ReservationState::RejectedInventoryRace
                | ReservationState::CancelledPaymentFailed
                | ReservationState::CancelledPaymentTimeout
        )
    }

    /// Returns true for terminal states reached before any mutation.
    pub fn is_rejected(&self) -> bool {
        matches!(
            self,
            ReservationState::RejectedNoLock
                | ReservationState::RejectedUnavailable
                | ReservationState::RejectedInventoryRace
        )
    }

    /// Returns true for terminal states reached after the decrement.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            ReservationState::CancelledPaymentFailed | ReservationState::CancelledPaymentTimeout
        )
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationState::Initiated => "Initiated",
            ReservationState::Locked => "Locked",
            ReservationState::AvailabilityConfirmed => "AvailabilityConfirmed",
            ReservationState::InventoryDecremented => "InventoryDecremented",
            ReservationState::PaymentCaptured => "PaymentCaptured",
            ReservationState::Confirmed => "Confirmed",
            ReservationState::RejectedNoLock => "RejectedNoLock",
            ReservationState::RejectedUnavailable => "RejectedUnavailable",
            ReservationState::RejectedInventoryRace => "RejectedInventoryRace",
            ReservationState::CancelledPaymentFailed => "CancelledPaymentFailed",
            ReservationState::CancelledPaymentTimeout => "CancelledPaymentTimeout",
        }
    }
}

impl std::fmt::Display for ReservationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
