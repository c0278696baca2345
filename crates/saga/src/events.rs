//! Reservation saga events.
//!
//! Each step of a reservation applies an event to the attempt record,
//! leaving a serializable timeline of what happened and when.

use chrono::{DateTime, Utc};
use common::{Money, RequesterId, ReservationId, ResourceId};
use serde::{Deserialize, Serialize};

use crate::state::ReservationState;

/// Events that can occur during a reservation attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ReservationEvent {
    /// A reservation request was accepted for processing.
    Initiated(InitiatedData),

    /// The per-resource lock was acquired.
    LockAcquired(LockAcquiredData),

    /// Availability covered the requested units.
    AvailabilityConfirmed(AvailabilityConfirmedData),

    /// Units were atomically taken from the resource.
    InventoryDecremented(StepData),

    /// Payment was captured.
    PaymentCaptured(PaymentCapturedData),

    /// The reservation completed.
    Confirmed(ConfirmedData),

    /// A saga step failed.
    StepFailed(StepFailedData),

    /// Compensation started after a step failure.
    CompensationStarted(CompensationData),

    /// A compensation step completed successfully.
    CompensationCompleted(StepData),

    /// A compensation step failed (recorded for reconciliation).
    CompensationFailed(StepFailedData),

    /// The attempt ended in a failure state.
    Aborted(AbortedData),
}

impl ReservationEvent {
    /// Returns the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            ReservationEvent::Initiated(_) => "Initiated",
            ReservationEvent::LockAcquired(_) => "LockAcquired",
            ReservationEvent::AvailabilityConfirmed(_) => "AvailabilityConfirmed",
            ReservationEvent::InventoryDecremented(_) => "InventoryDecremented",
            ReservationEvent::PaymentCaptured(_) => "PaymentCaptured",
            ReservationEvent::Confirmed(_) => "Confirmed",
            ReservationEvent::StepFailed(_) => "StepFailed",
            ReservationEvent::CompensationStarted(_) => "CompensationStarted",
            ReservationEvent::CompensationCompleted(_) => "CompensationCompleted",
            ReservationEvent::CompensationFailed(_) => "CompensationFailed",
            ReservationEvent::Aborted(_) => "Aborted",
        }
    }
}

/// Data for the Initiated event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiatedData {
    /// The reservation attempt ID.
    pub reservation_id: ReservationId,
    /// The resource being reserved.
    pub resource_id: ResourceId,
    /// Units requested.
    pub requested_units: u32,
    /// Who is reserving.
    pub requester_id: RequesterId,
    /// When the request was accepted.
    pub initiated_at: DateTime<Utc>,
}

/// Data for the LockAcquired event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockAcquiredData {
    /// Lease duration granted, in milliseconds.
    pub lease_ms: u64,
}

/// Data for the AvailabilityConfirmed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityConfirmedData {
    /// Units reported available at read time.
    pub available_units: u32,
    /// Price per unit at read time.
    pub unit_price: Money,
    /// True if the read was served from the stale cache.
    pub stale: bool,
}

/// Data for step events (just the step name).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepData {
    /// The step name.
    pub step_name: String,
}

/// Data for the PaymentCaptured event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCapturedData {
    /// Reference assigned by the payment processor.
    pub payment_ref: String,
}

/// Data for the Confirmed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmedData {
    /// When the reservation completed.
    pub confirmed_at: DateTime<Utc>,
}

/// Data for StepFailed and CompensationFailed events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepFailedData {
    /// The step that failed.
    pub step_name: String,
    /// Error message describing the failure.
    pub error: String,
}

/// Data for the CompensationStarted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompensationData {
    /// The step whose failure triggered compensation.
    pub from_step: String,
}

/// Data for the Aborted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbortedData {
    /// The terminal failure state.
    pub state: ReservationState,
    /// Why the attempt did not confirm.
    pub reason: String,
    /// When the attempt ended.
    pub aborted_at: DateTime<Utc>,
}

// Convenience constructors
impl ReservationEvent {
    /// Creates an Initiated event.
    pub fn initiated(
        reservation_id: ReservationId,
        resource_id: ResourceId,
        requested_units: u32,
        requester_id: RequesterId,
    ) -> Self {
        ReservationEvent::Initiated(InitiatedData {
            reservation_id,
            resource_id,
            requested_units,
            requester_id,
            initiated_at: Utc::now(),
        })
    }

    /// Creates a LockAcquired event.
    pub fn lock_acquired(lease_ms: u64) -> Self {
        ReservationEvent::LockAcquired(LockAcquiredData { lease_ms })
    }

    /// Creates an AvailabilityConfirmed event.
    pub fn availability_confirmed(available_units: u32, unit_price: Money, stale: bool) -> Self {
        ReservationEvent::AvailabilityConfirmed(AvailabilityConfirmedData {
            available_units,
            unit_price,
            stale,
        })
    }

    /// Creates an InventoryDecremented event.
    pub fn inventory_decremented(step_name: impl Into<String>) -> Self {
        ReservationEvent::InventoryDecremented(StepData {
            step_name: step_name.into(),
        })
    }

    /// Creates a PaymentCaptured event.
    pub fn payment_captured(payment_ref: impl Into<String>) -> Self {
        ReservationEvent::PaymentCaptured(PaymentCapturedData {
            payment_ref: payment_ref.into(),
        })
    }

    /// Creates a Confirmed event.
    pub fn confirmed() -> Self {
        ReservationEvent::Confirmed(ConfirmedData {
            confirmed_at: Utc::now(),
        })
    }

    /// Creates a StepFailed event.
    pub fn step_failed(step_name: impl Into<String>, error: impl Into<String>) -> Self {
        ReservationEvent::StepFailed(StepFailedData {
            step_name: step_name.into(),
            error: error.into(),
        })
    }

    /// Creates a CompensationStarted event.
    pub fn compensation_started(from_step: impl Into<String>) -> Self {
        ReservationEvent::CompensationStarted(CompensationData {
            from_step: from_step.into(),
        })
    }

    /// Creates a CompensationCompleted event.
    pub fn compensation_completed(step_name: impl Into<String>) -> Self {
        ReservationEvent::CompensationCompleted(StepData {
            step_name: step_name.into(),
        })
    }

    /// Creates a CompensationFailed event.
    pub fn compensation_failed(step_name: impl Into<String>, error: impl Into<String>) -> Self {
        ReservationEvent::CompensationFailed(StepFailedData {
            step_name: step_name.into(),
            error: error.into(),
        })
    }

    /// Creates an Aborted event.
    pub fn aborted(state: ReservationState, reason: impl Into<String>) -> Self {
        ReservationEvent::Aborted(AbortedData {
            state,
            reason: reason.into(),
            aborted_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reservation;

    #[test]
    fn test_event_type() {
        assert_eq!(
            ReservationEvent::initiated(
                ReservationId::new(),
                ResourceId::new(),
                2,
                RequesterId::new()
            )
            .event_type(),
            "Initiated"
        );
        assert_eq!(
            ReservationEvent::lock_acquired(30_000).event_type(),
            "LockAcquired"
        );
        assert_eq!(
            ReservationEvent::availability_confirmed(5, Money::from_cents(1000), false)
                .event_type(),
            "AvailabilityConfirmed"
        );
        assert_eq!(
            ReservationEvent::inventory_decremented(reservation::STEP_DECREMENT_INVENTORY)
                .event_type(),
            "InventoryDecremented"
        );
        assert_eq!(
            ReservationEvent::payment_captured("PAY-1").event_type(),
            "PaymentCaptured"
        );
        assert_eq!(ReservationEvent::confirmed().event_type(), "Confirmed");
        assert_eq!(
            ReservationEvent::step_failed(reservation::STEP_CAPTURE_PAYMENT, "declined")
                .event_type(),
            "StepFailed"
        );
        assert_eq!(
            ReservationEvent::compensation_started(reservation::STEP_CAPTURE_PAYMENT).event_type(),
            "CompensationStarted"
        );
        assert_eq!(
            ReservationEvent::compensation_completed(reservation::STEP_DECREMENT_INVENTORY)
                .event_type(),
            "CompensationCompleted"
        );
        assert_eq!(
            ReservationEvent::compensation_failed(reservation::STEP_DECREMENT_INVENTORY, "down")
                .event_type(),
            "CompensationFailed"
        );
        assert_eq!(
            ReservationEvent::aborted(ReservationState::RejectedNoLock, "contended").event_type(),
            "Aborted"
        );
    }

    #[test]
    fn test_serialization_roundtrip() {
        let events = vec![
            ReservationEvent::initiated(
                ReservationId::new(),
                ResourceId::new(),
                1,
                RequesterId::new(),
            ),
            ReservationEvent::lock_acquired(30_000),
            ReservationEvent::availability_confirmed(3, Money::from_cents(2500), true),
            ReservationEvent::inventory_decremented(reservation::STEP_DECREMENT_INVENTORY),
            ReservationEvent::payment_captured("PAY-7"),
            ReservationEvent::confirmed(),
            ReservationEvent::step_failed(reservation::STEP_CAPTURE_PAYMENT, "timed out"),
            ReservationEvent::compensation_started(reservation::STEP_CAPTURE_PAYMENT),
            ReservationEvent::compensation_completed(reservation::STEP_DECREMENT_INVENTORY),
            ReservationEvent::compensation_failed(reservation::STEP_DECREMENT_INVENTORY, "down"),
            ReservationEvent::aborted(ReservationState::CancelledPaymentTimeout, "timed out"),
        ];

        for event in events {
            let json = serde_json::to_string(&event).unwrap();
            let deserialized: ReservationEvent = serde_json::from_str(&json).unwrap();
            assert_eq!(event.event_type(), deserialized.event_type());
        }
    }

    #[test]
    fn test_aborted_data() {
        let event = ReservationEvent::aborted(ReservationState::RejectedUnavailable, "sold out");

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: ReservationEvent = serde_json::from_str(&json).unwrap();

        if let ReservationEvent::Aborted(data) = deserialized {
            assert_eq!(data.state, ReservationState::RejectedUnavailable);
            assert_eq!(data.reason, "sold out");
        } else {
            panic!("Expected Aborted event");
        }
    }
}
