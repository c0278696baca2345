//! Reservation attempt record.

use common::{Money, RequesterId, ReservationId, ResourceId};
use serde::{Deserialize, Serialize};

use crate::events::ReservationEvent;
use crate::state::ReservationState;

/// The record of one reservation attempt, driven by applied events.
///
/// State transitions happen exclusively through [`apply`](Self::apply);
/// once a terminal state is reached, further events are ignored. The full
/// event timeline is retained for auditing and reconciliation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReservationAttempt {
    id: Option<ReservationId>,
    resource_id: Option<ResourceId>,
    requester_id: Option<RequesterId>,
    requested_units: u32,
    state: ReservationState,
    /// Amount owed once availability (and unit price) is known.
    amount_due: Option<Money>,
    /// Payment reference from the payment processor.
    payment_ref: Option<String>,
    /// True if the availability read that admitted this attempt was stale.
    stale_availability_read: bool,
    /// Reason the attempt did not confirm, if any.
    failure_reason: Option<String>,
    /// True if inventory compensation failed and needs reconciliation.
    compensation_failed: bool,
    timeline: Vec<ReservationEvent>,
}

impl ReservationAttempt {
    /// Applies an event, advancing state and recording it in the timeline.
    pub fn apply(&mut self, event: ReservationEvent) {
        if self.state.is_terminal() {
            return;
        }
        match &event {
            ReservationEvent::Initiated(data) => {
                self.id = Some(data.reservation_id);
                self.resource_id = Some(data.resource_id);
                self.requester_id = Some(data.requester_id);
                self.requested_units = data.requested_units;
                self.state = ReservationState::Initiated;
            }
            ReservationEvent::LockAcquired(_) => {
                self.state = ReservationState::Locked;
            }
            ReservationEvent::AvailabilityConfirmed(data) => {
                self.state = ReservationState::AvailabilityConfirmed;
                self.amount_due = Some(data.unit_price.multiply(self.requested_units));
                self.stale_availability_read = data.stale;
            }
            ReservationEvent::InventoryDecremented(_) => {
                self.state = ReservationState::InventoryDecremented;
            }
            ReservationEvent::PaymentCaptured(data) => {
                self.state = ReservationState::PaymentCaptured;
                self.payment_ref = Some(data.payment_ref.clone());
            }
            ReservationEvent::Confirmed(_) => {
                self.state = ReservationState::Confirmed;
            }
            ReservationEvent::StepFailed(data) => {
                self.failure_reason = Some(data.error.clone());
            }
            ReservationEvent::CompensationStarted(_)
            | ReservationEvent::CompensationCompleted(_) => {}
            ReservationEvent::CompensationFailed(_) => {
                self.compensation_failed = true;
            }
            ReservationEvent::Aborted(data) => {
                self.state = data.state;
                self.failure_reason = Some(data.reason.clone());
            }
        }
        self.timeline.push(event);
    }
}

// Query methods
impl ReservationAttempt {
    /// Returns the reservation ID.
    pub fn id(&self) -> Option<ReservationId> {
        self.id
    }

    /// Returns the resource being reserved.
    pub fn resource_id(&self) -> Option<ResourceId> {
        self.resource_id
    }

    /// Returns who requested the reservation.
    pub fn requester_id(&self) -> Option<RequesterId> {
        self.requester_id
    }

    /// Returns the number of units requested.
    pub fn requested_units(&self) -> u32 {
        self.requested_units
    }

    /// Returns the saga state.
    pub fn state(&self) -> ReservationState {
        self.state
    }

    /// Returns the amount owed, once known.
    pub fn amount_due(&self) -> Option<Money> {
        self.amount_due
    }

    /// Returns the payment reference, if payment was captured.
    pub fn payment_ref(&self) -> Option<&str> {
        self.payment_ref.as_deref()
    }

    /// Returns true if the admitting availability read was stale.
    pub fn stale_availability_read(&self) -> bool {
        self.stale_availability_read
    }

    /// Returns the failure reason, if any.
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Returns true if compensation failed and reconciliation is needed.
    pub fn compensation_failed(&self) -> bool {
        self.compensation_failed
    }

    /// Returns the applied event timeline.
    pub fn timeline(&self) -> &[ReservationEvent] {
        &self.timeline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reservation;

    fn initiated_attempt() -> ReservationAttempt {
        let mut attempt = ReservationAttempt::default();
        attempt.apply(ReservationEvent::initiated(
            ReservationId::new(),
            ResourceId::new(),
            2,
            RequesterId::new(),
        ));
        attempt
    }

    #[test]
    fn test_default_attempt() {
        let attempt = ReservationAttempt::default();
        assert!(attempt.id().is_none());
        assert_eq!(attempt.state(), ReservationState::Initiated);
        assert!(attempt.timeline().is_empty());
    }

    #[test]
    fn test_apply_happy_path() {
        let mut attempt = initiated_attempt();
        assert_eq!(attempt.state(), ReservationState::Initiated);
        assert_eq!(attempt.requested_units(), 2);

        attempt.apply(ReservationEvent::lock_acquired(30_000));
        assert_eq!(attempt.state(), ReservationState::Locked);

        attempt.apply(ReservationEvent::availability_confirmed(
            5,
            Money::from_cents(1000),
            false,
        ));
        assert_eq!(attempt.state(), ReservationState::AvailabilityConfirmed);
        assert_eq!(attempt.amount_due(), Some(Money::from_cents(2000)));
        assert!(!attempt.stale_availability_read());

        attempt.apply(ReservationEvent::inventory_decremented(
            reservation::STEP_DECREMENT_INVENTORY,
        ));
        assert_eq!(attempt.state(), ReservationState::InventoryDecremented);

        attempt.apply(ReservationEvent::payment_captured("PAY-1"));
        assert_eq!(attempt.state(), ReservationState::PaymentCaptured);
        assert_eq!(attempt.payment_ref(), Some("PAY-1"));

        attempt.apply(ReservationEvent::confirmed());
        assert_eq!(attempt.state(), ReservationState::Confirmed);
        assert!(attempt.state().is_terminal());
        assert_eq!(attempt.timeline().len(), 6);
    }

    #[test]
    fn test_stale_read_is_recorded() {
        let mut attempt = initiated_attempt();
        attempt.apply(ReservationEvent::lock_acquired(30_000));
        attempt.apply(ReservationEvent::availability_confirmed(
            5,
            Money::from_cents(1000),
            true,
        ));
        assert!(attempt.stale_availability_read());
    }

    #[test]
    fn test_apply_failure_and_compensation() {
        let mut attempt = initiated_attempt();
        attempt.apply(ReservationEvent::lock_acquired(30_000));
        attempt.apply(ReservationEvent::availability_confirmed(
            5,
            Money::from_cents(1000),
            false,
        ));
        attempt.apply(ReservationEvent::inventory_decremented(
            reservation::STEP_DECREMENT_INVENTORY,
        ));

        attempt.apply(ReservationEvent::step_failed(
            reservation::STEP_CAPTURE_PAYMENT,
            "card declined",
        ));
        assert_eq!(attempt.failure_reason(), Some("card declined"));

        attempt.apply(ReservationEvent::compensation_started(
            reservation::STEP_CAPTURE_PAYMENT,
        ));
        attempt.apply(ReservationEvent::compensation_completed(
            reservation::STEP_DECREMENT_INVENTORY,
        ));
        assert!(!attempt.compensation_failed());

        attempt.apply(ReservationEvent::aborted(
            ReservationState::CancelledPaymentFailed,
            "payment declined: card declined",
        ));
        assert_eq!(attempt.state(), ReservationState::CancelledPaymentFailed);
        assert!(attempt.state().is_terminal());
    }

    #[test]
    fn test_compensation_failure_flags_reconciliation() {
        let mut attempt = initiated_attempt();
        attempt.apply(ReservationEvent::compensation_failed(
            reservation::STEP_DECREMENT_INVENTORY,
            "store down",
        ));
        assert!(attempt.compensation_failed());
    }

    #[test]
    fn test_terminal_state_is_immutable() {
        let mut attempt = initiated_attempt();
        attempt.apply(ReservationEvent::aborted(
            ReservationState::RejectedNoLock,
            "lock contended",
        ));
        let timeline_len = attempt.timeline().len();

        attempt.apply(ReservationEvent::confirmed());
        attempt.apply(ReservationEvent::lock_acquired(30_000));

        assert_eq!(attempt.state(), ReservationState::RejectedNoLock);
        assert_eq!(attempt.timeline().len(), timeline_len);
    }

    #[test]
    fn test_serialization_roundtrip() {
        let mut attempt = initiated_attempt();
        attempt.apply(ReservationEvent::lock_acquired(30_000));
        attempt.apply(ReservationEvent::availability_confirmed(
            5,
            Money::from_cents(1000),
            false,
        ));

        let json = serde_json::to_string(&attempt).unwrap();
        let deserialized: ReservationAttempt = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.id(), attempt.id());
        assert_eq!(deserialized.state(), ReservationState::AvailabilityConfirmed);
        assert_eq!(deserialized.amount_due(), Some(Money::from_cents(2000)));
        assert_eq!(deserialized.timeline().len(), 3);
    }
}
