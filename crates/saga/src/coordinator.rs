//! Reservation coordinator orchestrating the lock-guarded saga.

use std::sync::Arc;

use common::{RequesterId, ReservationId, ResourceId};
use lock::{LockManager, LockStore};
use resilience::{
    Backoff, Clock, Jitter, ResilienceError, ResilienceRegistry, RetryPolicy, StaleReadCache,
};

use crate::attempt::ReservationAttempt;
use crate::config::ReservationConfig;
use crate::error::ReservationError;
use crate::events::ReservationEvent;
use crate::gates::{AvailabilityGate, PaymentGate};
use crate::reservation;
use crate::services::{AvailabilityError, AvailabilityStore, Notifier, PaymentError, PaymentProcessor};
use crate::state::ReservationState;

/// A request to reserve units of a resource.
#[derive(Debug, Clone, Copy)]
pub struct ReservationRequest {
    /// The resource to reserve from.
    pub resource_id: ResourceId,
    /// How many units to reserve.
    pub requested_units: u32,
    /// Who is reserving.
    pub requester_id: RequesterId,
}

/// Orchestrates the reservation saga.
///
/// The saga serializes per resource on the distributed lock, reads
/// availability through the breaker/retry/cache stack, performs the
/// atomic decrement, charges payment through bulkhead + breaker under a
/// deadline, and compensates the decrement when payment fails. The lock
/// is released on every exit path.
///
/// Business outcomes (rejections, cancellations) are terminal states on
/// the returned [`ReservationAttempt`], not errors.
pub struct ReservationCoordinator<A, P, N, L> {
    availability: AvailabilityGate<A>,
    payment: PaymentGate<P>,
    notifier: N,
    lock: LockManager<L>,
    registry: ResilienceRegistry,
    config: ReservationConfig,
}

impl<A, P, N, L> ReservationCoordinator<A, P, N, L>
where
    A: AvailabilityStore,
    P: PaymentProcessor,
    N: Notifier,
    L: LockStore,
{
    /// Creates a coordinator wiring the collaborators through shared
    /// per-dependency gates.
    pub fn new(
        availability_store: A,
        payment_processor: P,
        notifier: N,
        lock_store: L,
        clock: Arc<dyn Clock>,
        config: ReservationConfig,
    ) -> Self {
        let registry = ResilienceRegistry::new(Arc::clone(&clock));

        let availability_breaker =
            registry.breaker(reservation::DEP_AVAILABILITY, config.availability_breaker);
        let availability_retry = RetryPolicy::builder()
            .max_attempts(config.availability_retry_attempts)
            .backoff(Backoff::exponential(config.availability_retry_base))
            .jitter(Jitter::Full)
            .clock(Arc::clone(&clock))
            .should_retry(AvailabilityError::is_transient)
            .build();
        let cache = StaleReadCache::new(config.cache_ttl, Arc::clone(&clock));
        let availability = AvailabilityGate::new(
            availability_store,
            availability_breaker,
            availability_retry,
            cache,
        );

        let payment = PaymentGate::new(
            payment_processor,
            registry.bulkhead(reservation::DEP_PAYMENT, config.payment_bulkhead),
            registry.breaker(reservation::DEP_PAYMENT, config.payment_breaker),
            config.payment_deadline,
        );

        let lock = LockManager::with_config(lock_store, clock, config.lock);

        Self {
            availability,
            payment,
            notifier,
            lock,
            registry,
            config,
        }
    }

    /// Returns the availability gate.
    pub fn availability(&self) -> &AvailabilityGate<A> {
        &self.availability
    }

    /// Returns the payment gate.
    pub fn payment(&self) -> &PaymentGate<P> {
        &self.payment
    }

    /// Returns the lock manager.
    pub fn lock(&self) -> &LockManager<L> {
        &self.lock
    }

    /// Returns the registry owning the shared breakers and bulkheads.
    pub fn registry(&self) -> &ResilienceRegistry {
        &self.registry
    }

    /// Runs a reservation attempt to a terminal state.
    #[tracing::instrument(
        skip(self, request),
        fields(resource_id = %request.resource_id, units = request.requested_units)
    )]
    pub async fn reserve(
        &self,
        request: ReservationRequest,
    ) -> Result<ReservationAttempt, ReservationError> {
        metrics::counter!("reservation_attempts_total").increment(1);
        let started = std::time::Instant::now();

        if request.requested_units == 0 {
            return Err(ReservationError::InvalidRequest(
                "requested units must be greater than zero".to_string(),
            ));
        }

        let reservation_id = ReservationId::new();
        let mut attempt = ReservationAttempt::default();
        attempt.apply(ReservationEvent::initiated(
            reservation_id,
            request.resource_id,
            request.requested_units,
            request.requester_id,
        ));

        // Step 1: serialize on the per-resource lock.
        let lease = match self
            .lock
            .acquire(request.resource_id, self.config.lease_duration)
            .await
        {
            Ok(lease) => {
                attempt.apply(ReservationEvent::lock_acquired(
                    self.config.lease_duration.as_millis() as u64,
                ));
                lease
            }
            Err(error) => {
                attempt.apply(ReservationEvent::step_failed(
                    reservation::STEP_ACQUIRE_LOCK,
                    error.to_string(),
                ));
                attempt.apply(ReservationEvent::aborted(
                    ReservationState::RejectedNoLock,
                    error.to_string(),
                ));
                self.finish(&attempt, started);
                return Ok(attempt);
            }
        };

        // Steps 2-5 run under the lease; the release below covers every
        // exit path, including error propagation.
        let outcome = self
            .run_locked(&mut attempt, &request, reservation_id)
            .await;
        if let Err(error) = self.lock.release(&lease).await {
            tracing::warn!(%error, "lock release failed");
        }
        outcome?;

        self.finish(&attempt, started);
        Ok(attempt)
    }

    async fn run_locked(
        &self,
        attempt: &mut ReservationAttempt,
        request: &ReservationRequest,
        reservation_id: ReservationId,
    ) -> Result<(), ReservationError> {
        // Step 2: availability through breaker + retry + stale cache,
        // bounded by the step deadline.
        let read = tokio::time::timeout(
            self.config.step_deadline,
            self.availability.read(request.resource_id),
        )
        .await;
        let availability = match read {
            Ok(Ok(read)) => read,
            Ok(Err(error)) => {
                if let ResilienceError::Inner(AvailabilityError::ResourceNotFound(id)) = &error {
                    return Err(ReservationError::ResourceNotFound(*id));
                }
                attempt.apply(ReservationEvent::step_failed(
                    reservation::STEP_CONFIRM_AVAILABILITY,
                    error.to_string(),
                ));
                attempt.apply(ReservationEvent::aborted(
                    ReservationState::RejectedUnavailable,
                    error.to_string(),
                ));
                return Ok(());
            }
            Err(_elapsed) => {
                let error: ResilienceError<AvailabilityError> = ResilienceError::DeadlineExceeded {
                    deadline: self.config.step_deadline,
                };
                attempt.apply(ReservationEvent::step_failed(
                    reservation::STEP_CONFIRM_AVAILABILITY,
                    error.to_string(),
                ));
                attempt.apply(ReservationEvent::aborted(
                    ReservationState::RejectedUnavailable,
                    error.to_string(),
                ));
                return Ok(());
            }
        };

        if availability.value.available_units < request.requested_units {
            let reason = format!(
                "requested {} unit(s), {} available{}",
                request.requested_units,
                availability.value.available_units,
                if availability.fresh { "" } else { " (stale read)" }
            );
            attempt.apply(ReservationEvent::aborted(
                ReservationState::RejectedUnavailable,
                reason,
            ));
            return Ok(());
        }
        attempt.apply(ReservationEvent::availability_confirmed(
            availability.value.available_units,
            availability.value.unit_price,
            !availability.fresh,
        ));

        // Step 3: atomic conditional decrement. The condition re-checks
        // the unit count at write time; an optimistic (possibly stale)
        // read does not get to oversell.
        match self
            .availability
            .store()
            .try_decrement(request.resource_id, request.requested_units)
            .await
        {
            Ok(()) => {
                attempt.apply(ReservationEvent::inventory_decremented(
                    reservation::STEP_DECREMENT_INVENTORY,
                ));
            }
            Err(AvailabilityError::InsufficientUnits { available, .. }) => {
                let reason = format!(
                    "lost inventory race: {} unit(s) left at decrement time",
                    available
                );
                attempt.apply(ReservationEvent::step_failed(
                    reservation::STEP_DECREMENT_INVENTORY,
                    reason.clone(),
                ));
                attempt.apply(ReservationEvent::aborted(
                    ReservationState::RejectedInventoryRace,
                    reason,
                ));
                return Ok(());
            }
            Err(error) => {
                attempt.apply(ReservationEvent::step_failed(
                    reservation::STEP_DECREMENT_INVENTORY,
                    error.to_string(),
                ));
                attempt.apply(ReservationEvent::aborted(
                    ReservationState::RejectedUnavailable,
                    error.to_string(),
                ));
                return Ok(());
            }
        }

        // Step 4: payment through bulkhead + breaker under the deadline.
        let amount = availability
            .value
            .unit_price
            .multiply(request.requested_units);
        match self.payment.charge(reservation_id, amount).await {
            Ok(capture) => {
                attempt.apply(ReservationEvent::payment_captured(capture.payment_ref));
            }
            Err(error) => {
                attempt.apply(ReservationEvent::step_failed(
                    reservation::STEP_CAPTURE_PAYMENT,
                    error.to_string(),
                ));
                self.compensate_inventory(attempt, request, reservation_id)
                    .await;
                let state = match &error {
                    ResilienceError::Inner(PaymentError::Timeout) => {
                        ReservationState::CancelledPaymentTimeout
                    }
                    error if error.is_timeout() => ReservationState::CancelledPaymentTimeout,
                    _ => ReservationState::CancelledPaymentFailed,
                };
                attempt.apply(ReservationEvent::aborted(state, error.to_string()));
                return Ok(());
            }
        }

        // Step 5: confirm and notify. Notification failure never reverses
        // the reservation.
        attempt.apply(ReservationEvent::confirmed());
        let message = format!(
            "Reservation {} confirmed: {} unit(s) of resource {}",
            reservation_id, request.requested_units, request.resource_id
        );
        if let Err(error) = self.notifier.notify(request.requester_id, &message).await {
            tracing::warn!(%error, "confirmation notification failed");
        }

        Ok(())
    }

    /// Returns decremented units to inventory after a payment failure.
    ///
    /// Compensation is attempted once. If it fails, the attempt records
    /// everything reconciliation needs and the saga still terminates —
    /// looping here would hold the lock and invite fresh contention.
    async fn compensate_inventory(
        &self,
        attempt: &mut ReservationAttempt,
        request: &ReservationRequest,
        reservation_id: ReservationId,
    ) {
        attempt.apply(ReservationEvent::compensation_started(
            reservation::STEP_CAPTURE_PAYMENT,
        ));
        match self
            .availability
            .store()
            .increment(request.resource_id, request.requested_units, reservation_id)
            .await
        {
            Ok(()) => {
                attempt.apply(ReservationEvent::compensation_completed(
                    reservation::STEP_DECREMENT_INVENTORY,
                ));
                tracing::info!("inventory restored after payment failure");
            }
            Err(error) => {
                attempt.apply(ReservationEvent::compensation_failed(
                    reservation::STEP_DECREMENT_INVENTORY,
                    error.to_string(),
                ));
                metrics::counter!("reservation_compensation_failures_total").increment(1);
                tracing::error!(
                    resource_id = %request.resource_id,
                    units = request.requested_units,
                    %reservation_id,
                    payment_ref = attempt.payment_ref().unwrap_or("none"),
                    %error,
                    "inventory compensation failed, manual reconciliation required"
                );
            }
        }
    }

    fn finish(&self, attempt: &ReservationAttempt, started: std::time::Instant) {
        let state = attempt.state();
        metrics::histogram!("reservation_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        metrics::counter!("reservation_outcomes_total", "state" => state.as_str()).increment(1);
        if state == ReservationState::Confirmed {
            tracing::info!(state = %state, "reservation confirmed");
        } else {
            tracing::info!(
                state = %state,
                reason = attempt.failure_reason().unwrap_or(""),
                "reservation not confirmed"
            );
        }
    }
}
