//! Per-dependency gates composing the admission-control stack.
//!
//! The availability store is read through circuit breaker + retry +
//! stale-read cache; the payment processor is charged through bulkhead +
//! circuit breaker under a hard deadline. Breaker and bulkhead instances
//! are the process-wide singletons handed out by the
//! [`ResilienceRegistry`](resilience::ResilienceRegistry).

use std::sync::Arc;
use std::time::Duration;

use common::{Money, ReservationId, ResourceId};
use resilience::{Bulkhead, CachedValue, CircuitBreaker, ResilienceError, RetryPolicy, StaleReadCache};

use crate::services::{
    Availability, AvailabilityError, AvailabilityStore, PaymentCapture, PaymentError,
    PaymentProcessor,
};

/// Read path to the availability store.
///
/// A successful live read refreshes the cache; when the live path fails
/// (breaker open, retries exhausted), the last known-good value is served
/// marked stale for up to the cache TTL.
pub struct AvailabilityGate<A> {
    store: A,
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy<AvailabilityError>,
    cache: StaleReadCache<ResourceId, Availability>,
}

impl<A: AvailabilityStore> AvailabilityGate<A> {
    /// Creates the gate around a store.
    pub fn new(
        store: A,
        breaker: Arc<CircuitBreaker>,
        retry: RetryPolicy<AvailabilityError>,
        cache: StaleReadCache<ResourceId, Availability>,
    ) -> Self {
        Self {
            store,
            breaker,
            retry,
            cache,
        }
    }

    /// Returns the underlying store, for the mutation operations that
    /// bypass the read stack.
    pub fn store(&self) -> &A {
        &self.store
    }

    /// Returns the breaker guarding the store.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Returns the stale-read cache.
    pub fn cache(&self) -> &StaleReadCache<ResourceId, Availability> {
        &self.cache
    }

    /// Reads availability through breaker + retry, falling back to the
    /// stale cache when the live path fails.
    ///
    /// Definitive store answers (an unknown resource) are not dependency
    /// failures and do not fall back to the cache.
    pub async fn read(
        &self,
        resource_id: ResourceId,
    ) -> Result<CachedValue<Availability>, ResilienceError<AvailabilityError>> {
        let store = &self.store;
        let retry = &self.retry;
        let live = self
            .breaker
            .call(move || retry.execute(move || store.get_availability(resource_id)))
            .await
            .map_err(|error| error.flatten());

        match live {
            Ok(value) => {
                self.cache.store(resource_id, value);
                Ok(CachedValue::fresh(value))
            }
            Err(ResilienceError::Inner(error)) if !error.is_transient() => {
                Err(ResilienceError::Inner(error))
            }
            Err(error) => match self.cache.get_stale(&resource_id) {
                Some(value) => {
                    tracing::warn!(%error, "live availability read failed, serving stale cache entry");
                    metrics::counter!("stale_cache_hits_total").increment(1);
                    Ok(CachedValue::stale(value))
                }
                None => {
                    tracing::warn!(%error, "live availability read failed with no usable cache entry");
                    Err(ResilienceError::NoCachedData)
                }
            },
        }
    }
}

/// Charge path to the payment processor.
///
/// Charges run under the payment bulkhead and breaker with a hard
/// per-call deadline; a charge that outlives the deadline is abandoned
/// and surfaces as a payment timeout. Charges are never retried — a
/// charge is not known to be idempotent.
pub struct PaymentGate<P> {
    processor: P,
    bulkhead: Arc<Bulkhead>,
    breaker: Arc<CircuitBreaker>,
    deadline: Duration,
}

impl<P: PaymentProcessor> PaymentGate<P> {
    /// Creates the gate around a processor.
    pub fn new(
        processor: P,
        bulkhead: Arc<Bulkhead>,
        breaker: Arc<CircuitBreaker>,
        deadline: Duration,
    ) -> Self {
        Self {
            processor,
            bulkhead,
            breaker,
            deadline,
        }
    }

    /// Returns the underlying processor.
    pub fn processor(&self) -> &P {
        &self.processor
    }

    /// Returns the breaker guarding the processor.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Returns the bulkhead guarding the processor.
    pub fn bulkhead(&self) -> &Bulkhead {
        &self.bulkhead
    }

    /// Charges the amount through bulkhead + breaker under the deadline.
    pub async fn charge(
        &self,
        reservation_id: ReservationId,
        amount: Money,
    ) -> Result<PaymentCapture, ResilienceError<PaymentError>> {
        let processor = &self.processor;
        let breaker = &self.breaker;
        let deadline = self.deadline;
        self.bulkhead
            .admit(move || async move {
                breaker
                    .call(move || async move {
                        match tokio::time::timeout(deadline, processor.charge(reservation_id, amount))
                            .await
                        {
                            Ok(result) => result,
                            Err(_elapsed) => Err(PaymentError::Timeout),
                        }
                    })
                    .await
            })
            .await
            .map_err(|error| error.flatten())
    }
}
