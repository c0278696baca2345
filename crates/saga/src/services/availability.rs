//! Availability store trait and in-memory implementation.
//!
//! The store owns the reservable [`Resource`] records and is the only
//! place their unit counts change. Mutations go through the atomic
//! conditional decrement and the idempotent increment — never through a
//! read-then-write from callers.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{Money, ReservationId, ResourceId};
use thiserror::Error;

/// Point-in-time availability of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Availability {
    /// Units currently available for reservation.
    pub available_units: u32,
    /// Price per unit.
    pub unit_price: Money,
}

/// Errors reported by the availability store.
#[derive(Debug, Error)]
pub enum AvailabilityError {
    /// The store could not be reached.
    #[error("availability store unavailable: {0}")]
    Unavailable(String),

    /// The store did not answer in time.
    #[error("availability store timed out")]
    Timeout,

    /// No resource exists with the given ID.
    #[error("resource not found: {0}")]
    ResourceNotFound(ResourceId),

    /// Fewer units remain than the caller asked to take.
    #[error(
        "insufficient units for resource {resource_id}: requested {requested}, available {available}"
    )]
    InsufficientUnits {
        resource_id: ResourceId,
        requested: u32,
        available: u32,
    },
}

impl AvailabilityError {
    /// Returns true if retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AvailabilityError::Unavailable(_) | AvailabilityError::Timeout
        )
    }
}

/// Contract for the availability collaborator.
#[async_trait]
pub trait AvailabilityStore: Send + Sync {
    /// Returns current availability for a resource.
    async fn get_availability(
        &self,
        resource_id: ResourceId,
    ) -> Result<Availability, AvailabilityError>;

    /// Atomically takes `units` from the resource, only if at least that
    /// many are available at decrement time.
    async fn try_decrement(
        &self,
        resource_id: ResourceId,
        units: u32,
    ) -> Result<(), AvailabilityError>;

    /// Returns `units` to the resource as compensation for the given
    /// reservation.
    ///
    /// The reservation ID is an idempotency token: applying the same
    /// compensation twice restores the units exactly once.
    async fn increment(
        &self,
        resource_id: ResourceId,
        units: u32,
        reservation_id: ReservationId,
    ) -> Result<(), AvailabilityError>;
}

#[derive(Debug, Clone, Copy)]
struct ResourceRecord {
    total_units: u32,
    available_units: u32,
    unit_price: Money,
    version: u64,
}

#[derive(Debug, Default)]
struct InMemoryAvailabilityState {
    resources: HashMap<ResourceId, ResourceRecord>,
    compensations: HashSet<(ResourceId, ReservationId)>,
    get_calls: u32,
    fail_on_get: bool,
    fail_on_increment: bool,
}

/// In-memory availability store with failure injection for tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAvailabilityStore {
    state: Arc<RwLock<InMemoryAvailabilityState>>,
}

impl InMemoryAvailabilityStore {
    /// Creates an empty in-memory availability store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resource with all units available.
    pub fn add_resource(&self, resource_id: ResourceId, total_units: u32, unit_price: Money) {
        let mut state = self.state.write().unwrap();
        state.resources.insert(
            resource_id,
            ResourceRecord {
                total_units,
                available_units: total_units,
                unit_price,
                version: 0,
            },
        );
    }

    /// Configures live reads to fail with `Unavailable`.
    pub fn set_fail_on_get(&self, fail: bool) {
        self.state.write().unwrap().fail_on_get = fail;
    }

    /// Configures compensation increments to fail with `Unavailable`.
    pub fn set_fail_on_increment(&self, fail: bool) {
        self.state.write().unwrap().fail_on_increment = fail;
    }

    /// Units currently available for the resource.
    pub fn available_units(&self, resource_id: ResourceId) -> Option<u32> {
        self.state
            .read()
            .unwrap()
            .resources
            .get(&resource_id)
            .map(|record| record.available_units)
    }

    /// The resource's mutation counter.
    pub fn version(&self, resource_id: ResourceId) -> Option<u64> {
        self.state
            .read()
            .unwrap()
            .resources
            .get(&resource_id)
            .map(|record| record.version)
    }

    /// Number of live reads attempted against the store.
    pub fn get_call_count(&self) -> u32 {
        self.state.read().unwrap().get_calls
    }
}

#[async_trait]
impl AvailabilityStore for InMemoryAvailabilityStore {
    async fn get_availability(
        &self,
        resource_id: ResourceId,
    ) -> Result<Availability, AvailabilityError> {
        let mut state = self.state.write().unwrap();
        state.get_calls += 1;

        if state.fail_on_get {
            return Err(AvailabilityError::Unavailable(
                "injected failure".to_string(),
            ));
        }

        let record = state
            .resources
            .get(&resource_id)
            .ok_or(AvailabilityError::ResourceNotFound(resource_id))?;

        Ok(Availability {
            available_units: record.available_units,
            unit_price: record.unit_price,
        })
    }

    async fn try_decrement(
        &self,
        resource_id: ResourceId,
        units: u32,
    ) -> Result<(), AvailabilityError> {
        let mut state = self.state.write().unwrap();
        let record = state
            .resources
            .get_mut(&resource_id)
            .ok_or(AvailabilityError::ResourceNotFound(resource_id))?;

        if record.available_units < units {
            return Err(AvailabilityError::InsufficientUnits {
                resource_id,
                requested: units,
                available: record.available_units,
            });
        }

        record.available_units -= units;
        record.version += 1;
        Ok(())
    }

    async fn increment(
        &self,
        resource_id: ResourceId,
        units: u32,
        reservation_id: ReservationId,
    ) -> Result<(), AvailabilityError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_increment {
            return Err(AvailabilityError::Unavailable(
                "injected failure".to_string(),
            ));
        }

        if !state.compensations.insert((resource_id, reservation_id)) {
            // Already applied for this reservation.
            return Ok(());
        }

        let record = state
            .resources
            .get_mut(&resource_id)
            .ok_or(AvailabilityError::ResourceNotFound(resource_id))?;

        record.available_units = (record.available_units + units).min(record.total_units);
        record.version += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_resource(total: u32) -> (InMemoryAvailabilityStore, ResourceId) {
        let store = InMemoryAvailabilityStore::new();
        let resource_id = ResourceId::new();
        store.add_resource(resource_id, total, Money::from_cents(2500));
        (store, resource_id)
    }

    #[tokio::test]
    async fn get_availability_returns_units_and_price() {
        let (store, resource_id) = store_with_resource(10);

        let availability = store.get_availability(resource_id).await.unwrap();
        assert_eq!(availability.available_units, 10);
        assert_eq!(availability.unit_price, Money::from_cents(2500));
        assert_eq!(store.get_call_count(), 1);
    }

    #[tokio::test]
    async fn unknown_resource_is_not_found() {
        let store = InMemoryAvailabilityStore::new();
        let result = store.get_availability(ResourceId::new()).await;
        assert!(matches!(
            result.unwrap_err(),
            AvailabilityError::ResourceNotFound(_)
        ));
    }

    #[tokio::test]
    async fn decrement_takes_units_and_bumps_version() {
        let (store, resource_id) = store_with_resource(10);

        store.try_decrement(resource_id, 3).await.unwrap();
        assert_eq!(store.available_units(resource_id), Some(7));
        assert_eq!(store.version(resource_id), Some(1));
    }

    #[tokio::test]
    async fn decrement_fails_when_insufficient() {
        let (store, resource_id) = store_with_resource(2);

        let result = store.try_decrement(resource_id, 3).await;
        match result.unwrap_err() {
            AvailabilityError::InsufficientUnits {
                requested,
                available,
                ..
            } => {
                assert_eq!(requested, 3);
                assert_eq!(available, 2);
            }
            other => panic!("expected InsufficientUnits, got {other:?}"),
        }
        // Nothing was taken.
        assert_eq!(store.available_units(resource_id), Some(2));
        assert_eq!(store.version(resource_id), Some(0));
    }

    #[tokio::test]
    async fn increment_restores_units() {
        let (store, resource_id) = store_with_resource(10);
        store.try_decrement(resource_id, 4).await.unwrap();

        store
            .increment(resource_id, 4, ReservationId::new())
            .await
            .unwrap();
        assert_eq!(store.available_units(resource_id), Some(10));
    }

    #[tokio::test]
    async fn increment_is_idempotent_per_reservation() {
        let (store, resource_id) = store_with_resource(10);
        store.try_decrement(resource_id, 4).await.unwrap();

        let reservation_id = ReservationId::new();
        store
            .increment(resource_id, 4, reservation_id)
            .await
            .unwrap();
        store
            .increment(resource_id, 4, reservation_id)
            .await
            .unwrap();

        assert_eq!(store.available_units(resource_id), Some(10));
    }

    #[tokio::test]
    async fn increment_never_exceeds_total() {
        let (store, resource_id) = store_with_resource(10);

        store
            .increment(resource_id, 5, ReservationId::new())
            .await
            .unwrap();
        assert_eq!(store.available_units(resource_id), Some(10));
    }

    #[tokio::test]
    async fn injected_get_failure() {
        let (store, resource_id) = store_with_resource(10);
        store.set_fail_on_get(true);

        let result = store.get_availability(resource_id).await;
        assert!(matches!(
            result.unwrap_err(),
            AvailabilityError::Unavailable(_)
        ));

        store.set_fail_on_get(false);
        assert!(store.get_availability(resource_id).await.is_ok());
    }

    #[tokio::test]
    async fn transient_classification() {
        assert!(AvailabilityError::Timeout.is_transient());
        assert!(AvailabilityError::Unavailable("down".into()).is_transient());
        assert!(!AvailabilityError::ResourceNotFound(ResourceId::new()).is_transient());
        assert!(
            !AvailabilityError::InsufficientUnits {
                resource_id: ResourceId::new(),
                requested: 2,
                available: 1,
            }
            .is_transient()
        );
    }
}
