//! Reservation saga for a finite, shared resource.
//!
//! This crate orchestrates a multi-step reservation transaction across
//! independently-failing collaborators, with compensation on partial
//! failure:
//! 1. Acquire the per-resource distributed lock
//! 2. Confirm availability (breaker + retry + stale-read cache)
//! 3. Atomically decrement inventory
//! 4. Capture payment (bulkhead + breaker, hard deadline)
//! 5. Confirm and notify (best effort)
//!
//! If payment fails after the decrement, the decrement is compensated
//! before the attempt terminates. The lock is released on every exit
//! path.

pub mod attempt;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod gates;
pub mod reservation;
pub mod services;
pub mod state;

pub use attempt::ReservationAttempt;
pub use config::ReservationConfig;
pub use coordinator::{ReservationCoordinator, ReservationRequest};
pub use error::ReservationError;
pub use events::ReservationEvent;
pub use gates::{AvailabilityGate, PaymentGate};
pub use services::{
    Availability, AvailabilityError, AvailabilityStore, InMemoryAvailabilityStore,
    InMemoryNotifier, InMemoryPaymentProcessor, Notifier, NotifyError, PaymentCapture,
    PaymentError, PaymentProcessor,
};
pub use state::ReservationState;
