//! External collaborator traits and in-memory implementations.

pub mod availability;
pub mod notifier;
pub mod payment;

pub use availability::{
    Availability, AvailabilityError, AvailabilityStore, InMemoryAvailabilityStore,
};
pub use notifier::{InMemoryNotifier, Notifier, NotifyError};
pub use payment::{InMemoryPaymentProcessor, PaymentCapture, PaymentError, PaymentProcessor};
