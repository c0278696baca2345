//! Shared identifier and value types used across the reservation system.

pub mod types;

pub use types::{HolderId, Money, RequesterId, ReservationId, ResourceId};
