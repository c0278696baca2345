//! Seat reservation saga constants.

/// The saga type identifier for seat reservation.
pub const SAGA_TYPE: &str = "SeatReservation";

/// Step name: Acquire the per-resource lock.
pub const STEP_ACQUIRE_LOCK: &str = "acquire_lock";

/// Step name: Confirm availability through the read stack.
pub const STEP_CONFIRM_AVAILABILITY: &str = "confirm_availability";

/// Step name: Atomically decrement inventory.
pub const STEP_DECREMENT_INVENTORY: &str = "decrement_inventory";

/// Step name: Capture payment.
pub const STEP_CAPTURE_PAYMENT: &str = "capture_payment";

/// Step name: Confirm the reservation and notify.
pub const STEP_CONFIRM: &str = "confirm";

/// Dependency name for the availability store's shared gates.
pub const DEP_AVAILABILITY: &str = "availability";

/// Dependency name for the payment processor's shared gates.
pub const DEP_PAYMENT: &str = "payment";
