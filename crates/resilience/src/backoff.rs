//! Backoff schedules and jitter for spacing retry attempts.

use std::time::Duration;

/// Delay schedule between retry attempts.
///
/// The delay before attempt `k+1` is `min(base * factor^(k-1), max)`,
/// before jitter is applied.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    base: Duration,
    factor: f64,
    max: Duration,
}

impl Backoff {
    /// Creates a backoff schedule with explicit base, factor, and cap.
    pub fn new(base: Duration, factor: f64, max: Duration) -> Self {
        Self { base, factor, max }
    }

    /// Exponential doubling from `base`, capped at 30 seconds.
    pub fn exponential(base: Duration) -> Self {
        Self {
            base,
            factor: 2.0,
            max: Duration::from_secs(30),
        }
    }

    /// The same delay between every attempt.
    pub fn constant(delay: Duration) -> Self {
        Self {
            base: delay,
            factor: 1.0,
            max: delay,
        }
    }

    /// Returns the delay after the given attempt (1-indexed).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let scaled = self.base.as_secs_f64() * self.factor.powi(exponent as i32);
        let capped = scaled.min(self.max.as_secs_f64());
        Duration::from_secs_f64(capped)
    }
}

/// Random spread added to backoff delays so concurrent callers do not
/// retry in lockstep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Jitter {
    /// No jitter; delays are exactly the backoff schedule.
    None,
    /// Adds a uniform random extra in `[0, delay)` to each delay.
    #[default]
    Full,
}

impl Jitter {
    /// Applies this jitter to a base delay.
    pub fn apply(&self, delay: Duration) -> Duration {
        match self {
            Jitter::None => delay,
            Jitter::Full => {
                if delay.is_zero() {
                    return delay;
                }
                delay + delay.mul_f64(rand::random::<f64>())
            }
        }
    }
}
