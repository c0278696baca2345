//! Time abstraction for deterministic backoff and expiry logic.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;

/// Source of time for retry delays, lease expiry, and breaker reset timers.
///
/// Production code uses [`TokioClock`]; tests inject [`ManualClock`] so
/// timing-dependent behavior is deterministic.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;

    /// Sleeps for the given duration.
    async fn sleep(&self, duration: Duration);
}

/// Real clock backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug)]
struct ManualState {
    now: Instant,
    slept: Vec<Duration>,
}

/// Test clock that advances only when told to (or when slept on).
///
/// `sleep` returns immediately after advancing the clock by the requested
/// duration, and records the duration so tests can assert on the backoff
/// schedule an operation produced.
#[derive(Debug, Clone)]
pub struct ManualClock {
    state: Arc<Mutex<ManualState>>,
}

impl ManualClock {
    /// Creates a manual clock starting at the present instant.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ManualState {
                now: Instant::now(),
                slept: Vec::new(),
            })),
        }
    }

    /// Moves the clock forward by `duration`.
    pub fn advance(&self, duration: Duration) {
        let mut state = self.state.lock().unwrap();
        state.now += duration;
    }

    /// Returns the durations passed to `sleep`, in order.
    pub fn slept(&self) -> Vec<Duration> {
        self.state.lock().unwrap().slept.clone()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.state.lock().unwrap().now
    }

    async fn sleep(&self, duration: Duration) {
        {
            let mut state = self.state.lock().unwrap();
            state.now += duration;
            state.slept.push(duration);
        }
        // Give concurrent tasks a chance to run, as a real sleep would.
        tokio::task::yield_now().await;
    }
}
