//! Circuit breaker: per-dependency failure detection with fail-fast.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::clock::Clock;
use crate::error::ResilienceError;

/// Circuit breaker thresholds.
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    /// Failure ratio in the rolling window at which the circuit opens.
    pub error_threshold: f64,
    /// Minimum calls in the window before the ratio is considered at all.
    /// Prevents a single early failure from opening the circuit.
    pub volume_threshold: usize,
    /// How long the circuit stays open before admitting a probe.
    pub reset_timeout: Duration,
    /// Maximum call outcomes retained in the rolling window.
    pub window_size: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            error_threshold: 0.5,
            volume_threshold: 10,
            reset_timeout: Duration::from_secs(30),
            window_size: 100,
        }
    }
}

/// The state of a circuit breaker.
///
/// State transitions:
/// ```text
/// Closed ──(failure ratio ≥ threshold at volume)──► Open
/// Open ──(reset timeout elapsed)──► HalfOpen
/// HalfOpen ──(probe success)──► Closed
/// HalfOpen ──(probe failure)──► Open
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    /// Calls pass through; outcomes are counted in the rolling window.
    Closed,
    /// Calls fail immediately without contacting the dependency.
    Open,
    /// A single probe call is in flight; everything else is rejected.
    HalfOpen,
}

impl CircuitState {
    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "Closed",
            CircuitState::Open => "Open",
            CircuitState::HalfOpen => "HalfOpen",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    /// Rolling window of recent call outcomes; `true` = failure.
    window: VecDeque<bool>,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

/// How a call was admitted; determines how its outcome is recorded.
#[derive(Debug, Clone, Copy)]
enum Admission {
    Normal,
    Probe,
}

/// Per-dependency failure detector that fails fast while the dependency
/// is unhealthy.
///
/// One breaker instance exists per logical downstream dependency and is
/// shared across every caller of that dependency in the process (see
/// [`crate::ResilienceRegistry`]). State is guarded by a mutex that is
/// never held across an await point.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Creates a breaker for the named dependency.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            name: name.into(),
            config,
            clock,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                window: VecDeque::new(),
                opened_at: None,
                probe_in_flight: false,
            }),
        }
    }

    /// Returns the dependency name this breaker guards.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current circuit state.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().unwrap().state
    }

    /// Runs `operation` through the breaker.
    ///
    /// Rejected calls fail with `CircuitOpen` without the dependency being
    /// contacted. Any error outcome of the operation counts as a failure
    /// in the rolling window.
    pub async fn call<T, E, F, Fut>(&self, operation: F) -> Result<T, ResilienceError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let Some(admission) = self.admit() else {
            metrics::counter!("circuit_breaker_rejections_total", "breaker" => self.name.clone())
                .increment(1);
            return Err(ResilienceError::CircuitOpen {
                dependency: self.name.clone(),
            });
        };

        let result = operation().await;
        self.record(admission, result.is_ok());
        result.map_err(ResilienceError::Inner)
    }

    /// Runs `operation` through the breaker, substituting `fallback`
    /// whenever the call is rejected or fails.
    pub async fn call_with_fallback<T, E, F, Fut, FB>(&self, operation: F, fallback: FB) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        FB: FnOnce() -> T,
    {
        match self.call(operation).await {
            Ok(value) => value,
            Err(_) => {
                tracing::debug!(breaker = %self.name, "serving fallback");
                fallback()
            }
        }
    }

    fn admit(&self) -> Option<Admission> {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::Closed => Some(Admission::Normal),
            CircuitState::Open => {
                let ready = inner
                    .opened_at
                    .map(|at| self.clock.now().duration_since(at) >= self.config.reset_timeout)
                    .unwrap_or(true);
                if ready {
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_in_flight = true;
                    tracing::info!(breaker = %self.name, "reset timeout elapsed, admitting probe");
                    self.transition_metric("half_open");
                    Some(Admission::Probe)
                } else {
                    None
                }
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    None
                } else {
                    inner.probe_in_flight = true;
                    Some(Admission::Probe)
                }
            }
        }
    }

    fn record(&self, admission: Admission, success: bool) {
        let mut inner = self.inner.lock().unwrap();
        match admission {
            Admission::Probe => {
                inner.probe_in_flight = false;
                if success {
                    inner.state = CircuitState::Closed;
                    inner.window.clear();
                    inner.opened_at = None;
                    tracing::info!(breaker = %self.name, "probe succeeded, circuit closed");
                    self.transition_metric("closed");
                } else {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(self.clock.now());
                    tracing::warn!(breaker = %self.name, "probe failed, circuit reopened");
                    self.transition_metric("open");
                }
            }
            Admission::Normal => {
                // A normally-admitted call may complete after the circuit
                // already transitioned; its outcome is then stale.
                if inner.state != CircuitState::Closed {
                    return;
                }
                inner.window.push_back(!success);
                while inner.window.len() > self.config.window_size {
                    inner.window.pop_front();
                }
                let calls = inner.window.len();
                let failures = inner.window.iter().filter(|failed| **failed).count();
                if calls >= self.config.volume_threshold
                    && failures as f64 / calls as f64 >= self.config.error_threshold
                {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(self.clock.now());
                    tracing::warn!(
                        breaker = %self.name,
                        failures,
                        calls,
                        "failure ratio exceeded threshold, circuit opened"
                    );
                    self.transition_metric("open");
                }
            }
        }
    }

    fn transition_metric(&self, to: &'static str) {
        metrics::counter!(
            "circuit_breaker_transitions_total",
            "breaker" => self.name.clone(),
            "to" => to
        )
        .increment(1);
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}
