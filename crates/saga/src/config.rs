//! Reservation configuration loaded from environment variables.

use std::time::Duration;

use lock::LockManagerConfig;
use resilience::{BulkheadConfig, CircuitBreakerConfig};

/// Tunables for the reservation saga and its dependency gates.
///
/// Reads from `RESERVATION_*` environment variables, falling back to
/// defaults. Durations are given in milliseconds:
/// - `RESERVATION_LOCK_ATTEMPTS`, `RESERVATION_LOCK_BACKOFF_MS`
/// - `RESERVATION_LEASE_DURATION_MS`
/// - `RESERVATION_AVAILABILITY_RETRY_ATTEMPTS`, `RESERVATION_AVAILABILITY_RETRY_BASE_MS`
/// - `RESERVATION_BREAKER_ERROR_THRESHOLD`, `RESERVATION_BREAKER_VOLUME_THRESHOLD`,
///   `RESERVATION_BREAKER_RESET_TIMEOUT_MS`
/// - `RESERVATION_PAYMENT_MAX_CONCURRENT`, `RESERVATION_PAYMENT_MAX_QUEUE`,
///   `RESERVATION_PAYMENT_QUEUE_TIMEOUT_MS`, `RESERVATION_PAYMENT_DEADLINE_MS`
/// - `RESERVATION_CACHE_TTL_MS`, `RESERVATION_STEP_DEADLINE_MS`
#[derive(Debug, Clone)]
pub struct ReservationConfig {
    /// Retry bounds for lock acquisition.
    pub lock: LockManagerConfig,
    /// How long a lease is held; must exceed the worst-case critical
    /// section.
    pub lease_duration: Duration,
    /// Attempt budget for the availability live read.
    pub availability_retry_attempts: u32,
    /// Backoff base for availability retries.
    pub availability_retry_base: Duration,
    /// Breaker thresholds for the availability store.
    pub availability_breaker: CircuitBreakerConfig,
    /// Breaker thresholds for the payment processor.
    pub payment_breaker: CircuitBreakerConfig,
    /// Concurrency bounds for the payment processor.
    pub payment_bulkhead: BulkheadConfig,
    /// Deadline on each payment charge. Kept materially shorter than the
    /// payment dependency's worst observed latency.
    pub payment_deadline: Duration,
    /// How long a cached availability read may be served stale.
    pub cache_ttl: Duration,
    /// Deadline on each saga step, over and above per-call deadlines.
    pub step_deadline: Duration,
}

impl ReservationConfig {
    /// Loads configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            lock: LockManagerConfig {
                max_attempts: env_parse("RESERVATION_LOCK_ATTEMPTS", defaults.lock.max_attempts),
                backoff_base: env_duration_ms(
                    "RESERVATION_LOCK_BACKOFF_MS",
                    defaults.lock.backoff_base,
                ),
                backoff_max: defaults.lock.backoff_max,
            },
            lease_duration: env_duration_ms(
                "RESERVATION_LEASE_DURATION_MS",
                defaults.lease_duration,
            ),
            availability_retry_attempts: env_parse(
                "RESERVATION_AVAILABILITY_RETRY_ATTEMPTS",
                defaults.availability_retry_attempts,
            ),
            availability_retry_base: env_duration_ms(
                "RESERVATION_AVAILABILITY_RETRY_BASE_MS",
                defaults.availability_retry_base,
            ),
            availability_breaker: CircuitBreakerConfig {
                error_threshold: env_parse(
                    "RESERVATION_BREAKER_ERROR_THRESHOLD",
                    defaults.availability_breaker.error_threshold,
                ),
                volume_threshold: env_parse(
                    "RESERVATION_BREAKER_VOLUME_THRESHOLD",
                    defaults.availability_breaker.volume_threshold,
                ),
                reset_timeout: env_duration_ms(
                    "RESERVATION_BREAKER_RESET_TIMEOUT_MS",
                    defaults.availability_breaker.reset_timeout,
                ),
                window_size: defaults.availability_breaker.window_size,
            },
            payment_breaker: CircuitBreakerConfig {
                error_threshold: env_parse(
                    "RESERVATION_BREAKER_ERROR_THRESHOLD",
                    defaults.payment_breaker.error_threshold,
                ),
                volume_threshold: env_parse(
                    "RESERVATION_BREAKER_VOLUME_THRESHOLD",
                    defaults.payment_breaker.volume_threshold,
                ),
                reset_timeout: env_duration_ms(
                    "RESERVATION_BREAKER_RESET_TIMEOUT_MS",
                    defaults.payment_breaker.reset_timeout,
                ),
                window_size: defaults.payment_breaker.window_size,
            },
            payment_bulkhead: BulkheadConfig {
                max_concurrent: env_parse(
                    "RESERVATION_PAYMENT_MAX_CONCURRENT",
                    defaults.payment_bulkhead.max_concurrent,
                ),
                max_queue: env_parse(
                    "RESERVATION_PAYMENT_MAX_QUEUE",
                    defaults.payment_bulkhead.max_queue,
                ),
                queue_timeout: env_duration_ms(
                    "RESERVATION_PAYMENT_QUEUE_TIMEOUT_MS",
                    defaults.payment_bulkhead.queue_timeout,
                ),
            },
            payment_deadline: env_duration_ms(
                "RESERVATION_PAYMENT_DEADLINE_MS",
                defaults.payment_deadline,
            ),
            cache_ttl: env_duration_ms("RESERVATION_CACHE_TTL_MS", defaults.cache_ttl),
            step_deadline: env_duration_ms(
                "RESERVATION_STEP_DEADLINE_MS",
                defaults.step_deadline,
            ),
        }
    }
}

impl Default for ReservationConfig {
    fn default() -> Self {
        Self {
            lock: LockManagerConfig::default(),
            lease_duration: Duration::from_secs(30),
            availability_retry_attempts: 3,
            availability_retry_base: Duration::from_millis(100),
            availability_breaker: CircuitBreakerConfig::default(),
            payment_breaker: CircuitBreakerConfig::default(),
            payment_bulkhead: BulkheadConfig::default(),
            payment_deadline: Duration::from_secs(5),
            cache_ttl: Duration::from_secs(60),
            step_deadline: Duration::from_secs(10),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

fn env_duration_ms(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = ReservationConfig::default();
        assert_eq!(config.lock.max_attempts, 5);
        assert_eq!(config.lease_duration, Duration::from_secs(30));
        assert_eq!(config.availability_retry_attempts, 3);
        assert_eq!(config.payment_deadline, Duration::from_secs(5));
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert_eq!(config.step_deadline, Duration::from_secs(10));
        assert_eq!(config.payment_bulkhead.max_concurrent, 10);
        assert_eq!(config.payment_bulkhead.max_queue, 10);
    }

    #[test]
    fn test_from_env_without_overrides_matches_defaults() {
        let config = ReservationConfig::from_env();
        let defaults = ReservationConfig::default();
        assert_eq!(config.lease_duration, defaults.lease_duration);
        assert_eq!(config.payment_deadline, defaults.payment_deadline);
        assert_eq!(
            config.availability_breaker.volume_threshold,
            defaults.availability_breaker.volume_threshold
        );
    }
}
