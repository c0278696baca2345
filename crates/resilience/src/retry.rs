//! Bounded retry with backoff, jitter, and a retryability predicate.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::backoff::{Backoff, Jitter};
use crate::clock::{Clock, TokioClock};
use crate::error::ResilienceError;

/// Retries an operation a bounded number of times with jittered backoff.
///
/// Errors the `should_retry` predicate rejects abort immediately without
/// consuming remaining attempts — validation failures and explicit
/// rejections must not be hammered against a dependency that will keep
/// giving the same answer.
pub struct RetryPolicy<E> {
    max_attempts: u32,
    backoff: Backoff,
    jitter: Jitter,
    should_retry: Arc<dyn Fn(&E) -> bool + Send + Sync>,
    clock: Arc<dyn Clock>,
}

impl<E> std::fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("jitter", &self.jitter)
            .finish()
    }
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            max_attempts: self.max_attempts,
            backoff: self.backoff,
            jitter: self.jitter,
            should_retry: Arc::clone(&self.should_retry),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<E> RetryPolicy<E> {
    /// Starts building a retry policy.
    pub fn builder() -> RetryPolicyBuilder<E> {
        RetryPolicyBuilder::new()
    }

    /// Runs `operation` until it succeeds, a non-retryable error occurs,
    /// or the attempt budget is spent.
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T, ResilienceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if !(self.should_retry)(&error) {
                        return Err(ResilienceError::Inner(error));
                    }
                    if attempt >= self.max_attempts {
                        return Err(ResilienceError::RetriesExhausted {
                            attempts: attempt,
                            last: error,
                        });
                    }
                    let delay = self.jitter.apply(self.backoff.delay(attempt));
                    tracing::debug!(attempt, ?delay, "attempt failed, backing off");
                    self.clock.sleep(delay).await;
                }
            }
        }
    }
}

/// Builder for [`RetryPolicy`].
pub struct RetryPolicyBuilder<E> {
    max_attempts: u32,
    backoff: Backoff,
    jitter: Jitter,
    should_retry: Arc<dyn Fn(&E) -> bool + Send + Sync>,
    clock: Arc<dyn Clock>,
}

impl<E> RetryPolicyBuilder<E> {
    /// Creates a builder with 3 attempts, exponential backoff from 100ms,
    /// full jitter, and every error considered retryable.
    pub fn new() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::exponential(Duration::from_millis(100)),
            jitter: Jitter::Full,
            should_retry: Arc::new(|_| true),
            clock: Arc::new(TokioClock),
        }
    }

    /// Sets the attempt budget (minimum 1).
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Sets the backoff schedule.
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets the jitter strategy.
    pub fn jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    /// Sets the predicate deciding whether an error is worth retrying.
    pub fn should_retry<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.should_retry = Arc::new(predicate);
        self
    }

    /// Sets the clock used for backoff sleeps.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Builds the policy.
    pub fn build(self) -> RetryPolicy<E> {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff: self.backoff,
            jitter: self.jitter,
            should_retry: self.should_retry,
            clock: self.clock,
        }
    }
}

impl<E> Default for RetryPolicyBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}
