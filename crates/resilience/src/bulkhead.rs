//! Bulkhead: bounded concurrency with a bounded FIFO wait queue.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Semaphore;

use crate::error::ResilienceError;

/// Bulkhead bounds for one downstream dependency.
#[derive(Debug, Clone, Copy)]
pub struct BulkheadConfig {
    /// Maximum tasks running against the dependency at once.
    pub max_concurrent: usize,
    /// Maximum tasks waiting for a slot before new arrivals are shed.
    pub max_queue: usize,
    /// How long a queued task may wait before failing instead of running.
    pub queue_timeout: std::time::Duration,
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            max_queue: 10,
            queue_timeout: std::time::Duration::from_secs(1),
        }
    }
}

/// Bounded-concurrency, bounded-queue admission gate for one dependency.
///
/// Saturation of the guarded dependency is contained here: excess work
/// queues up to `max_queue` deep and is then shed immediately, so one slow
/// collaborator cannot absorb every task in the process.
pub struct Bulkhead {
    name: String,
    config: BulkheadConfig,
    permits: Semaphore,
    queued: AtomicUsize,
    in_flight: AtomicUsize,
}

impl Bulkhead {
    /// Creates a bulkhead for the named dependency.
    pub fn new(name: impl Into<String>, config: BulkheadConfig) -> Self {
        Self {
            name: name.into(),
            permits: Semaphore::new(config.max_concurrent),
            config,
            queued: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Returns the dependency name this bulkhead guards.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of tasks currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Number of tasks currently waiting for a slot.
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    /// Runs `task` once a concurrency slot is available.
    ///
    /// Fails with `AdmissionRejected` when the wait queue is already full,
    /// and with `AdmissionTimeout` when a slot does not free up within
    /// `queue_timeout`. A timed-out task is never run.
    pub async fn admit<T, E, F, Fut>(&self, task: F) -> Result<T, ResilienceError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = match self.permits.try_acquire() {
            Ok(permit) => permit,
            Err(_) => {
                let waiting = self.queued.fetch_add(1, Ordering::SeqCst);
                if waiting >= self.config.max_queue {
                    self.queued.fetch_sub(1, Ordering::SeqCst);
                    tracing::warn!(bulkhead = %self.name, "wait queue full, shedding task");
                    metrics::counter!("bulkhead_rejections_total", "bulkhead" => self.name.clone())
                        .increment(1);
                    return Err(ResilienceError::AdmissionRejected {
                        max_queue: self.config.max_queue,
                    });
                }

                let acquired =
                    tokio::time::timeout(self.config.queue_timeout, self.permits.acquire()).await;
                self.queued.fetch_sub(1, Ordering::SeqCst);
                match acquired {
                    Ok(Ok(permit)) => permit,
                    Ok(Err(_closed)) => {
                        return Err(ResilienceError::AdmissionRejected {
                            max_queue: self.config.max_queue,
                        });
                    }
                    Err(_elapsed) => {
                        tracing::warn!(bulkhead = %self.name, "queued task timed out waiting for a slot");
                        metrics::counter!("bulkhead_timeouts_total", "bulkhead" => self.name.clone())
                            .increment(1);
                        return Err(ResilienceError::AdmissionTimeout {
                            waited: self.config.queue_timeout,
                        });
                    }
                }
            }
        };

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let result = task().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        drop(permit);

        result.map_err(ResilienceError::Inner)
    }
}

impl std::fmt::Debug for Bulkhead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bulkhead")
            .field("name", &self.name)
            .field("in_flight", &self.in_flight())
            .field("queued", &self.queued())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Debug, PartialEq)]
    struct TestError;

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "test error")
        }
    }

    fn bulkhead(max_concurrent: usize, max_queue: usize, timeout: Duration) -> Arc<Bulkhead> {
        Arc::new(Bulkhead::new(
            "test",
            BulkheadConfig {
                max_concurrent,
                max_queue,
                queue_timeout: timeout,
            },
        ))
    }

    #[tokio::test]
    async fn runs_immediately_below_limit() {
        let bh = bulkhead(2, 2, Duration::from_secs(1));
        assert_eq!(bh.name(), "test");

        let result = bh.admit(|| async { Ok::<_, TestError>(5) }).await;
        assert_eq!(result.unwrap(), 5);
        assert_eq!(bh.in_flight(), 0);
    }

    #[tokio::test]
    async fn error_results_release_the_slot() {
        let bh = bulkhead(1, 0, Duration::from_secs(1));

        let result = bh.admit(|| async { Err::<(), _>(TestError) }).await;
        assert!(matches!(result.unwrap_err(), ResilienceError::Inner(_)));

        // Slot is free again.
        let result = bh.admit(|| async { Ok::<_, TestError>(()) }).await;
        assert!(result.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrency_never_exceeds_limit() {
        let bh = bulkhead(3, 20, Duration::from_secs(5));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let bh = Arc::clone(&bh);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                let gauge = Arc::clone(&bh);
                let peak = Arc::clone(&peak);
                bh.admit(move || async move {
                    peak.fetch_max(gauge.in_flight(), Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Ok::<_, TestError>(())
                })
                .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn full_queue_sheds_immediately() {
        let bh = bulkhead(1, 0, Duration::from_secs(10));
        let gate = Arc::new(Semaphore::new(0));

        let holder = {
            let bh = Arc::clone(&bh);
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                bh.admit(|| async move {
                    let _permit = gate.acquire().await;
                    Ok::<_, TestError>(())
                })
                .await
            })
        };
        while bh.in_flight() == 0 {
            tokio::task::yield_now().await;
        }

        // Queue capacity is zero: rejection is immediate, no blocking.
        let result = bh.admit(|| async { Ok::<_, TestError>(()) }).await;
        assert!(result.unwrap_err().is_admission_rejected());

        gate.add_permits(1);
        holder.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn fifteen_tasks_queue_without_shedding_and_five_beyond_twenty_shed() {
        let bh = bulkhead(10, 10, Duration::from_secs(60));
        let gate = Arc::new(Semaphore::new(0));

        let mut handles = Vec::new();
        for _ in 0..15 {
            let bh = Arc::clone(&bh);
            let gate = Arc::clone(&gate);
            handles.push(tokio::spawn(async move {
                bh.admit(|| async move {
                    let _permit = gate.acquire().await;
                    Ok::<_, TestError>(())
                })
                .await
            }));
            tokio::task::yield_now().await;
        }

        // 10 running, 5 queued, nothing shed.
        while bh.in_flight() < 10 || bh.queued() < 5 {
            tokio::task::yield_now().await;
        }

        // Five more bring the queue to its capacity of 10.
        for _ in 0..5 {
            let bh = Arc::clone(&bh);
            let gate = Arc::clone(&gate);
            handles.push(tokio::spawn(async move {
                bh.admit(|| async move {
                    let _permit = gate.acquire().await;
                    Ok::<_, TestError>(())
                })
                .await
            }));
            tokio::task::yield_now().await;
        }
        while bh.queued() < 10 {
            tokio::task::yield_now().await;
        }

        // Beyond max_concurrent + max_queue: shed immediately.
        let mut rejected = 0;
        for _ in 0..5 {
            let result = bh.admit(|| async { Ok::<_, TestError>(()) }).await;
            if result.unwrap_err().is_admission_rejected() {
                rejected += 1;
            }
        }
        assert_eq!(rejected, 5);

        gate.add_permits(20);
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(bh.in_flight(), 0);
        assert_eq!(bh.queued(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn queued_task_times_out_and_never_runs() {
        let bh = bulkhead(1, 1, Duration::from_millis(100));
        let gate = Arc::new(Semaphore::new(0));

        let holder = {
            let bh = Arc::clone(&bh);
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                bh.admit(|| async move {
                    let _permit = gate.acquire().await;
                    Ok::<_, TestError>(())
                })
                .await
            })
        };
        while bh.in_flight() == 0 {
            tokio::task::yield_now().await;
        }

        let ran = Arc::new(AtomicUsize::new(0));
        let queued = {
            let bh = Arc::clone(&bh);
            let ran = Arc::clone(&ran);
            tokio::spawn(async move {
                bh.admit(move || async move {
                    ran.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, TestError>(())
                })
                .await
            })
        };

        let result = queued.await.unwrap();
        assert!(result.unwrap_err().is_timeout());
        assert_eq!(ran.load(Ordering::SeqCst), 0);

        gate.add_permits(1);
        holder.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn completion_admits_next_waiter() {
        let bh = bulkhead(1, 1, Duration::from_secs(10));
        let gate = Arc::new(Semaphore::new(0));

        let holder = {
            let bh = Arc::clone(&bh);
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                bh.admit(|| async move {
                    let _permit = gate.acquire().await;
                    Ok::<_, TestError>(())
                })
                .await
            })
        };
        while bh.in_flight() == 0 {
            tokio::task::yield_now().await;
        }

        let queued = {
            let bh = Arc::clone(&bh);
            tokio::spawn(async move { bh.admit(|| async { Ok::<_, TestError>(11) }).await })
        };
        while bh.queued() == 0 {
            tokio::task::yield_now().await;
        }

        gate.add_permits(1);
        holder.await.unwrap().unwrap();
        assert_eq!(queued.await.unwrap().unwrap(), 11);
    }
}
