use std::collections::VecDeque;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;

/// Shared stop signal. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a stop has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Request a stop. No further tasks launch; in-flight tasks finish.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Outcome counts for one [`ConcurrencyLimiter::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LimiterReport {
    /// Tasks whose future was started.
    pub launched: usize,
    pub succeeded: usize,
    /// Tasks that returned `Err` or panicked.
    pub failed: usize,
    /// Tasks never launched because the run was cancelled.
    pub skipped: usize,
}

/// Sliding-window runner with a fixed parallelism bound.
///
/// All task futures are polled from the calling task, so `limit` bounds the
/// number of outstanding operations rather than threads. Tasks launch in input
/// order; each may hand back follow-up tasks, which are queued ahead of the
/// remaining input in the order returned.
///
/// # Example
/// ```
/// use shotforge::{CancellationFlag, ConcurrencyLimiter};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let limiter = ConcurrencyLimiter::new(2, CancellationFlag::new());
/// let report = limiter
///     .run(vec![1, 2, 3], |n| async move {
///         if n == 2 { Err("boom") } else { Ok(Vec::new()) }
///     })
///     .await;
/// assert_eq!(report.succeeded, 2);
/// assert_eq!(report.failed, 1);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    limit: usize,
    cancel: CancellationFlag,
}

impl ConcurrencyLimiter {
    /// Create a limiter. A limit of 0 is treated as 1.
    pub fn new(limit: usize, cancel: CancellationFlag) -> Self {
        Self {
            limit: limit.max(1),
            cancel,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Run every task through `worker`, never more than `limit` at once.
    ///
    /// Returns once every launched task has settled. Task failures and panics
    /// are counted, never propagated.
    pub async fn run<T, F, Fut, E>(&self, tasks: Vec<T>, worker: F) -> LimiterReport
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<Vec<T>, E>>,
        E: Display,
    {
        let mut report = LimiterReport::default();
        let mut pending: VecDeque<T> = tasks.into();
        let mut in_flight = FuturesUnordered::new();

        loop {
            while in_flight.len() < self.limit {
                if self.cancel.is_cancelled() {
                    break;
                }
                let Some(task) = pending.pop_front() else {
                    break;
                };
                report.launched += 1;
                in_flight.push(AssertUnwindSafe(worker(task)).catch_unwind());
            }

            match in_flight.next().await {
                None => break,
                Some(Ok(Ok(follow_ups))) => {
                    report.succeeded += 1;
                    for task in follow_ups.into_iter().rev() {
                        pending.push_front(task);
                    }
                }
                Some(Ok(Err(e))) => {
                    report.failed += 1;
                    tracing::debug!(error = %e, "task failed");
                }
                Some(Err(_)) => {
                    report.failed += 1;
                    tracing::error!("task panicked");
                }
            }
        }

        report.skipped = pending.len();
        if report.skipped > 0 {
            tracing::info!(skipped = report.skipped, "limiter stopped before draining queue");
        }
        report
    }
}
