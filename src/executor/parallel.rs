//! Bounded parallel execution
//!
//! Runs independent work items on a fixed-size worker pool and collects
//! every failure instead of stopping at the first one.

use anyhow::anyhow;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::utils::Timer;

/// A single unit of work. Nothing runs until a worker polls it.
pub type WorkItem = BoxFuture<'static, anyhow::Result<()>>;

/// Box an async block into a [`WorkItem`]
pub fn work_item<F>(fut: F) -> WorkItem
where
    F: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
{
    fut.boxed()
}

/// Runner construction errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RunnerError {
    #[error("Invalid worker pool size {0}: at least one worker is required")]
    InvalidPoolSize(usize),
}

/// Failure of one work item, keyed by its position in the submitted sequence
#[derive(Debug)]
pub struct WorkFailure {
    pub index: usize,
    pub error: anyhow::Error,
}

impl fmt::Display for WorkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item {}: {:#}", self.index, self.error)
    }
}

/// Unordered set of failures from one run
#[derive(Debug, Default)]
pub struct Failures {
    items: Vec<WorkFailure>,
}

impl Failures {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkFailure> {
        self.items.iter()
    }

    /// Collapse into a single error listing every failure, or `Ok` when empty
    pub fn into_result(self) -> anyhow::Result<()> {
        if self.is_empty() {
            return Ok(());
        }

        let mut items: Vec<&WorkFailure> = self.iter().collect();
        items.sort_by_key(|f| f.index);

        let lines: Vec<String> = items.iter().map(|f| format!("  {f}")).collect();
        Err(anyhow!(
            "{} work item(s) failed:\n{}",
            self.len(),
            lines.join("\n")
        ))
    }
}

impl IntoIterator for Failures {
    type Item = WorkFailure;
    type IntoIter = std::vec::IntoIter<WorkFailure>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Fixed-size worker pool that never short-circuits
#[derive(Clone, Copy, Debug)]
pub struct BoundedParallelRunner {
    workers: NonZeroUsize,
}

impl BoundedParallelRunner {
    /// Create a runner with `workers` slots. Zero is rejected.
    pub fn new(workers: usize) -> Result<Self, RunnerError> {
        NonZeroUsize::new(workers)
            .map(|workers| Self { workers })
            .ok_or(RunnerError::InvalidPoolSize(workers))
    }

    pub fn workers(&self) -> usize {
        self.workers.get()
    }

    /// Run every item exactly once, at most `workers` at a time.
    ///
    /// Returns only after all items have finished. A panicking item is
    /// reported as a failure for its index.
    pub async fn run(&self, items: Vec<WorkItem>) -> Failures {
        let total = items.len();
        if total == 0 {
            return Failures::default();
        }

        let timer = Timer::start("parallel run");
        let pool_size = self.workers.get().min(total);

        let (job_tx, job_rx) = mpsc::channel::<(usize, WorkItem)>(pool_size);
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (fail_tx, mut fail_rx) = mpsc::unbounded_channel::<WorkFailure>();

        let mut pool = JoinSet::new();
        for worker in 0..pool_size {
            let job_rx = job_rx.clone();
            let fail_tx = fail_tx.clone();

            pool.spawn(async move {
                loop {
                    // Lock is released as soon as a job is taken
                    let next = job_rx.lock().await.recv().await;
                    let Some((index, item)) = next else {
                        break;
                    };

                    debug!("Worker {} running item {}", worker, index);

                    let error = match AssertUnwindSafe(item).catch_unwind().await {
                        Ok(Ok(())) => None,
                        Ok(Err(e)) => Some(e),
                        Err(panic) => Some(anyhow!("panicked: {}", panic_message(&*panic))),
                    };

                    if let Some(error) = error {
                        debug!("Item {} failed: {:#}", index, error);
                        // Receiver outlives every worker
                        let _ = fail_tx.send(WorkFailure { index, error });
                    }
                }
            });
        }
        drop(fail_tx);

        for (index, item) in items.into_iter().enumerate() {
            if job_tx.send((index, item)).await.is_err() {
                warn!("All workers exited before item {} was queued", index);
                break;
            }
        }
        drop(job_tx);

        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                warn!("Worker task ended abnormally: {}", e);
            }
        }

        let mut failures = Vec::new();
        while let Some(failure) = fail_rx.recv().await {
            failures.push(failure);
        }

        let elapsed = timer.stop();
        info!(
            "Ran {} item(s) on {} worker(s) in {}ms - {} failed",
            total,
            pool_size,
            elapsed.as_millis(),
            failures.len()
        );

        Failures { items: failures }
    }
}

/// Convenience wrapper: validate the pool size, then run
pub async fn run_bounded(items: Vec<WorkItem>, workers: usize) -> Result<Failures, RunnerError> {
    let runner = BoundedParallelRunner::new(workers)?;
    Ok(runner.run(items).await)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
