//! Async polling
//!
//! Repeats a check until it yields a value or a deadline passes.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Interval and overall deadline for a polling loop
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(30 * 60),
        }
    }
}

impl PollConfig {
    pub fn new(interval_secs: u64, timeout_secs: u64) -> Self {
        Self {
            interval: Duration::from_secs(interval_secs),
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[derive(Error, Debug)]
#[error("Timed out after {elapsed:?} ({attempts} attempts)")]
pub struct PollTimeout {
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Call `check` every `interval` until it returns `Some`.
///
/// Errors from `check` are logged and treated as "not yet". The check runs
/// at least once even with a zero timeout.
pub async fn poll_until<F, Fut, T, E>(config: PollConfig, mut check: F) -> Result<T, PollTimeout>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
    E: std::fmt::Display,
{
    let start = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match check().await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(e) => debug!("Poll attempt {} failed: {}", attempts, e),
        }

        if start.elapsed() + config.interval > config.timeout {
            return Err(PollTimeout {
                attempts,
                elapsed: start.elapsed(),
            });
        }

        sleep(config.interval).await;
    }
}
