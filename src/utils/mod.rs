//! Shared helpers
//!
//! Logging setup, timing and async polling.

mod logger;
mod poll;
mod timer;

pub use logger::{init_logger, LogLevel};
pub use poll::{poll_until, PollConfig, PollTimeout};
pub use timer::{Stopwatch, Timer};
