//! Work execution engine
//!
//! Bounded fan-out of independent checks with complete failure reporting.

mod parallel;

pub use parallel::{run_bounded, work_item, BoundedParallelRunner, WorkItem};
