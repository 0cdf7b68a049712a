//! Output formatting module
//!
//! Renders check reports as tables, JSON, CSV or one-line summaries.

mod formatter;

pub use formatter::{write_output_to_file, OutputFormat, ResultFormatter};
