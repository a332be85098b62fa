//! This module defines a trait for printing run results.
mod json;
mod text;

pub use json::JsonReporter;
pub use text::TextReporter;

use crate::report::RunResult;

/// A trait for reporting run results.
pub trait RunReporter {
    /// Print the result to the given writer.
    fn print(&self, w: &mut dyn std::io::Write, result: &RunResult) -> anyhow::Result<()>;
}
