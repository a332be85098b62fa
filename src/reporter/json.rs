use std::io::Write;

use super::RunReporter;
use crate::report::RunResult;

/// Prints the result as pretty JSON.
pub struct JsonReporter;

impl RunReporter for JsonReporter {
    fn print(&self, w: &mut dyn Write, result: &RunResult) -> anyhow::Result<()> {
        serde_json::to_writer_pretty(&mut *w, result)?;
        writeln!(w)?;
        Ok(())
    }
}
