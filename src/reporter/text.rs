use std::{io::Write, time::Duration};

use byte_unit::{Byte, UnitType};
use crossterm::style::{StyledContent, Stylize};

use super::RunReporter;
use crate::report::{LatencySummary, RunOutcome, RunResult};

/// Prints the result as human-readable text.
pub struct TextReporter;

impl RunReporter for TextReporter {
    fn print(&self, w: &mut dyn Write, result: &RunResult) -> anyhow::Result<()> {
        print_summary(w, result)?;
        writeln!(w)?;

        if let Some(latency) = &result.latency {
            print_latency(w, latency)?;
            writeln!(w)?;
        }

        if let Some(error) = &result.error {
            writeln!(w, "{}", "Error".h1())?;
            writeln!(w, "  {}", error.as_str().red())?;
        }

        Ok(())
    }
}

fn render_outcome(outcome: RunOutcome) -> StyledContent<&'static str> {
    let text: &'static str = outcome.into();
    match outcome {
        RunOutcome::Completed => text.green().bold(),
        RunOutcome::Stopped => text.yellow().bold(),
        RunOutcome::Failed => text.red().bold(),
    }
}

fn render_failed(failed: u64) -> StyledContent<String> {
    let text = failed.to_string();
    if failed == 0 { text.green().bold() } else { text.red().bold() }
}

#[rustfmt::skip]
fn print_summary(w: &mut dyn Write, r: &RunResult) -> anyhow::Result<()> {
    let cfg = &r.config;
    let secs = r.duration.as_secs_f64();
    let payload = Byte::from_u64(cfg.payload_size as u64).get_appropriate_unit(UnitType::Binary);

    writeln!(w, "{}", "Summary".h1())?;
    match &cfg.name {
        Some(name) => writeln!(w, "  Run:           {} ({name})", r.run_id)?,
        None => writeln!(w,       "  Run:           {}", r.run_id)?,
    }
    writeln!(w,       "  Outcome:       {}", render_outcome(r.outcome))?;
    writeln!(w,       "  Target:        {}", cfg.target)?;
    writeln!(w,       "  Time:          {}", format!("{secs:.2}s").green().bold())?;
    writeln!(w,       "  Sent:          {}", format!("{}/{}", r.messages_sent, cfg.message_count).green().bold())?;
    writeln!(w,       "  Failed:        {}", render_failed(r.messages_failed))?;
    writeln!(w,       "  Rate:          {} (target {}/s)", format!("{:.2}/s", r.average_rate).green().bold(), cfg.message_rate)?;
    writeln!(w,       "  Payload:       {payload:.2}")?;
    writeln!(w,       "  Started:       {}", r.started_at.to_rfc3339())?;
    writeln!(w,       "  Completed:     {}", r.completed_at.to_rfc3339())?;
    Ok(())
}

#[rustfmt::skip]
fn print_latency(w: &mut dyn Write, l: &LatencySummary) -> anyhow::Result<()> {
    writeln!(w, "{}", "Latencies".h1())?;
    writeln!(w, "  {:>10} {:>10} {:>10} {:>10} {:>10}", "Min".cyan(), "Avg".blue(), "Med".yellow(), "P99".magenta(), "Max".red())?;
    writeln!(w, "  {:>10} {:>10} {:>10} {:>10} {:>10}",
        format_latency(l.min), format_latency(l.mean), format_latency(l.p50), format_latency(l.p99), format_latency(l.max))?;
    Ok(())
}

/// Formats a latency with the largest unit that keeps it at or above 1.
fn format_latency(d: Duration) -> String {
    let nanos = d.as_nanos() as f64;
    match d.as_nanos() {
        n if n < 1_000 => format!("{nanos:.0}ns"),
        n if n < 1_000_000 => format!("{:.2}µs", nanos / 1e3),
        n if n < 1_000_000_000 => format!("{:.2}ms", nanos / 1e6),
        _ => format!("{:.2}s", nanos / 1e9),
    }
}

trait ReportStyle {
    fn h1(&self) -> StyledContent<&str>;
}

impl<T: AsRef<str>> ReportStyle for T {
    fn h1(&self) -> StyledContent<&str> {
        self.as_ref().bold().underlined().yellow()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::{config::RunConfig, report::RunId};

    fn result(outcome: RunOutcome, error: Option<&str>) -> RunResult {
        let now = Utc::now();
        RunResult {
            run_id: RunId::generate(),
            success: outcome.is_success(),
            outcome,
            messages_sent: 9,
            messages_failed: 1,
            duration: Duration::from_secs(2),
            average_rate: 4.5,
            started_at: now,
            completed_at: now,
            config: RunConfig::new(10, 5, "orders").with_name("smoke"),
            latency: Some(LatencySummary {
                min: Duration::from_micros(800),
                mean: Duration::from_millis(2),
                p50: Duration::from_millis(2),
                p99: Duration::from_millis(9),
                max: Duration::from_millis(12),
            }),
            error: error.map(String::from),
        }
    }

    #[test]
    fn formats_latency_units() {
        assert_eq!(format_latency(Duration::from_nanos(999)), "999ns");
        assert_eq!(format_latency(Duration::from_micros(800)), "800.00µs");
        assert_eq!(format_latency(Duration::from_millis(12)), "12.00ms");
        assert_eq!(format_latency(Duration::from_millis(2500)), "2.50s");
    }

    #[test]
    fn prints_summary_and_error() {
        let mut out = Vec::new();
        TextReporter.print(&mut out, &result(RunOutcome::Failed, Some("connection pool is empty"))).unwrap();
        let out = String::from_utf8(out).unwrap();

        assert!(out.contains("Summary"));
        assert!(out.contains("orders"));
        assert!(out.contains("smoke"));
        assert!(out.contains("failed"));
        assert!(out.contains("Latencies"));
        assert!(out.contains("connection pool is empty"));
    }

    #[test]
    fn json_report_is_parseable() {
        let mut out = Vec::new();
        super::super::JsonReporter.print(&mut out, &result(RunOutcome::Stopped, None)).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();

        assert_eq!(json["outcome"], "stopped");
        assert_eq!(json["success"], true);
        assert_eq!(json["messages_sent"], 9);
        assert_eq!(json["config"]["target"], "orders");
    }
}
