//! Counters, gauges and histograms updated by the engine.
//!
//! [`Metrics`] only accumulates. Exporters read it through [`Metrics::snapshot`].
//! With the `metrics` feature enabled, every update is also forwarded to the
//! [`metrics`](https://docs.rs/metrics) facade so that any installed recorder
//! (Prometheus, StatsD, ...) sees the same series.
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use parking_lot::Mutex;
use serde::Serialize;

use crate::{histogram::LatencyHistogram, report::RunOutcome};

/// Counter of successful sends.
pub const MESSAGES_SENT: &str = "kload_messages_sent_total";
/// Counter of failed sends.
pub const MESSAGES_FAILED: &str = "kload_messages_failed_total";
/// Counter of admitted runs.
pub const TESTS_STARTED: &str = "kload_tests_started_total";
/// Counter of terminated runs, labelled `status` = `success` or `failure`.
pub const TESTS_COMPLETED: &str = "kload_tests_completed_total";
/// Gauge, 1 while a run is active.
pub const ACTIVE_TEST: &str = "kload_active_test";
/// Gauge of the live send rate in messages per second.
pub const CURRENT_RATE: &str = "kload_current_rate";
/// Gauge of the live progress, 0 to 100.
pub const PROGRESS_PERCENT: &str = "kload_progress_percent";
/// Histogram of per-message send durations.
pub const SEND_DURATION: &str = "kload_message_send_duration_seconds";
/// Histogram of whole-run durations.
pub const TEST_DURATION: &str = "kload_test_duration_seconds";

/// Bucket bounds for the per-message send duration histogram.
pub const SEND_DURATION_BUCKETS: &[Duration] = &[
    Duration::from_millis(1),
    Duration::from_millis(5),
    Duration::from_millis(10),
    Duration::from_millis(25),
    Duration::from_millis(50),
    Duration::from_millis(100),
    Duration::from_millis(250),
    Duration::from_millis(500),
    Duration::from_secs(1),
    Duration::from_millis(2500),
    Duration::from_secs(5),
    Duration::from_secs(10),
];

/// Bucket bounds for the total test duration histogram.
pub const TEST_DURATION_BUCKETS: &[Duration] = &[
    Duration::from_secs(1),
    Duration::from_secs(5),
    Duration::from_secs(10),
    Duration::from_secs(30),
    Duration::from_secs(60),
    Duration::from_secs(120),
    Duration::from_secs(300),
    Duration::from_secs(600),
    Duration::from_secs(1800),
    Duration::from_secs(3600),
];

/// A gauge holding an `f64`.
#[derive(Debug, Default)]
struct Gauge(AtomicU64);

impl Gauge {
    fn set(&self, v: f64) {
        self.0.store(v.to_bits(), Ordering::Relaxed);
    }

    fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// The observability sink.
#[derive(Debug, Default)]
pub struct Metrics {
    messages_sent: AtomicU64,
    messages_failed: AtomicU64,
    tests_started: AtomicU64,
    tests_succeeded: AtomicU64,
    tests_failed: AtomicU64,
    active_test: Gauge,
    current_rate: Gauge,
    progress_percent: Gauge,
    send_duration: Mutex<LatencyHistogram>,
    test_duration: Mutex<LatencyHistogram>,
}

impl Metrics {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn test_started(&self) {
        self.tests_started.fetch_add(1, Ordering::Relaxed);
        self.active_test.set(1.0);

        #[cfg(feature = "metrics")]
        {
            ::metrics::counter!(TESTS_STARTED).increment(1);
            ::metrics::gauge!(ACTIVE_TEST).set(1.0);
        }
    }

    pub(crate) fn message_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        ::metrics::counter!(MESSAGES_SENT).increment(1);
    }

    pub(crate) fn message_failed(&self) {
        self.messages_failed.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        ::metrics::counter!(MESSAGES_FAILED).increment(1);
    }

    pub(crate) fn observe_send(&self, d: Duration) {
        if let Err(e) = self.send_duration.lock().record(d) {
            tracing::debug!("dropping send duration sample: {e}");
        }

        #[cfg(feature = "metrics")]
        ::metrics::histogram!(SEND_DURATION).record(d.as_secs_f64());
    }

    pub(crate) fn set_progress(&self, rate: f64, progress: f64) {
        self.current_rate.set(rate);
        self.progress_percent.set(progress);

        #[cfg(feature = "metrics")]
        {
            ::metrics::gauge!(CURRENT_RATE).set(rate);
            ::metrics::gauge!(PROGRESS_PERCENT).set(progress);
        }
    }

    pub(crate) fn test_completed(&self, outcome: RunOutcome, duration: Duration) {
        if let Err(e) = self.test_duration.lock().record(duration) {
            tracing::debug!("dropping test duration sample: {e}");
        }
        let label = outcome_label(outcome);
        match label {
            "success" => self.tests_succeeded.fetch_add(1, Ordering::Relaxed),
            _ => self.tests_failed.fetch_add(1, Ordering::Relaxed),
        };

        #[cfg(feature = "metrics")]
        {
            ::metrics::histogram!(TEST_DURATION).record(duration.as_secs_f64());
            ::metrics::counter!(TESTS_COMPLETED, "status" => label).increment(1);
        }
    }

    /// Zeroes the active, rate and progress gauges.
    pub(crate) fn test_ended(&self) {
        self.active_test.set(0.0);
        self.set_progress(0.0, 0.0);

        #[cfg(feature = "metrics")]
        ::metrics::gauge!(ACTIVE_TEST).set(0.0);
    }

    /// Takes a consistent-enough copy of every series for export.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_failed: self.messages_failed.load(Ordering::Relaxed),
            tests_started: self.tests_started.load(Ordering::Relaxed),
            tests_succeeded: self.tests_succeeded.load(Ordering::Relaxed),
            tests_failed: self.tests_failed.load(Ordering::Relaxed),
            active_test: self.active_test.get(),
            current_rate: self.current_rate.get(),
            progress_percent: self.progress_percent.get(),
            send_duration: HistogramSnapshot::new(&self.send_duration.lock(), SEND_DURATION_BUCKETS),
            test_duration: HistogramSnapshot::new(&self.test_duration.lock(), TEST_DURATION_BUCKETS),
        }
    }
}

/// Label value of the completed-tests counter.
fn outcome_label(outcome: RunOutcome) -> &'static str {
    if outcome.is_success() { "success" } else { "failure" }
}

/// Point-in-time copy of the sink. Fields mirror the exported series.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[allow(missing_docs)]
pub struct MetricsSnapshot {
    pub messages_sent: u64,
    pub messages_failed: u64,
    pub tests_started: u64,
    pub tests_succeeded: u64,
    pub tests_failed: u64,
    pub active_test: f64,
    pub current_rate: f64,
    pub progress_percent: f64,
    pub send_duration: HistogramSnapshot,
    pub test_duration: HistogramSnapshot,
}

/// Cumulative bucket counts of a histogram, in seconds.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HistogramSnapshot {
    /// Number of observations.
    pub count: u64,
    /// Sum of all observations, in seconds.
    pub sum: f64,
    /// `(upper bound in seconds, observations <= bound)`.
    pub buckets: Vec<(f64, u64)>,
}

impl HistogramSnapshot {
    fn new(hist: &LatencyHistogram, bounds: &[Duration]) -> Self {
        Self {
            count: hist.len(),
            sum: hist.sum().as_secs_f64(),
            buckets: hist.cumulative_counts(bounds).map(|(b, n)| (b.as_secs_f64(), n)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_counters() {
        let m = Metrics::new();
        m.test_started();
        m.message_sent();
        m.message_sent();
        m.message_failed();

        let s = m.snapshot();
        assert_eq!(s.tests_started, 1);
        assert_eq!(s.messages_sent, 2);
        assert_eq!(s.messages_failed, 1);
        assert_eq!(s.active_test, 1.0);
    }

    #[test]
    fn completion_is_labelled_by_outcome() {
        let m = Metrics::new();
        m.test_completed(RunOutcome::Completed, Duration::from_secs(2));
        m.test_completed(RunOutcome::Stopped, Duration::from_secs(1));
        m.test_completed(RunOutcome::Failed, Duration::from_secs(40));

        let s = m.snapshot();
        assert_eq!(s.tests_succeeded, 2);
        assert_eq!(s.tests_failed, 1);
        assert_eq!(s.test_duration.count, 3);
        // <= 1s, <= 5s, <= 10s, <= 30s, <= 60s
        let counts: Vec<u64> = s.test_duration.buckets.iter().take(5).map(|(_, n)| *n).collect();
        assert_eq!(counts, vec![1, 2, 2, 2, 3]);
    }

    #[test]
    fn test_end_zeroes_gauges() {
        let m = Metrics::new();
        m.test_started();
        m.set_progress(120.5, 42.0);
        assert_eq!(m.snapshot().current_rate, 120.5);

        m.test_ended();
        let s = m.snapshot();
        assert_eq!(s.active_test, 0.0);
        assert_eq!(s.current_rate, 0.0);
        assert_eq!(s.progress_percent, 0.0);
    }

    #[test]
    fn send_durations_land_in_buckets() {
        let m = Metrics::new();
        m.observe_send(Duration::from_micros(500));
        m.observe_send(Duration::from_millis(30));

        let s = m.snapshot();
        assert_eq!(s.send_duration.count, 2);
        assert_eq!(s.send_duration.buckets[0], (0.001, 1));
        assert_eq!(s.send_duration.buckets[4], (0.05, 2));
    }
}
