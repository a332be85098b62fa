//! A simple wrapper around [`hdrhistogram::Histogram`] for latency measurements.
use std::time::Duration;

use hdrhistogram::Histogram;

use crate::error::HistogramError;

/// Latency histogram with nanosecond resolution and 3 significant digits.
#[derive(Clone, Debug)]
pub struct LatencyHistogram {
    hist: Histogram<u64>,
}

impl LatencyHistogram {
    /// Creates a new latency histogram.
    pub fn new() -> LatencyHistogram {
        // 3 significant digits is always a valid precision
        Self { hist: Histogram::<u64>::new(3).expect("create histogram") }
    }

    /// Records a latency value.
    pub fn record(&mut self, d: Duration) -> Result<(), HistogramError> {
        let nanos = u64::try_from(d.as_nanos()).map_err(|_| HistogramError::LatencyTooLarge { latency: d })?;
        self.hist.record(nanos)?;
        Ok(())
    }

    /// Returns true if this histogram has no recorded values.
    pub fn is_empty(&self) -> bool {
        self.hist.is_empty()
    }

    /// Number of recorded values.
    pub fn len(&self) -> u64 {
        self.hist.len()
    }

    /// Get the highest recorded latency in the histogram.
    pub fn max(&self) -> Duration {
        Duration::from_nanos(self.hist.max())
    }

    /// Get the lowest recorded latency in the histogram.
    pub fn min(&self) -> Duration {
        Duration::from_nanos(self.hist.min())
    }

    /// Get the computed mean value of all recorded latencies in the histogram.
    pub fn mean(&self) -> Duration {
        Duration::from_nanos(self.hist.mean() as u64)
    }

    /// Get the computed median value of all recorded latencies in the histogram.
    pub fn median(&self) -> Duration {
        self.value_at_quantile(0.5)
    }

    /// Get the latency at a given quantile.
    pub fn value_at_quantile(&self, q: f64) -> Duration {
        Duration::from_nanos(self.hist.value_at_quantile(q))
    }

    /// Sum of all recorded latencies, at histogram precision.
    pub fn sum(&self) -> Duration {
        Duration::from_secs_f64(self.hist.mean() * self.hist.len() as f64 / 1e9)
    }

    /// Counts of recorded values at or below each bound.
    pub fn cumulative_counts<'a>(&'a self, bounds: &'a [Duration]) -> impl Iterator<Item = (Duration, u64)> + 'a {
        bounds.iter().map(|&b| {
            let nanos = u64::try_from(b.as_nanos()).unwrap_or(u64::MAX);
            (b, self.hist.count_between(0, nanos))
        })
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_summarizes() {
        let mut hist = LatencyHistogram::new();
        for ms in [1, 2, 3, 4, 100] {
            hist.record(Duration::from_millis(ms)).unwrap();
        }

        assert_eq!(hist.len(), 5);
        assert!(hist.min() >= Duration::from_micros(999));
        assert!(hist.max() >= Duration::from_millis(99));
        assert!(hist.median() >= Duration::from_millis(2) && hist.median() <= Duration::from_millis(4));
    }

    #[test]
    fn cumulative_counts_follow_bounds() {
        let mut hist = LatencyHistogram::new();
        hist.record(Duration::from_millis(2)).unwrap();
        hist.record(Duration::from_millis(20)).unwrap();
        hist.record(Duration::from_secs(2)).unwrap();

        let bounds = [Duration::from_millis(5), Duration::from_millis(50), Duration::from_secs(5)];
        let counts: Vec<u64> = hist.cumulative_counts(&bounds).map(|(_, n)| n).collect();
        assert_eq!(counts, vec![1, 2, 3]);
    }
}
