//! Error types surfaced by the load-test engine.
use std::time::Duration;

use thiserror::Error;

/// Errors returned synchronously by [`Engine`](crate::Engine) operations.
///
/// Per-message send failures never appear here: they are counted in the run
/// status and the metrics sink, and the run carries on.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The connection pool is not connected.
    #[error("not connected to the broker")]
    NotConnected,

    /// Another run is already active.
    #[error("a load test is already running")]
    AlreadyRunning,

    /// A stop was requested but no run is active.
    #[error("no load test is running")]
    NotRunning,

    /// Establishing one of the pooled connections failed.
    #[error("failed to open connection {index}: {source:#}")]
    Connection {
        /// Zero-based index of the connection that failed.
        index: usize,
        /// The underlying connector error.
        #[source]
        source: anyhow::Error,
    },

    /// The run configuration is out of bounds.
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),

    /// The send loop itself failed (not a per-message send failure).
    #[error("load test aborted: {0}")]
    Orchestration(String),
}

/// Violations of the run configuration bounds.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ConfigError {
    /// `message_count` is zero or above the maximum.
    #[error("message_count must be within 1..={max}, got {got}")]
    MessageCount { got: u64, max: u64 },

    /// `message_rate` is zero or above the maximum.
    #[error("message_rate must be within 1..={max}, got {got}")]
    MessageRate { got: u32, max: u32 },

    /// `target` is empty or too long, counted in characters.
    #[error("target must be 1..={max} characters, got {got}")]
    Target { got: usize, max: usize },

    /// `payload_size` is zero or above the maximum.
    #[error("payload_size must be within 1..={max} bytes, got {got}")]
    PayloadSize { got: usize, max: usize },
}

/// Errors raised while recording into a latency histogram.
#[derive(Error, Debug)]
pub enum HistogramError {
    /// The latency does not fit the histogram's `u64` nanosecond range.
    #[error("latency {latency:?} is too large to record")]
    LatencyTooLarge {
        /// The rejected sample.
        latency: Duration,
    },

    /// The histogram refused the sample.
    #[error("failed to record latency: {0}")]
    Record(#[from] hdrhistogram::RecordError),
}

/// Result alias for engine operations.
pub type Result<T, E = EngineError> = std::result::Result<T, E>;
