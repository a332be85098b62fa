//! The run result model.
use std::{fmt, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::{config::RunConfig, histogram::LatencyHistogram};

/// Identifier of a single run, e.g. `run-1a2b3c4d`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Allocates a fresh run id.
    pub fn generate() -> Self {
        let id = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("run-{}", &id[..8]))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a run terminated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunOutcome {
    /// Every sequence number was attempted.
    Completed,
    /// A stop request ended the run early.
    Stopped,
    /// The send loop itself failed.
    Failed,
}

impl RunOutcome {
    /// Whether the outcome counts as a successful run.
    ///
    /// A stop is a deliberate termination and therefore successful.
    pub fn is_success(self) -> bool {
        !matches!(self, Self::Failed)
    }
}

/// Send latency summary of one run.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct LatencySummary {
    #[serde(with = "secs")]
    pub min: Duration,
    #[serde(with = "secs")]
    pub mean: Duration,
    /// Median.
    #[serde(with = "secs")]
    pub p50: Duration,
    #[serde(with = "secs")]
    pub p99: Duration,
    #[serde(with = "secs")]
    pub max: Duration,
}

impl LatencySummary {
    /// Summarizes a histogram, or returns `None` if nothing was recorded.
    pub fn from_histogram(hist: &LatencyHistogram) -> Option<Self> {
        if hist.is_empty() {
            return None;
        }
        Some(Self {
            min: hist.min(),
            mean: hist.mean(),
            p50: hist.median(),
            p99: hist.value_at_quantile(0.99),
            max: hist.max(),
        })
    }
}

/// Immutable summary of a terminated run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Id of the run.
    pub run_id: RunId,
    /// False only when the send loop itself failed.
    pub success: bool,
    /// How the run terminated.
    pub outcome: RunOutcome,
    /// Messages acknowledged by the broker.
    pub messages_sent: u64,
    /// Messages whose send returned an error.
    pub messages_failed: u64,
    /// Wall-clock time from admission to termination.
    #[serde(rename = "duration_seconds", with = "secs")]
    pub duration: Duration,
    /// Messages sent per second over the whole run.
    pub average_rate: f64,
    /// When the run was admitted.
    pub started_at: DateTime<Utc>,
    /// When the run terminated.
    pub completed_at: DateTime<Utc>,
    /// Configuration the run executed.
    pub config: RunConfig,
    /// Send latencies, absent when nothing was attempted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<LatencySummary>,
    /// Why the run failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunResult {
    /// Messages attempted, successful or not.
    pub fn attempted(&self) -> u64 {
        self.messages_sent + self.messages_failed
    }
}

/// Durations as fractional seconds.
mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
