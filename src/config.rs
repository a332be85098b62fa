//! Run and producer configuration.
use std::{num::NonZeroUsize, time::Duration};

use clap::Args;
use nonzero_ext::nonzero;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Upper bound on `message_count`.
pub const MAX_MESSAGE_COUNT: u64 = 10_000_000;
/// Upper bound on `message_rate`, in messages per second.
pub const MAX_MESSAGE_RATE: u32 = 100_000;
/// Upper bound on the length of `target`, in characters.
pub const MAX_TARGET_LEN: usize = 255;
/// Upper bound on `payload_size`, in bytes.
pub const MAX_PAYLOAD_SIZE: usize = 1_048_576;

/// Immutable inputs for one load test run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Number of messages to send.
    pub message_count: u64,
    /// Target throughput in messages per second.
    pub message_rate: u32,
    /// Destination identifier (topic).
    pub target: String,
    /// Approximate size of each message in bytes.
    pub payload_size: usize,
    /// Optional human-readable run name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            message_count: 1000,
            message_rate: 100,
            target: "load-test".into(),
            payload_size: 100,
            name: None,
        }
    }
}

impl RunConfig {
    /// Creates a configuration with the given count, rate and target, and defaults elsewhere.
    pub fn new(message_count: u64, message_rate: u32, target: impl Into<String>) -> Self {
        Self { message_count, message_rate, target: target.into(), ..Self::default() }
    }

    /// Sets the payload size.
    pub fn with_payload_size(mut self, payload_size: usize) -> Self {
        self.payload_size = payload_size;
        self
    }

    /// Sets the run name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Checks every field against its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_MESSAGE_COUNT).contains(&self.message_count) {
            return Err(ConfigError::MessageCount { got: self.message_count, max: MAX_MESSAGE_COUNT });
        }
        if !(1..=MAX_MESSAGE_RATE).contains(&self.message_rate) {
            return Err(ConfigError::MessageRate { got: self.message_rate, max: MAX_MESSAGE_RATE });
        }
        let len = self.target.chars().count();
        if !(1..=MAX_TARGET_LEN).contains(&len) {
            return Err(ConfigError::Target { got: len, max: MAX_TARGET_LEN });
        }
        if !(1..=MAX_PAYLOAD_SIZE).contains(&self.payload_size) {
            return Err(ConfigError::PayloadSize { got: self.payload_size, max: MAX_PAYLOAD_SIZE });
        }
        Ok(())
    }
}

/// Broker producer settings shared by every pooled connection.
#[derive(Args, Clone, Debug)]
pub struct ProducerSettings {
    /// Broker bootstrap servers
    #[clap(long, env = "KLOAD_BOOTSTRAP_SERVERS", default_value = "localhost:9092")]
    pub bootstrap_servers: String,

    /// Compression codec for produced batches
    #[clap(long, env = "KLOAD_COMPRESSION", default_value = "gzip")]
    pub compression: String,

    /// Acknowledgements required from the broker (0, 1 or all)
    #[clap(long, env = "KLOAD_ACKS", default_value = "1")]
    pub acks: String,

    /// Delay in milliseconds to wait for batching
    #[clap(long, env = "KLOAD_LINGER_MS", default_value_t = 10)]
    pub linger_ms: u64,

    /// Maximum batch size in bytes
    #[clap(long, env = "KLOAD_BATCH_SIZE", default_value_t = 16384)]
    pub batch_size: usize,

    /// Maximum request size in bytes
    #[clap(long, env = "KLOAD_MAX_REQUEST_SIZE", default_value_t = 1_048_576)]
    pub max_request_size: usize,

    /// Number of producer connections in the pool
    #[clap(long, short = 'p', env = "KLOAD_POOL_SIZE", default_value = "5")]
    pub pool_size: NonZeroUsize,

    /// Delivery timeout for a single message
    ///
    /// Examples: 5s, 500ms
    #[clap(long, env = "KLOAD_DELIVERY_TIMEOUT", default_value = "30s")]
    pub delivery_timeout: humantime::Duration,
}

impl ProducerSettings {
    /// Returns the delivery timeout as a std duration.
    pub fn delivery_timeout(&self) -> Duration {
        self.delivery_timeout.into()
    }
}

impl Default for ProducerSettings {
    fn default() -> Self {
        Self {
            bootstrap_servers: "localhost:9092".into(),
            compression: "gzip".into(),
            acks: "1".into(),
            linger_ms: 10,
            batch_size: 16384,
            max_request_size: 1_048_576,
            pool_size: nonzero!(5usize),
            delivery_timeout: Duration::from_secs(30).into(),
        }
    }
}
