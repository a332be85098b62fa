//! A load generator for message brokers.
//!
//! kload keeps a pool of producer connections open, drives one load test at a
//! time at a target rate, and exposes live progress while the test runs.
//!
//! ## Overview
//!
//! - [`ConnectionPool`] owns a fixed number of broker connections and hands
//!   them out round-robin.
//! - [`Engine`] runs a test: it builds messages, sends them one after another,
//!   paces them with an open-loop [`RateLimiter`], and keeps the live
//!   [`RunStatus`] and the [`Metrics`] sink up to date.
//! - Every run ends with a [`RunResult`], whether it completed, was stopped, or failed.
//!
//! Brokers plug in through the [`Connector`] and [`Connection`] traits. The
//! crate ships a [`DiscardConnector`](connector::DiscardConnector) for dry runs
//! and, with the `kafka` feature, an rdkafka-backed connector.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use kload::{ConnectionPool, Engine, RunConfig, connector::DiscardConnector};
//! use nonzero_ext::nonzero;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = Arc::new(Engine::new(ConnectionPool::new(DiscardConnector, nonzero!(3usize))));
//!     engine.connect().await?;
//!
//!     let handle = engine.start(RunConfig::new(10_000, 500, "orders"))?;
//!     println!("progress: {:.1}%", engine.status().progress_percent);
//!
//!     let result = handle.join().await?;
//!     println!("{} sent, {} failed", result.messages_sent, result.messages_failed);
//!
//!     engine.disconnect().await;
//!     Ok(())
//! }
//! ```
#![deny(missing_docs)]

mod engine;
mod error;
mod histogram;
mod limiter;
mod pool;
mod report;
mod status;

pub mod cli;
pub mod config;
pub mod connector;
pub mod message;
pub mod metrics;
pub mod reporter;

pub use crate::{
    config::{ProducerSettings, RunConfig},
    connector::{Connection, Connector},
    engine::{Engine, RunHandle},
    error::{ConfigError, EngineError, HistogramError, Result},
    histogram::LatencyHistogram,
    limiter::RateLimiter,
    message::Message,
    metrics::{Metrics, MetricsSnapshot},
    pool::ConnectionPool,
    report::{LatencySummary, RunId, RunOutcome, RunResult},
    status::{RunStatus, StatusStore},
};
