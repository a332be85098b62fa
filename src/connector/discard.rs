//! A connector that drops every message.
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use async_trait::async_trait;

use super::{Connection, Connector};
use crate::message::Message;

/// Opens [`DiscardConnection`]s. Useful for dry runs without a broker.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiscardConnector;

/// Accepts and drops messages, counting the encoded bytes.
#[derive(Debug, Default)]
pub struct DiscardConnection {
    index: usize,
    bytes: AtomicU64,
}

impl DiscardConnection {
    /// Index of this connection in its pool.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Total encoded bytes accepted so far.
    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Connector for DiscardConnector {
    type Conn = DiscardConnection;

    async fn connect(&self, index: usize) -> Result<DiscardConnection> {
        Ok(DiscardConnection { index, bytes: AtomicU64::new(0) })
    }
}

#[async_trait]
impl Connection for DiscardConnection {
    async fn send(&self, _target: &str, message: &Message) -> Result<()> {
        let encoded = message.to_json()?;
        self.bytes.fetch_add(encoded.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
