//! The broker connection seam.
//!
//! A [`Connector`] opens [`Connection`]s; the [`ConnectionPool`](crate::ConnectionPool)
//! owns them for their whole lifetime. Connections serialize a [`Message`] at
//! the boundary, so the engine never deals with wire formats.
mod discard;
#[cfg(feature = "kafka")]
mod kafka;

use anyhow::Result;
use async_trait::async_trait;

pub use discard::{DiscardConnection, DiscardConnector};
#[cfg(feature = "kafka")]
pub use kafka::{KafkaConnection, KafkaConnector};

use crate::message::Message;

/// Opens broker connections.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// The connection type produced by this connector.
    type Conn: Connection;

    /// Opens the connection with the given pool index.
    async fn connect(&self, index: usize) -> Result<Self::Conn>;
}

/// A single broker connection.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    /// Sends one message to `target` and waits for the broker to acknowledge it.
    async fn send(&self, target: &str, message: &Message) -> Result<()>;

    /// Closes the connection, flushing anything still buffered.
    async fn close(&self) -> Result<()>;
}
