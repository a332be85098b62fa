//! A fixed-size pool of broker connections with round-robin dispatch.
use std::{
    num::NonZeroUsize,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use parking_lot::RwLock;
use tracing::{error, info};

use crate::{
    connector::{Connection, Connector},
    error::{EngineError, Result},
};

/// Owns `size` connections opened by a [`Connector`].
///
/// `connect` and `disconnect` are expected to be called at process startup and
/// shutdown, not concurrently with an active run.
pub struct ConnectionPool<C: Connector> {
    connector: C,
    size: NonZeroUsize,
    conns: RwLock<Vec<Arc<C::Conn>>>,
    cursor: AtomicUsize,
    connected: AtomicBool,
}

impl<C: Connector> ConnectionPool<C> {
    /// Creates an unconnected pool.
    pub fn new(connector: C, size: NonZeroUsize) -> Self {
        Self {
            connector,
            size,
            conns: RwLock::new(Vec::new()),
            cursor: AtomicUsize::new(0),
            connected: AtomicBool::new(false),
        }
    }

    /// Configured number of connections.
    pub fn size(&self) -> usize {
        self.size.get()
    }

    /// Opens every connection.
    ///
    /// If any attempt fails, the connections opened so far are closed and the
    /// first failure is returned.
    pub async fn connect(&self) -> Result<()> {
        let size = self.size.get();
        let mut conns = Vec::with_capacity(size);

        for index in 0..size {
            match self.connector.connect(index).await {
                Ok(conn) => {
                    info!("producer {}/{size} connected", index + 1);
                    conns.push(Arc::new(conn));
                }
                Err(source) => {
                    error!("failed to open producer {}/{size}: {source:#}", index + 1);
                    close_all(conns).await;
                    return Err(EngineError::Connection { index, source });
                }
            }
        }

        *self.conns.write() = conns;
        self.cursor.store(0, Ordering::Relaxed);
        self.connected.store(true, Ordering::Release);
        info!("all {size} producers connected");
        Ok(())
    }

    /// Closes every connection, best-effort, and empties the pool.
    pub async fn disconnect(&self) {
        self.connected.store(false, Ordering::Release);
        let conns = std::mem::take(&mut *self.conns.write());
        if !conns.is_empty() {
            info!("disconnecting {} producers", conns.len());
        }
        close_all(conns).await;
    }

    /// Whether `connect` succeeded and `disconnect` has not been called since.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Returns the next connection in round-robin order, or `None` if the pool is empty.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&self) -> Option<Arc<C::Conn>> {
        let conns = self.conns.read();
        if conns.is_empty() {
            return None;
        }
        let i = self.cursor.fetch_add(1, Ordering::Relaxed) % conns.len();
        Some(conns[i].clone())
    }

    /// Restarts round-robin dispatch at the first connection.
    pub(crate) fn rewind(&self) {
        self.cursor.store(0, Ordering::Relaxed);
    }
}

async fn close_all<T: Connection>(conns: Vec<Arc<T>>) {
    for (i, conn) in conns.into_iter().enumerate() {
        if let Err(e) = conn.close().await {
            error!("error closing producer {}: {e:#}", i + 1);
        }
    }
}
