//! Live run status and its synchronized store.
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{
    config::RunConfig,
    error::{EngineError, Result},
    report::RunId,
};

/// Snapshot of the current (or most recent) run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStatus {
    /// Whether a run is active.
    pub running: bool,
    /// Id of the current or last run.
    pub run_id: Option<RunId>,
    /// Messages acknowledged so far.
    pub messages_sent: u64,
    /// Messages whose send failed so far.
    pub messages_failed: u64,
    /// Messages sent per second since the run started.
    pub current_rate: f64,
    /// Seconds since the run started, as of the last message.
    pub elapsed_seconds: f64,
    /// Share of `message_count` attempted so far, 0 to 100.
    pub progress_percent: f64,
    /// When the run was admitted.
    pub started_at: Option<DateTime<Utc>>,
    /// Configuration of the run.
    pub config: Option<RunConfig>,
}

impl RunStatus {
    /// The status reported before any run has started.
    pub fn idle() -> Self {
        Self::default()
    }

    /// Messages attempted so far.
    pub fn attempted(&self) -> u64 {
        self.messages_sent + self.messages_failed
    }
}

#[derive(Debug, Default)]
struct Slot {
    status: RunStatus,
    stop: CancellationToken,
}

/// Holds the single live [`RunStatus`].
///
/// The engine's run task is the only writer. Any number of readers may take
/// snapshots concurrently; a snapshot is always a whole, consistent copy.
#[derive(Debug, Default)]
pub struct StatusStore {
    slot: RwLock<Slot>,
}

impl StatusStore {
    /// Creates a store reporting [`RunStatus::idle`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the current status.
    pub fn snapshot(&self) -> RunStatus {
        self.slot.read().status.clone()
    }

    /// Whether a run is active.
    pub fn is_running(&self) -> bool {
        self.slot.read().status.running
    }

    /// Marks a new run as running, unless one already is.
    ///
    /// The check and the initialization happen under one write lock, so two
    /// concurrent callers can never both succeed. Returns the fresh stop token
    /// of the new run.
    pub(crate) fn begin(
        &self,
        run_id: RunId,
        config: RunConfig,
        started_at: DateTime<Utc>,
    ) -> Result<CancellationToken> {
        let mut slot = self.slot.write();
        if slot.status.running {
            return Err(EngineError::AlreadyRunning);
        }
        slot.status = RunStatus {
            running: true,
            run_id: Some(run_id),
            started_at: Some(started_at),
            config: Some(config),
            ..RunStatus::default()
        };
        slot.stop = CancellationToken::new();
        Ok(slot.stop.clone())
    }

    /// Applies `f` to the live status.
    pub(crate) fn update(&self, f: impl FnOnce(&mut RunStatus)) {
        f(&mut self.slot.write().status);
    }

    /// Marks the run as no longer running, keeping its counters.
    pub(crate) fn finish(&self) {
        self.slot.write().status.running = false;
    }

    /// Signals the active run to stop at its next message boundary.
    pub(crate) fn request_stop(&self) -> Result<()> {
        let slot = self.slot.read();
        if !slot.status.running {
            return Err(EngineError::NotRunning);
        }
        slot.stop.cancel();
        Ok(())
    }

    /// Replaces a finished run's status with [`RunStatus::idle`].
    pub(crate) fn reset(&self) -> Result<()> {
        let mut slot = self.slot.write();
        if slot.status.running {
            return Err(EngineError::AlreadyRunning);
        }
        slot.status = RunStatus::idle();
        Ok(())
    }
}
