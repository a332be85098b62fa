//! The load-test engine: single-flight runs over a connection pool.
use std::{any::Any, panic::AssertUnwindSafe, sync::Arc};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::RwLock;
use tokio::{runtime::Handle, task::JoinHandle, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    config::RunConfig,
    connector::{Connection, Connector},
    error::{EngineError, Result},
    histogram::LatencyHistogram,
    limiter::RateLimiter,
    message,
    metrics::Metrics,
    pool::ConnectionPool,
    report::{LatencySummary, RunId, RunOutcome, RunResult},
    status::{RunStatus, StatusStore},
};

/// Drives load tests against the connections of a [`ConnectionPool`].
///
/// At most one run is active at a time. Status and stop requests are served
/// concurrently with the run, which executes on its own task when started
/// through [`Engine::start`].
pub struct Engine<C: Connector> {
    pool: ConnectionPool<C>,
    status: StatusStore,
    metrics: Arc<Metrics>,
    last_result: RwLock<Option<RunResult>>,
}

/// A run that has been admitted but not yet executed.
struct Run {
    id: RunId,
    config: RunConfig,
    started_at: DateTime<Utc>,
    stop: CancellationToken,
}

/// Counters accumulated by the send loop.
#[derive(Default)]
struct Tally {
    sent: u64,
    failed: u64,
    latency: LatencyHistogram,
}

/// Handle to a run executing in the background.
#[derive(Debug)]
pub struct RunHandle {
    id: RunId,
    task: JoinHandle<RunResult>,
}

impl RunHandle {
    /// Id of the run.
    pub fn id(&self) -> &RunId {
        &self.id
    }

    /// Waits for the run to terminate.
    pub async fn join(self) -> Result<RunResult> {
        self.task.await.map_err(|e| EngineError::Orchestration(format!("run task failed: {e}")))
    }
}

/// Zeroes the live gauges and then marks the run finished when dropped,
/// whatever the way out of the run.
///
/// Finishing frees the single-flight slot, so it must come last: a run
/// admitted right after would otherwise have its gauges zeroed.
struct EndOfRun<'a> {
    status: &'a StatusStore,
    metrics: &'a Metrics,
}

impl Drop for EndOfRun<'_> {
    fn drop(&mut self) {
        self.metrics.test_ended();
        self.status.finish();
    }
}

impl<C: Connector> Engine<C> {
    /// Creates an engine with its own metrics sink.
    pub fn new(pool: ConnectionPool<C>) -> Self {
        Self::with_metrics(pool, Arc::new(Metrics::new()))
    }

    /// Creates an engine reporting into a shared metrics sink.
    pub fn with_metrics(pool: ConnectionPool<C>, metrics: Arc<Metrics>) -> Self {
        Self { pool, status: StatusStore::new(), metrics, last_result: RwLock::new(None) }
    }

    /// Opens every pooled connection.
    pub async fn connect(&self) -> Result<()> {
        self.pool.connect().await
    }

    /// Closes every pooled connection, best-effort.
    pub async fn disconnect(&self) {
        self.pool.disconnect().await
    }

    /// Whether the pool is connected.
    pub fn is_connected(&self) -> bool {
        self.pool.is_connected()
    }

    /// The connection pool.
    pub fn pool(&self) -> &ConnectionPool<C> {
        &self.pool
    }

    /// The metrics sink.
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Snapshot of the current run status.
    pub fn status(&self) -> RunStatus {
        self.status.snapshot()
    }

    /// Result of the most recent run, if any.
    pub fn last_result(&self) -> Option<RunResult> {
        self.last_result.read().clone()
    }

    /// Asks the active run to stop before its next message.
    pub fn request_stop(&self) -> Result<()> {
        self.status.request_stop()?;
        info!("stop requested");
        Ok(())
    }

    /// Returns to the idle status, dropping the last run's counters and result.
    pub fn reset(&self) -> Result<()> {
        self.status.reset()?;
        *self.last_result.write() = None;
        Ok(())
    }

    /// Starts a run on a background task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self: &Arc<Self>, config: RunConfig) -> Result<RunHandle> {
        let rt = Handle::try_current().map_err(|e| EngineError::Orchestration(e.to_string()))?;
        let run = self.admit(config)?;
        let id = run.id.clone();
        let engine = self.clone();
        let task = rt.spawn(async move { engine.execute(run).await });
        Ok(RunHandle { id, task })
    }

    /// Runs a load test to completion on the current task.
    pub async fn run(&self, config: RunConfig) -> Result<RunResult> {
        let run = self.admit(config)?;
        Ok(self.execute(run).await)
    }

    fn admit(&self, config: RunConfig) -> Result<Run> {
        config.validate()?;
        if !self.pool.is_connected() {
            return Err(EngineError::NotConnected);
        }

        let id = RunId::generate();
        let started_at = Utc::now();
        let stop = self.status.begin(id.clone(), config.clone(), started_at)?;
        self.pool.rewind();
        self.metrics.test_started();

        info!(
            "starting load test {id}: {} messages at {}/s to {}",
            config.message_count, config.message_rate, config.target
        );
        Ok(Run { id, config, started_at, stop })
    }

    async fn execute(&self, run: Run) -> RunResult {
        let _end = EndOfRun { status: &self.status, metrics: &self.metrics };

        let clock = Instant::now();
        let mut tally = Tally::default();
        let res = AssertUnwindSafe(self.drive(&run, clock, &mut tally)).catch_unwind().await;
        let duration = clock.elapsed();

        let (outcome, error) = match res {
            Ok(Ok(outcome)) => (outcome, None),
            Ok(Err(e)) => (RunOutcome::Failed, Some(e.to_string())),
            Err(panic) => (RunOutcome::Failed, Some(format!("send loop panicked: {}", panic_message(&*panic)))),
        };

        let secs = duration.as_secs_f64();
        let average_rate = if secs > 0.0 { tally.sent as f64 / secs } else { 0.0 };

        match &error {
            None => info!(
                "load test {} {outcome}: {} sent, {} failed, {secs:.2}s, {average_rate:.2} msg/s",
                run.id, tally.sent, tally.failed
            ),
            Some(e) => warn!("load test {} failed: {e}", run.id),
        }
        self.metrics.test_completed(outcome, duration);

        let result = RunResult {
            run_id: run.id,
            success: outcome.is_success(),
            outcome,
            messages_sent: tally.sent,
            messages_failed: tally.failed,
            duration,
            average_rate,
            started_at: run.started_at,
            completed_at: Utc::now(),
            config: run.config,
            latency: LatencySummary::from_histogram(&tally.latency),
            error,
        };
        *self.last_result.write() = Some(result.clone());
        result
    }

    async fn drive(&self, run: &Run, clock: Instant, tally: &mut Tally) -> Result<RunOutcome> {
        let cfg = &run.config;
        let limiter = RateLimiter::from(cfg.message_rate);

        for seq in 1..=cfg.message_count {
            if run.stop.is_cancelled() {
                info!("stop requested, terminating load test {}", run.id);
                return Ok(RunOutcome::Stopped);
            }

            let message = message::generate(seq, cfg.payload_size, &run.id, cfg.name.as_deref());
            let conn = self
                .pool
                .next()
                .ok_or_else(|| EngineError::Orchestration("connection pool is empty".into()))?;

            let t = Instant::now();
            let res = conn.send(&cfg.target, &message).await;
            let latency = t.elapsed();

            self.metrics.observe_send(latency);
            if let Err(e) = tally.latency.record(latency) {
                warn!("dropping latency sample: {e}");
            }
            match res {
                Ok(()) => {
                    tally.sent += 1;
                    self.metrics.message_sent();
                }
                Err(e) => {
                    warn!("failed to send message {seq}: {e:#}");
                    tally.failed += 1;
                    self.metrics.message_failed();
                }
            }

            let elapsed = clock.elapsed().as_secs_f64();
            let progress = seq as f64 / cfg.message_count as f64 * 100.0;
            let rate = if elapsed > 0.0 { tally.sent as f64 / elapsed } else { 0.0 };
            self.status.update(|s| {
                s.messages_sent = tally.sent;
                s.messages_failed = tally.failed;
                s.elapsed_seconds = elapsed;
                s.progress_percent = progress;
                s.current_rate = rate;
            });
            self.metrics.set_progress(rate, progress);

            if seq < cfg.message_count {
                limiter.wait(&run.stop).await;
            }
        }

        Ok(RunOutcome::Completed)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}
