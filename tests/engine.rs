use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use anyhow::bail;
use async_trait::async_trait;
use kload::{
    Connection, ConnectionPool, Connector, Engine, EngineError, Message, RunConfig, RunOutcome, RunStatus,
    connector::DiscardConnector,
};
use nonzero_ext::nonzero;

/// Sends take `delay`; the connection with index `broken` rejects everything.
#[derive(Clone)]
struct Flaky {
    delay: Duration,
    broken: Option<usize>,
    sends: Arc<AtomicU64>,
}

struct FlakyConn {
    index: usize,
    shared: Flaky,
}

#[async_trait]
impl Connector for Flaky {
    type Conn = FlakyConn;

    async fn connect(&self, index: usize) -> anyhow::Result<FlakyConn> {
        Ok(FlakyConn { index, shared: self.clone() })
    }
}

#[async_trait]
impl Connection for FlakyConn {
    async fn send(&self, _: &str, _: &Message) -> anyhow::Result<()> {
        tokio::time::sleep(self.shared.delay).await;
        self.shared.sends.fetch_add(1, Ordering::SeqCst);
        if self.shared.broken == Some(self.index) {
            bail!("connection {} is broken", self.index);
        }
        Ok(())
    }

    async fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

async fn discard_engine() -> Arc<Engine<DiscardConnector>> {
    let engine = Arc::new(Engine::new(ConnectionPool::new(DiscardConnector, nonzero!(3usize))));
    engine.connect().await.unwrap();
    engine
}

#[tokio::test]
async fn natural_completion_reaches_full_progress() {
    let engine = discard_engine().await;
    assert!(engine.is_connected());
    assert_eq!(engine.status(), RunStatus::idle());

    let cfg = RunConfig::new(10, 1000, "t1").with_payload_size(50);
    let result = engine.start(cfg).unwrap().join().await.unwrap();

    assert!(result.success);
    assert_eq!(result.messages_sent, 10);
    assert_eq!(result.messages_failed, 0);
    assert!(result.completed_at >= result.started_at);

    let status = engine.status();
    assert!(!status.running);
    assert_eq!(status.attempted(), 10);
    assert_eq!(status.progress_percent, 100.0);

    engine.disconnect().await;
    assert!(!engine.is_connected());
    assert!(matches!(engine.start(RunConfig::default()), Err(EngineError::NotConnected)));
}

#[tokio::test]
async fn immediate_stop_is_a_successful_early_end() {
    let engine = discard_engine().await;

    let handle = engine.start(RunConfig::new(10_000, 100, "t1")).unwrap();
    engine.request_stop().unwrap();
    let result = handle.join().await.unwrap();

    assert!(result.success);
    assert_eq!(result.outcome, RunOutcome::Stopped);
    assert!(result.messages_sent < 10_000);
    assert!(!engine.status().running);
    assert!(matches!(engine.request_stop(), Err(EngineError::NotRunning)));
}

#[tokio::test]
async fn back_to_back_start_is_rejected() {
    let engine = discard_engine().await;

    let first = engine.start(RunConfig::new(100, 100, "t1")).unwrap();
    for rate in [1, 50, 100_000] {
        let err = engine.start(RunConfig::new(1, rate, "t2")).unwrap_err();
        assert!(matches!(err, EngineError::AlreadyRunning));
    }

    engine.request_stop().unwrap();
    first.join().await.unwrap();
}

#[tokio::test]
async fn failing_connection_only_counts_failures() {
    let sends = Arc::new(AtomicU64::new(0));
    let connector = Flaky { delay: Duration::ZERO, broken: Some(1), sends: sends.clone() };
    let engine = Arc::new(Engine::new(ConnectionPool::new(connector, nonzero!(3usize))));
    engine.connect().await.unwrap();

    let result = engine.run(RunConfig::new(9, 10_000, "t1")).await.unwrap();

    assert!(result.success);
    assert_eq!(result.outcome, RunOutcome::Completed);
    assert_eq!(result.messages_failed, 3);
    assert_eq!(result.messages_sent, 6);
    assert_eq!(sends.load(Ordering::SeqCst), 9);
    assert!(result.error.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn observers_read_consistent_snapshots() {
    let connector = Flaky { delay: Duration::from_millis(1), broken: None, sends: Arc::default() };
    let engine = Arc::new(Engine::new(ConnectionPool::new(connector, nonzero!(2usize))));
    engine.connect().await.unwrap();

    let handle = engine.start(RunConfig::new(200, 2000, "t1")).unwrap();
    let run_id = handle.id().clone();

    let observers: Vec<_> = (0..4)
        .map(|_| {
            let engine = engine.clone();
            let run_id = run_id.clone();
            tokio::spawn(async move {
                let mut last = 0.0;
                loop {
                    let s = engine.status();
                    assert_eq!(s.run_id.as_ref(), Some(&run_id));
                    assert!(s.attempted() <= 200);
                    assert!(s.progress_percent >= last);
                    assert_eq!(s.progress_percent, s.attempted() as f64 / 200.0 * 100.0);
                    last = s.progress_percent;
                    if !s.running {
                        break;
                    }
                    tokio::time::sleep(Duration::from_millis(2)).await;
                }
            })
        })
        .collect();

    let result = handle.join().await.unwrap();
    for o in observers {
        o.await.unwrap();
    }
    assert_eq!(result.attempted(), 200);
}

#[tokio::test]
async fn metrics_are_shared_across_engines() {
    let metrics = Arc::new(kload::Metrics::new());
    let a = Engine::with_metrics(ConnectionPool::new(DiscardConnector, nonzero!(1usize)), metrics.clone());
    let b = Engine::with_metrics(ConnectionPool::new(DiscardConnector, nonzero!(1usize)), metrics.clone());
    a.connect().await.unwrap();
    b.connect().await.unwrap();

    a.run(RunConfig::new(4, 10_000, "t1")).await.unwrap();
    b.run(RunConfig::new(6, 10_000, "t1")).await.unwrap();

    let s = metrics.snapshot();
    assert_eq!(s.tests_started, 2);
    assert_eq!(s.tests_succeeded, 2);
    assert_eq!(s.messages_sent, 10);
    assert_eq!(s.send_duration.count, 10);
    assert_eq!(s.active_test, 0.0);
}
