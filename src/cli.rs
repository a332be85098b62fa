//! Command-line front-end for a single load test.
//!
//! [`LoadCli`] carries the producer settings, the run configuration and the
//! reporting options. [`run`] connects the pool, drives one run while logging
//! its status at a fixed interval, stops it on `Ctrl+C`, and prints the result.
//!
//! ```shell
//! $ kload --dry-run -n 10000 -r 500 -t orders
//! ```
use std::{
    fs::File,
    io::stdout,
    num::{NonZeroU32, NonZeroU64},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use clap::{
    Parser, ValueEnum,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use tracing::{info, warn};

use crate::{
    config::{ProducerSettings, RunConfig},
    connector::Connector,
    engine::Engine,
    pool::ConnectionPool,
    report::RunResult,
    reporter::{JsonReporter, RunReporter, TextReporter},
};

#[derive(Parser, Clone, Debug)]
#[clap(
    name = "kload",
    version,
    about,
    styles(Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Cyan.on_default())
    )
)]
#[allow(missing_docs)]
pub struct LoadCli {
    /// Number of messages to send
    #[clap(long, short = 'n', default_value = "1000")]
    pub count: NonZeroU64,

    /// Target rate in messages per second
    #[clap(long, short = 'r', default_value = "100")]
    pub rate: NonZeroU32,

    /// Destination topic
    #[clap(long, short = 't', env = "KLOAD_TOPIC", default_value = "load-test")]
    pub topic: String,

    /// Approximate message size in bytes
    #[clap(long, short = 's', default_value_t = 100)]
    pub payload_size: usize,

    /// Optional name recorded in every message
    #[clap(long)]
    pub name: Option<String>,

    #[command(flatten)]
    pub producer: ProducerSettings,

    /// Discard messages instead of sending them to a broker
    #[clap(long)]
    pub dry_run: bool,

    /// Interval between status log lines
    #[clap(long, default_value = "500ms")]
    pub status_interval: humantime::Duration,

    /// Output format for the result
    #[clap(short, long, value_enum, default_value_t = ReportFormat::Text, ignore_case = true)]
    pub output: ReportFormat,

    /// Output file path for the result
    ///
    /// When set, the result will be written to the specified file instead of stdout.
    #[clap(long, short = 'O')]
    pub output_file: Option<PathBuf>,
}

impl LoadCli {
    /// The run configuration described by the flags.
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            message_count: self.count.get(),
            message_rate: self.rate.get(),
            target: self.topic.clone(),
            payload_size: self.payload_size,
            name: self.name.clone(),
        }
    }
}

/// Result output format.
#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum ReportFormat {
    /// Plain text. See [`TextReporter`].
    Text,

    /// JSON. See [`JsonReporter`].
    Json,
}

/// Runs one load test through `connector` and prints its result.
pub async fn run<C: Connector>(cli: &LoadCli, connector: C) -> anyhow::Result<RunResult> {
    let engine = Arc::new(Engine::new(ConnectionPool::new(connector, cli.producer.pool_size)));
    engine.connect().await?;

    let res = drive(&engine, cli).await;
    engine.disconnect().await;
    let result = res?;

    let reporter: &dyn RunReporter = match cli.output {
        ReportFormat::Text => &TextReporter,
        ReportFormat::Json => &JsonReporter,
    };
    match &cli.output_file {
        Some(path) => reporter.print(&mut File::create(path)?, &result)?,
        None => reporter.print(&mut stdout(), &result)?,
    }

    Ok(result)
}

async fn drive<C: Connector>(engine: &Arc<Engine<C>>, cli: &LoadCli) -> anyhow::Result<RunResult> {
    let handle = engine.start(cli.run_config())?;
    info!("load test {} started", handle.id());

    let join = handle.join();
    tokio::pin!(join);
    let period: Duration = cli.status_interval.into();
    let mut ticker = tokio::time::interval(period.max(Duration::from_millis(10)));

    loop {
        tokio::select! {
            biased;
            res = &mut join => return Ok(res?),
            _ = tokio::signal::ctrl_c() => {
                if let Err(e) = engine.request_stop() {
                    warn!("cannot stop: {e}");
                }
            }
            _ = ticker.tick() => {
                let s = engine.status();
                if s.running {
                    info!(
                        "{:>6.2}% sent={} failed={} rate={:.2}/s elapsed={:.1}s",
                        s.progress_percent, s.messages_sent, s.messages_failed, s.current_rate, s.elapsed_seconds
                    );
                }
            }
        }
    }
}
