use clap::Parser;
use kload::{cli::LoadCli, connector::DiscardConnector};
use tracing_subscriber::EnvFilter;

cfg_if::cfg_if! {
    if #[cfg(feature = "kafka")] {
        async fn run_broker(cli: &LoadCli) -> anyhow::Result<()> {
            let connector = kload::connector::KafkaConnector::new(cli.producer.clone());
            kload::cli::run(cli, connector).await?;
            Ok(())
        }
    } else {
        async fn run_broker(_: &LoadCli) -> anyhow::Result<()> {
            anyhow::bail!(
                "kload was built without the `kafka` feature; pass --dry-run or rebuild with --features kafka"
            )
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = LoadCli::parse();
    if cli.dry_run {
        kload::cli::run(&cli, DiscardConnector).await?;
        Ok(())
    } else {
        run_broker(&cli).await
    }
}
