use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use signalos_platform::{
    PgCommitmentStore, PgReminderStore, ServiceConfig, connect_database, notifier_from_config,
};
use signalos_services::{PollLoop, ReminderService};
use tracing::info;

/// Dispatches due reminders once or on a fixed interval.
#[derive(Parser)]
#[command(name = "signalos-worker")]
#[command(version)]
struct Cli {
    /// Run a single dispatch batch and exit
    #[arg(long)]
    once: bool,

    /// Seconds between batches, overriding WORKER_INTERVAL
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    interval: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "signalos_worker=info,signalos_services=info".to_string()),
        )
        .init();

    let config = ServiceConfig::worker_from_env()?;
    let pool = connect_database(&config.database_url).await?;
    let commitments = Arc::new(PgCommitmentStore::new(pool.clone()));
    let reminders = Arc::new(PgReminderStore::new(pool));
    let notifier = notifier_from_config(&config)?;

    let service = ReminderService::new(commitments, reminders, notifier, config.reminders.clone());
    let interval = cli
        .interval
        .map(Duration::from_secs)
        .unwrap_or(config.worker_interval);
    let poll = PollLoop::new(Arc::new(service), interval);

    if cli.once {
        let report = poll.run_once().await?;
        info!(
            "single run finished: {} dispatched, {} failed",
            report.dispatched.len(),
            report.failed.len()
        );
        return Ok(());
    }

    info!("reminder worker polling every {:?}", poll.interval());
    let handle = poll.spawn();
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown requested; finishing current batch");
    let cycles = handle.shutdown().await?;
    info!("reminder worker exited after {cycles} cycle(s)");

    Ok(())
}
