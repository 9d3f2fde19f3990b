use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{error, info};

use crate::reminders::{DispatchReport, ReminderService};

pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// One unit of work driven by [`PollLoop`].
#[async_trait]
pub trait DispatchCycle: Send + Sync {
    async fn tick(&self, now: DateTime<Utc>) -> Result<DispatchReport>;
}

#[async_trait]
impl DispatchCycle for ReminderService {
    async fn tick(&self, now: DateTime<Utc>) -> Result<DispatchReport> {
        Ok(self.dispatch_due(now).await?)
    }
}

/// Drives a [`DispatchCycle`] once or on a fixed interval.
///
/// Cancellation is only observed between cycles, so a batch that has started
/// always runs to completion.
#[derive(Clone)]
pub struct PollLoop {
    cycle: Arc<dyn DispatchCycle>,
    interval: Duration,
}

impl PollLoop {
    /// `interval` is raised to [`MIN_INTERVAL`] so the loop never spins.
    pub fn new(cycle: Arc<dyn DispatchCycle>, interval: Duration) -> Self {
        Self {
            cycle,
            interval: interval.max(MIN_INTERVAL),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn run_once(&self) -> Result<DispatchReport> {
        let report = self.cycle.tick(Utc::now()).await?;
        info!(
            "dispatched {} reminder(s), {} failed, {} skipped",
            report.dispatched.len(),
            report.failed.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Runs cycles until `cancel` flips to `true` or its sender is dropped.
    /// Returns the number of completed cycles.
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) -> u64 {
        info!("poll loop starting (interval={:?})", self.interval);
        let mut cycles = 0_u64;

        loop {
            if *cancel.borrow_and_update() {
                break;
            }

            if let Err(err) = self.run_once().await {
                error!("dispatch cycle failed: {err:#}");
            }
            cycles += 1;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = cancel.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("poll loop stopped after {cycles} cycle(s)");
        cycles
    }

    pub fn spawn(self) -> PollHandle {
        let (cancel, receiver) = watch::channel(false);
        let task = tokio::spawn(async move { self.run(receiver).await });
        PollHandle { cancel, task }
    }
}

pub struct PollHandle {
    cancel: watch::Sender<bool>,
    task: JoinHandle<u64>,
}

impl PollHandle {
    /// Requests a stop; the loop exits after its current cycle.
    pub fn stop(&self) {
        self.cancel.send_replace(true);
    }

    pub async fn join(self) -> Result<u64> {
        Ok(self.task.await?)
    }

    pub async fn shutdown(self) -> Result<u64> {
        self.stop();
        self.join().await
    }
}
