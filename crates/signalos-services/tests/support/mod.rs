#![allow(dead_code)]

use std::{collections::HashSet, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use signalos_core::Notifier;
use signalos_services::{CommitmentService, ReminderService, ReminderSettings};
use signalos_store::{InMemoryCommitmentStore, InMemoryReminderStore};
use tokio::sync::Mutex;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 8, 30, 0).unwrap()
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub target: String,
    pub message: String,
    pub channel: String,
}

/// Records every send and fails for messages listed in `failing`.
#[derive(Default)]
pub struct ScriptedNotifier {
    pub sent: Mutex<Vec<SentMessage>>,
    failing: Mutex<HashSet<String>>,
    delay: Option<Duration>,
}

impl ScriptedNotifier {
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub async fn fail_on(&self, message: &str) {
        self.failing.lock().await.insert(message.to_string());
    }

    pub async fn recover(&self, message: &str) {
        self.failing.lock().await.remove(message);
    }

    pub async fn sent_messages(&self) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .map(|sent| sent.message.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for ScriptedNotifier {
    async fn send(&self, target: &str, message: &str, channel: &str) -> anyhow::Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().await.contains(message) {
            anyhow::bail!("gateway rejected {message:?}");
        }
        self.sent.lock().await.push(SentMessage {
            target: target.to_string(),
            message: message.to_string(),
            channel: channel.to_string(),
        });
        Ok(())
    }
}

pub struct Harness {
    pub commitments: CommitmentService,
    pub reminders: ReminderService,
    pub notifier: Arc<ScriptedNotifier>,
}

pub fn harness() -> Harness {
    harness_with(ScriptedNotifier::default(), ReminderSettings::default())
}

pub fn harness_with(notifier: ScriptedNotifier, settings: ReminderSettings) -> Harness {
    let commitment_store = Arc::new(InMemoryCommitmentStore::default());
    let reminder_store = Arc::new(InMemoryReminderStore::default());
    let notifier = Arc::new(notifier);

    Harness {
        commitments: CommitmentService::new(commitment_store.clone()),
        reminders: ReminderService::new(
            commitment_store,
            reminder_store,
            notifier.clone(),
            settings,
        ),
        notifier,
    }
}
