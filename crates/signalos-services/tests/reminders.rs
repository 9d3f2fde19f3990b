mod support;

use std::{sync::Arc, time::Duration as StdDuration};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use signalos_core::{
    CommitmentStatus, NewCommitment, NewReminder, Reminder, ReminderStore, SignalError,
};
use signalos_services::{CommitmentService, ReminderService, ReminderSettings};
use signalos_store::{InMemoryCommitmentStore, InMemoryReminderStore};
use tokio::sync::Mutex;
use uuid::Uuid;

use support::{Harness, ScriptedNotifier, harness, harness_with, t0};

async fn open(h: &Harness, title: &str) -> Uuid {
    h.commitments
        .open(NewCommitment::titled(title), t0() - Duration::days(1))
        .await
        .unwrap()
        .commitment
        .id
}

async fn remind(h: &Harness, commitment_id: Uuid, at: DateTime<Utc>, message: &str) -> Reminder {
    h.reminders
        .create(NewReminder {
            commitment_id,
            remind_at: at,
            message: Some(message.to_string()),
            delivery_target: Some("+15551234567".to_string()),
            delivery_channel: None,
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn create_requires_existing_commitment() {
    let h = harness();
    let err = h
        .reminders
        .create(NewReminder {
            commitment_id: Uuid::new_v4(),
            remind_at: t0(),
            message: None,
            delivery_target: None,
            delivery_channel: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, SignalError::NotFound(_)));
}

#[tokio::test]
async fn create_defaults_channel_from_settings() {
    let settings = ReminderSettings {
        default_channel: "sms".to_string(),
        ..ReminderSettings::default()
    };
    let h = harness_with(ScriptedNotifier::default(), settings);
    let commitment_id = open(&h, "Remind me about this").await;

    let reminder = remind(&h, commitment_id, t0(), "Don't forget!").await;
    assert_eq!(reminder.delivery_channel, "sms");
    assert_eq!(reminder.sent_at, None);
}

#[tokio::test]
async fn past_reminders_are_due_and_future_ones_are_not() {
    let h = harness();
    let commitment_id = open(&h, "Backfill").await;
    let past = remind(&h, commitment_id, t0() - Duration::minutes(5), "past").await;
    remind(&h, commitment_id, t0() + Duration::hours(24), "future").await;

    let due = h.reminders.list_due(t0()).await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, past.id);
}

#[tokio::test]
async fn list_due_orders_earliest_first() {
    let h = harness();
    let commitment_id = open(&h, "Ordering").await;
    let second = remind(&h, commitment_id, t0() - Duration::minutes(1), "second").await;
    let first = remind(&h, commitment_id, t0() - Duration::minutes(10), "first").await;

    let due = h.reminders.list_due(t0()).await.unwrap();
    let ids: Vec<Uuid> = due.iter().map(|reminder| reminder.id).collect();
    assert_eq!(ids, vec![first.id, second.id]);
}

#[tokio::test]
async fn dispatched_reminders_never_become_due_again() {
    let h = harness();
    let commitment_id = open(&h, "Dispatch test").await;
    let reminder = remind(&h, commitment_id, t0() - Duration::minutes(1), "ping").await;

    let report = h.reminders.dispatch_due(t0()).await.unwrap();
    assert_eq!(report.dispatched.len(), 1);
    assert_eq!(report.dispatched[0].id, reminder.id);
    assert_eq!(report.dispatched[0].sent_at, Some(t0()));

    for later in [t0(), t0() + Duration::minutes(1), t0() + Duration::days(365)] {
        let due = h.reminders.list_due(later).await.unwrap();
        assert!(due.iter().all(|reminder| reminder.sent_at.is_none()));
        assert!(due.is_empty());
    }

    let again = h.reminders.dispatch_due(t0() + Duration::days(1)).await.unwrap();
    assert!(again.is_empty());
    assert_eq!(h.notifier.sent_messages().await, vec!["ping".to_string()]);
}

#[tokio::test]
async fn failed_delivery_stays_pending_without_aborting_batch() {
    let h = harness();
    let commitment_id = open(&h, "Batch").await;
    let one = remind(&h, commitment_id, t0() - Duration::minutes(3), "one").await;
    let two = remind(&h, commitment_id, t0() - Duration::minutes(2), "two").await;
    let three = remind(&h, commitment_id, t0() - Duration::minutes(1), "three").await;
    h.notifier.fail_on("two").await;

    let report = h.reminders.dispatch_due(t0()).await.unwrap();
    let dispatched: Vec<Uuid> = report.dispatched.iter().map(|reminder| reminder.id).collect();
    assert_eq!(dispatched, vec![one.id, three.id]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].reminder_id, two.id);

    let stored = h.reminders.list_for_commitment(commitment_id).await.unwrap();
    let sent: Vec<bool> = stored.iter().map(|reminder| reminder.sent_at.is_some()).collect();
    assert_eq!(sent, vec![true, false, true]);

    let due = h.reminders.list_due(t0()).await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, two.id);

    h.notifier.recover("two").await;
    let retry = h.reminders.dispatch_due(t0() + Duration::minutes(1)).await.unwrap();
    assert_eq!(retry.dispatched.len(), 1);
    assert_eq!(retry.dispatched[0].id, two.id);
    assert!(h.reminders.list_due(t0() + Duration::minutes(1)).await.unwrap().is_empty());
}

#[tokio::test]
async fn fallback_message_and_target_come_from_commitment_and_settings() {
    let h = harness();
    let commitment_id = open(&h, "Ping Bob").await;
    h.reminders
        .create(NewReminder {
            commitment_id,
            remind_at: t0(),
            message: None,
            delivery_target: None,
            delivery_channel: Some("slack".to_string()),
        })
        .await
        .unwrap();

    h.reminders.dispatch_due(t0()).await.unwrap();

    let sent = h.notifier.sent.lock().await.clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].message, "Reminder: Ping Bob");
    assert_eq!(sent[0].target, "default");
    assert_eq!(sent[0].channel, "slack");
}

#[tokio::test(start_paused = true)]
async fn hanging_notifier_is_bounded_by_send_timeout() {
    let settings = ReminderSettings {
        send_timeout: StdDuration::from_secs(2),
        ..ReminderSettings::default()
    };
    let h = harness_with(ScriptedNotifier::slow(StdDuration::from_secs(60)), settings);
    let commitment_id = open(&h, "Slow channel").await;
    let reminder = remind(&h, commitment_id, t0(), "late").await;

    let report = h.reminders.dispatch_due(t0()).await.unwrap();
    assert!(report.dispatched.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].reminder_id, reminder.id);
    assert!(report.failed[0].reason.contains("timed out"));
    assert_eq!(h.reminders.list_due(t0()).await.unwrap().len(), 1);
}

/// Simulates a second dispatcher that marks every due reminder right after
/// this one has listed it.
struct RacingReminderStore {
    inner: InMemoryReminderStore,
}

#[async_trait]
impl ReminderStore for RacingReminderStore {
    async fn create(&self, reminder: Reminder) -> anyhow::Result<Reminder> {
        self.inner.create(reminder).await
    }

    async fn list_due(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<Reminder>> {
        let due = self.inner.list_due(now).await?;
        for reminder in &due {
            self.inner.mark_sent(reminder.id, now).await?;
        }
        Ok(due)
    }

    async fn list_for_commitment(&self, commitment_id: Uuid) -> anyhow::Result<Vec<Reminder>> {
        self.inner.list_for_commitment(commitment_id).await
    }

    async fn mark_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> anyhow::Result<bool> {
        self.inner.mark_sent(id, sent_at).await
    }
}

#[tokio::test]
async fn concurrently_sent_reminder_is_skipped() {
    let commitment_store = Arc::new(InMemoryCommitmentStore::default());
    let reminder_store = Arc::new(RacingReminderStore {
        inner: InMemoryReminderStore::default(),
    });
    let commitments = CommitmentService::new(commitment_store.clone());
    let reminders = ReminderService::new(
        commitment_store,
        reminder_store,
        Arc::new(ScriptedNotifier::default()),
        ReminderSettings::default(),
    );

    let commitment = commitments
        .open(NewCommitment::titled("Race"), t0())
        .await
        .unwrap();
    let reminder = reminders
        .create(NewReminder {
            commitment_id: commitment.commitment.id,
            remind_at: t0(),
            message: None,
            delivery_target: None,
            delivery_channel: None,
        })
        .await
        .unwrap();

    let report = reminders.dispatch_due(t0()).await.unwrap();
    assert!(report.dispatched.is_empty());
    assert!(report.failed.is_empty());
    assert_eq!(report.skipped, vec![reminder.id]);
    assert!(reminders.list_due(t0()).await.unwrap().is_empty());
}

/// Fails `mark_sent` for one chosen reminder, as a dropped connection would.
struct FlakyReminderStore {
    inner: Arc<InMemoryReminderStore>,
    failing: Mutex<Option<Uuid>>,
}

#[async_trait]
impl ReminderStore for FlakyReminderStore {
    async fn create(&self, reminder: Reminder) -> anyhow::Result<Reminder> {
        self.inner.create(reminder).await
    }

    async fn list_due(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<Reminder>> {
        self.inner.list_due(now).await
    }

    async fn list_for_commitment(&self, commitment_id: Uuid) -> anyhow::Result<Vec<Reminder>> {
        self.inner.list_for_commitment(commitment_id).await
    }

    async fn mark_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> anyhow::Result<bool> {
        if *self.failing.lock().await == Some(id) {
            anyhow::bail!("connection reset");
        }
        self.inner.mark_sent(id, sent_at).await
    }
}

#[tokio::test]
async fn store_error_on_one_reminder_does_not_abort_the_batch() {
    let commitment_store = Arc::new(InMemoryCommitmentStore::default());
    let inner = Arc::new(InMemoryReminderStore::default());
    let reminder_store = Arc::new(FlakyReminderStore {
        inner: inner.clone(),
        failing: Mutex::new(None),
    });
    let notifier = Arc::new(ScriptedNotifier::default());
    let commitments = CommitmentService::new(commitment_store.clone());
    let reminders = ReminderService::new(
        commitment_store,
        reminder_store.clone(),
        notifier.clone(),
        ReminderSettings::default(),
    );

    let commitment_id = commitments
        .open(NewCommitment::titled("Quarterly review"), t0() - Duration::days(1))
        .await
        .unwrap()
        .commitment
        .id;
    let mut ids = Vec::new();
    for (offset, message) in [(3, "one"), (2, "two"), (1, "three")] {
        let reminder = reminders
            .create(NewReminder {
                commitment_id,
                remind_at: t0() - Duration::minutes(offset),
                message: Some(message.to_string()),
                delivery_target: None,
                delivery_channel: None,
            })
            .await
            .unwrap();
        ids.push(reminder.id);
    }
    *reminder_store.failing.lock().await = Some(ids[1]);

    let report = reminders.dispatch_due(t0()).await.unwrap();

    let dispatched: Vec<Uuid> = report.dispatched.iter().map(|r| r.id).collect();
    assert_eq!(dispatched, vec![ids[0], ids[2]]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].reminder_id, ids[1]);
    assert!(report.failed[0].reason.contains("connection reset"));
    assert_eq!(notifier.sent_messages().await, vec!["one", "two", "three"]);

    let still_due: Vec<Uuid> = inner
        .list_due(t0())
        .await
        .unwrap()
        .iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(still_due, vec![ids[1]]);
}

#[tokio::test]
async fn round_trip_dispatch_leaves_commitment_open() {
    let h = harness();
    let commitment_id = open(&h, "Ping Bob").await;
    remind(&h, commitment_id, t0(), "Ping Bob about the contract").await;

    let report = h.reminders.dispatch_due(t0()).await.unwrap();
    assert_eq!(report.dispatched.len(), 1);
    assert!(report.dispatched[0].sent_at.is_some());

    let open = h.commitments.list_open(t0()).await.unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].commitment.id, commitment_id);
    assert_eq!(open[0].commitment.status, CommitmentStatus::Open);
}

#[tokio::test]
async fn list_for_unknown_commitment_is_not_found() {
    let h = harness();
    let err = h
        .reminders
        .list_for_commitment(Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, SignalError::NotFound(_)));
}
