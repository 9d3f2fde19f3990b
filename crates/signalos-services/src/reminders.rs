use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::Serialize;
use signalos_core::{
    CommitmentStore, NewReminder, Notifier, Reminder, ReminderStore, Result, SignalError,
};
use tracing::{info, warn};
use uuid::Uuid;

pub const DEFAULT_DELIVERY_CHANNEL: &str = "whatsapp";
pub const DEFAULT_DELIVERY_TARGET: &str = "default";

#[derive(Clone, Debug)]
pub struct ReminderSettings {
    /// Channel stored on reminders created without one.
    pub default_channel: String,
    /// Target used at dispatch when a reminder has none.
    pub default_target: String,
    /// Upper bound on a single notifier call.
    pub send_timeout: Duration,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            default_channel: DEFAULT_DELIVERY_CHANNEL.to_string(),
            default_target: DEFAULT_DELIVERY_TARGET.to_string(),
            send_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchFailure {
    pub reminder_id: Uuid,
    pub reason: String,
}

/// Per-item outcome of one dispatch batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchReport {
    pub dispatched: Vec<Reminder>,
    pub failed: Vec<DispatchFailure>,
    /// Sent concurrently by another dispatcher between listing and marking.
    pub skipped: Vec<Uuid>,
}

impl DispatchReport {
    pub fn is_empty(&self) -> bool {
        self.dispatched.is_empty() && self.failed.is_empty() && self.skipped.is_empty()
    }

    fn record_failure(&mut self, reminder_id: Uuid, err: &SignalError) {
        warn!("failed to dispatch reminder {reminder_id}: {err:#}");
        self.failed.push(DispatchFailure {
            reminder_id,
            reason: format!("{err:#}"),
        });
    }
}

#[derive(Clone)]
pub struct ReminderService {
    commitments: Arc<dyn CommitmentStore>,
    reminders: Arc<dyn ReminderStore>,
    notifier: Arc<dyn Notifier>,
    settings: ReminderSettings,
}

impl ReminderService {
    pub fn new(
        commitments: Arc<dyn CommitmentStore>,
        reminders: Arc<dyn ReminderStore>,
        notifier: Arc<dyn Notifier>,
        settings: ReminderSettings,
    ) -> Self {
        Self {
            commitments,
            reminders,
            notifier,
            settings,
        }
    }

    pub fn settings(&self) -> &ReminderSettings {
        &self.settings
    }

    /// Schedules a reminder. `remind_at` may lie in the past, in which case
    /// the reminder is due immediately.
    pub async fn create(&self, request: NewReminder) -> Result<Reminder> {
        if self.commitments.get(request.commitment_id).await?.is_none() {
            return Err(SignalError::NotFound(format!(
                "commitment {}",
                request.commitment_id
            )));
        }

        let delivery_channel = request
            .delivery_channel
            .map(|channel| channel.trim().to_string())
            .filter(|channel| !channel.is_empty())
            .unwrap_or_else(|| self.settings.default_channel.clone());

        let reminder = Reminder {
            id: Uuid::new_v4(),
            commitment_id: request.commitment_id,
            remind_at: request.remind_at,
            sent_at: None,
            delivery_channel,
            delivery_target: request.delivery_target,
            message: request.message,
        };

        let stored = self.reminders.create(reminder).await?;
        info!(
            "created reminder {} for commitment {} at {}",
            stored.id, stored.commitment_id, stored.remind_at
        );
        Ok(stored)
    }

    pub async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>> {
        Ok(self.reminders.list_due(now).await?)
    }

    pub async fn list_for_commitment(&self, commitment_id: Uuid) -> Result<Vec<Reminder>> {
        if self.commitments.get(commitment_id).await?.is_none() {
            return Err(SignalError::NotFound(format!("commitment {commitment_id}")));
        }
        Ok(self.reminders.list_for_commitment(commitment_id).await?)
    }

    /// Attempts every due reminder in `remind_at` order. Per-item failures,
    /// delivery or storage, leave the reminder pending for the next batch and
    /// never abort this one. Only reading the due set can fail the call.
    pub async fn dispatch_due(&self, now: DateTime<Utc>) -> Result<DispatchReport> {
        let due = self.reminders.list_due(now).await?;
        let mut report = DispatchReport::default();

        for mut reminder in due {
            let target = reminder
                .delivery_target
                .clone()
                .unwrap_or_else(|| self.settings.default_target.clone());
            let body = match &reminder.message {
                Some(message) => message.clone(),
                None => match self.fallback_message(reminder.commitment_id).await {
                    Ok(body) => body,
                    Err(err) => {
                        report.record_failure(reminder.id, &err);
                        continue;
                    }
                },
            };

            if let Err(err) = self.deliver(&target, &body, &reminder.delivery_channel).await {
                report.record_failure(reminder.id, &err);
                continue;
            }

            match self.reminders.mark_sent(reminder.id, now).await {
                Ok(true) => {
                    info!(
                        "dispatched reminder {} to {} via {}",
                        reminder.id, target, reminder.delivery_channel
                    );
                    reminder.sent_at = Some(now);
                    report.dispatched.push(reminder);
                }
                Ok(false) => {
                    warn!("reminder {} was already marked sent", reminder.id);
                    report.skipped.push(reminder.id);
                }
                Err(err) => {
                    // Delivered but unrecorded; the next batch sends it again.
                    let err = SignalError::Storage(err.context("failed to record delivery"));
                    report.record_failure(reminder.id, &err);
                }
            }
        }

        Ok(report)
    }

    async fn deliver(&self, target: &str, body: &str, channel: &str) -> Result<()> {
        let send = self.notifier.send(target, body, channel);
        match tokio::time::timeout(self.settings.send_timeout, send).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(SignalError::Delivery(format!("{err:#}"))),
            Err(_) => Err(SignalError::Delivery(format!(
                "notifier timed out after {:?}",
                self.settings.send_timeout
            ))),
        }
    }

    async fn fallback_message(&self, commitment_id: Uuid) -> Result<String> {
        let title = self
            .commitments
            .get(commitment_id)
            .await?
            .map(|commitment| commitment.title)
            .unwrap_or_else(|| "unknown".to_string());
        Ok(format!("Reminder: {title}"))
    }
}
