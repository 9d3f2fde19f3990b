use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Commitment, Reminder};
use crate::query::CommitmentFilter;

/// Concurrent writes to the same record resolve last-write-wins.
#[async_trait]
pub trait CommitmentStore: Send + Sync {
    async fn create(&self, commitment: Commitment) -> anyhow::Result<Commitment>;
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Commitment>>;
    /// Most recently opened non-closed commitment matching `title`, see
    /// [`crate::query::pick_title_match`].
    async fn find_by_title(
        &self,
        title: &str,
        person: Option<&str>,
    ) -> anyhow::Result<Option<Commitment>>;
    /// Matching commitments ordered by `opened_at` ascending.
    async fn list(&self, filter: &CommitmentFilter) -> anyhow::Result<Vec<Commitment>>;
    /// Replaces the stored record. `None` if `commitment.id` is unknown.
    async fn update(&self, commitment: &Commitment) -> anyhow::Result<Option<Commitment>>;
}

#[async_trait]
pub trait ReminderStore: Send + Sync {
    async fn create(&self, reminder: Reminder) -> anyhow::Result<Reminder>;
    /// Pending reminders with `remind_at <= now`, earliest first.
    async fn list_due(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<Reminder>>;
    async fn list_for_commitment(&self, commitment_id: Uuid) -> anyhow::Result<Vec<Reminder>>;
    /// Sets `sent_at` only if still null. Returns false when the reminder was
    /// already sent or does not exist.
    async fn mark_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> anyhow::Result<bool>;
}
