use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use signalos_core::{
    Commitment, CommitmentFilter, CommitmentStore, Reminder, ReminderStore, pick_title_match,
};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Records keyed by id, each tagged with its insertion sequence so that
/// listings with equal timestamps keep creation order.
struct Table<T> {
    rows: HashMap<Uuid, (i64, T)>,
    sequence: i64,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: HashMap::new(),
            sequence: 0,
        }
    }
}

impl<T: Clone> Table<T> {
    fn insert(&mut self, id: Uuid, row: T) {
        self.sequence += 1;
        self.rows.insert(id, (self.sequence, row));
    }

    fn sorted_by<K: Ord>(&self, key: impl Fn(&T) -> K) -> Vec<T> {
        let mut rows: Vec<&(i64, T)> = self.rows.values().collect();
        rows.sort_by(|(left_seq, left), (right_seq, right)| {
            key(left)
                .cmp(&key(right))
                .then_with(|| left_seq.cmp(right_seq))
        });
        rows.into_iter().map(|(_, row)| row.clone()).collect()
    }
}

#[derive(Default)]
pub struct InMemoryCommitmentStore {
    table: RwLock<Table<Commitment>>,
}

#[async_trait]
impl CommitmentStore for InMemoryCommitmentStore {
    async fn create(&self, commitment: Commitment) -> anyhow::Result<Commitment> {
        let mut table = self.table.write().await;
        if table.rows.contains_key(&commitment.id) {
            anyhow::bail!("commitment {} already exists", commitment.id);
        }
        table.insert(commitment.id, commitment.clone());
        Ok(commitment)
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Commitment>> {
        let table = self.table.read().await;
        Ok(table.rows.get(&id).map(|(_, commitment)| commitment.clone()))
    }

    async fn find_by_title(
        &self,
        title: &str,
        person: Option<&str>,
    ) -> anyhow::Result<Option<Commitment>> {
        let table = self.table.read().await;
        let candidates = table.sorted_by(|commitment| commitment.opened_at);
        Ok(pick_title_match(candidates, title, person))
    }

    async fn list(&self, filter: &CommitmentFilter) -> anyhow::Result<Vec<Commitment>> {
        let table = self.table.read().await;
        Ok(table
            .sorted_by(|commitment| commitment.opened_at)
            .into_iter()
            .filter(|commitment| filter.matches(commitment))
            .collect())
    }

    async fn update(&self, commitment: &Commitment) -> anyhow::Result<Option<Commitment>> {
        let mut table = self.table.write().await;
        Ok(table.rows.get_mut(&commitment.id).map(|(_, stored)| {
            *stored = commitment.clone();
            stored.clone()
        }))
    }
}

#[derive(Default)]
pub struct InMemoryReminderStore {
    table: RwLock<Table<Reminder>>,
}

#[async_trait]
impl ReminderStore for InMemoryReminderStore {
    async fn create(&self, reminder: Reminder) -> anyhow::Result<Reminder> {
        let mut table = self.table.write().await;
        if table.rows.contains_key(&reminder.id) {
            anyhow::bail!("reminder {} already exists", reminder.id);
        }
        table.insert(reminder.id, reminder.clone());
        Ok(reminder)
    }

    async fn list_due(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<Reminder>> {
        let table = self.table.read().await;
        Ok(table
            .sorted_by(|reminder| reminder.remind_at)
            .into_iter()
            .filter(|reminder| reminder.is_due(now))
            .collect())
    }

    async fn list_for_commitment(&self, commitment_id: Uuid) -> anyhow::Result<Vec<Reminder>> {
        let table = self.table.read().await;
        Ok(table
            .sorted_by(|reminder| reminder.remind_at)
            .into_iter()
            .filter(|reminder| reminder.commitment_id == commitment_id)
            .collect())
    }

    async fn mark_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> anyhow::Result<bool> {
        let mut table = self.table.write().await;
        match table.rows.get_mut(&id) {
            Some((_, reminder)) if reminder.sent_at.is_none() => {
                reminder.sent_at = Some(sent_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
