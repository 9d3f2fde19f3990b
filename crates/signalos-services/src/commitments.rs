use std::sync::Arc;

use chrono::{DateTime, Utc};
use signalos_core::{
    CloseTarget, Commitment, CommitmentFilter, CommitmentPatch, CommitmentStore, CommitmentView,
    NewCommitment, Result, SignalError,
};
use tracing::info;
use uuid::Uuid;

/// Lifecycle rules and queries over a [`CommitmentStore`].
#[derive(Clone)]
pub struct CommitmentService {
    store: Arc<dyn CommitmentStore>,
}

impl CommitmentService {
    pub fn new(store: Arc<dyn CommitmentStore>) -> Self {
        Self { store }
    }

    pub async fn open(&self, request: NewCommitment, now: DateTime<Utc>) -> Result<CommitmentView> {
        let commitment = request.into_commitment(now)?;
        let stored = self.store.create(commitment).await?;
        info!("opened commitment {}: {}", stored.id, stored.title);
        Ok(CommitmentView::at(stored, now))
    }

    /// Closes by id, or else by title. Closing an already closed commitment
    /// by id returns it unchanged.
    pub async fn close(&self, target: CloseTarget, now: DateTime<Utc>) -> Result<CommitmentView> {
        let title = target
            .title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty());

        let mut commitment = match (target.commitment_id, title) {
            (Some(id), _) => self
                .store
                .get(id)
                .await?
                .ok_or_else(|| SignalError::NotFound(format!("commitment {id}")))?,
            (None, Some(title)) => self
                .store
                .find_by_title(title, target.person.as_deref())
                .await?
                .ok_or_else(|| {
                    SignalError::NotFound(format!("no open commitment titled {title:?}"))
                })?,
            (None, None) => {
                return Err(SignalError::Conflict(
                    "ambiguous close target: provide commitment_id or title".to_string(),
                ));
            }
        };

        if commitment.is_closed() {
            info!("commitment {} already closed", commitment.id);
            return Ok(CommitmentView::at(commitment, now));
        }

        commitment.close(now);
        let stored = self.persist(&commitment).await?;
        info!("closed commitment {}", stored.id);
        Ok(CommitmentView::at(stored, now))
    }

    pub async fn update(
        &self,
        id: Uuid,
        patch: CommitmentPatch,
        now: DateTime<Utc>,
    ) -> Result<CommitmentView> {
        let mut commitment = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| SignalError::NotFound(format!("commitment {id}")))?;

        patch.apply(&mut commitment, now)?;
        let stored = self.persist(&commitment).await?;
        info!("updated commitment {}", stored.id);
        Ok(CommitmentView::at(stored, now))
    }

    pub async fn get(&self, id: Uuid, now: DateTime<Utc>) -> Result<CommitmentView> {
        self.store
            .get(id)
            .await?
            .map(|commitment| CommitmentView::at(commitment, now))
            .ok_or_else(|| SignalError::NotFound(format!("commitment {id}")))
    }

    /// Every commitment that is not CLOSED, oldest opened first.
    pub async fn list_open(&self, now: DateTime<Utc>) -> Result<Vec<CommitmentView>> {
        self.query(CommitmentFilter::open_only(), now).await
    }

    pub async fn query(
        &self,
        filter: CommitmentFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<CommitmentView>> {
        let rows = self.store.list(&filter).await?;
        Ok(rows
            .into_iter()
            .map(|commitment| CommitmentView::at(commitment, now))
            .collect())
    }

    async fn persist(&self, commitment: &Commitment) -> Result<Commitment> {
        self.store
            .update(commitment)
            .await?
            .ok_or_else(|| SignalError::NotFound(format!("commitment {}", commitment.id)))
    }
}
