use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use signalos_core::{
    ChannelType, CloseTarget, CommitmentFilter, CommitmentPatch, CommitmentStatus, NewReminder,
    SignalError, Urgency, parse_timestamp,
};
use uuid::Uuid;

pub use signalos_core::NewCommitment as OpenCommitmentRequest;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseCommitmentRequest {
    pub commitment_id: Option<Uuid>,
    pub title: Option<String>,
    pub person: Option<String>,
}

impl From<CloseCommitmentRequest> for CloseTarget {
    fn from(request: CloseCommitmentRequest) -> Self {
        CloseTarget {
            commitment_id: request.commitment_id,
            title: request.title,
            person: request.person,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCommitmentRequest {
    pub commitment_id: Uuid,
    #[serde(flatten)]
    pub patch: CommitmentPatch,
}

/// Query-string form of [`CommitmentFilter`]. Enum and timestamp values
/// arrive as text and are validated in [`CommitmentQuery::into_filter`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommitmentQuery {
    pub person: Option<String>,
    pub status: Option<String>,
    pub urgency: Option<String>,
    pub channel_type: Option<String>,
    pub due_before: Option<String>,
    pub due_after: Option<String>,
    pub opened_before: Option<String>,
    pub opened_after: Option<String>,
    pub text: Option<String>,
}

impl CommitmentQuery {
    pub fn into_filter(self) -> Result<CommitmentFilter, SignalError> {
        Ok(CommitmentFilter {
            person: non_blank(self.person),
            status: non_blank(self.status)
                .map(|value| CommitmentStatus::parse(&value))
                .transpose()?,
            urgency: non_blank(self.urgency)
                .map(|value| Urgency::parse(&value))
                .transpose()?,
            channel_type: non_blank(self.channel_type)
                .map(|value| ChannelType::parse(&value))
                .transpose()?,
            due_before: timestamp(self.due_before)?,
            due_after: timestamp(self.due_after)?,
            opened_before: timestamp(self.opened_before)?,
            opened_after: timestamp(self.opened_after)?,
            text: non_blank(self.text),
            exclude_closed: false,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReminderRequest {
    pub commitment_id: Uuid,
    pub remind_at: String,
    pub message: Option<String>,
    pub delivery_target: Option<String>,
    pub delivery_channel: Option<String>,
}

impl TryFrom<CreateReminderRequest> for NewReminder {
    type Error = SignalError;

    fn try_from(request: CreateReminderRequest) -> Result<Self, Self::Error> {
        Ok(NewReminder {
            commitment_id: request.commitment_id,
            remind_at: parse_timestamp(&request.remind_at)?,
            message: request.message,
            delivery_target: request.delivery_target,
            delivery_channel: request.delivery_channel,
        })
    }
}

/// Payload published for each reminder delivered through Redis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub channel: String,
    pub target: String,
    pub message: String,
    pub queued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn timestamp(value: Option<String>) -> Result<Option<DateTime<Utc>>, SignalError> {
    non_blank(value)
        .map(|value| parse_timestamp(&value))
        .transpose()
}
