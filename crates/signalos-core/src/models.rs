use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SignalError;

pub const TITLE_MAX_LEN: usize = 512;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum CommitmentStatus {
    #[default]
    Open,
    Waiting,
    Snoozed,
    Closed,
}

impl CommitmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Waiting => "WAITING",
            Self::Snoozed => "SNOOZED",
            Self::Closed => "CLOSED",
        }
    }

    pub fn parse(value: &str) -> Result<Self, SignalError> {
        match value.trim().to_ascii_uppercase().as_str() {
            "OPEN" => Ok(Self::Open),
            "WAITING" => Ok(Self::Waiting),
            "SNOOZED" => Ok(Self::Snoozed),
            "CLOSED" => Ok(Self::Closed),
            other => Err(SignalError::Validation(format!(
                "unsupported status: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Urgency {
    Now,
    Soon,
    Scheduled,
    Someday,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Now => "NOW",
            Self::Soon => "SOON",
            Self::Scheduled => "SCHEDULED",
            Self::Someday => "SOMEDAY",
        }
    }

    pub fn parse(value: &str) -> Result<Self, SignalError> {
        match value.trim().to_ascii_uppercase().as_str() {
            "NOW" => Ok(Self::Now),
            "SOON" => Ok(Self::Soon),
            "SCHEDULED" => Ok(Self::Scheduled),
            "SOMEDAY" => Ok(Self::Someday),
            other => Err(SignalError::Validation(format!(
                "unsupported urgency: {other}"
            ))),
        }
    }
}

/// Where a commitment was made.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Email,
    Slack,
    Meeting,
    Call,
    Text,
    Web,
    Other,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Slack => "slack",
            Self::Meeting => "meeting",
            Self::Call => "call",
            Self::Text => "text",
            Self::Web => "web",
            Self::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Result<Self, SignalError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "email" => Ok(Self::Email),
            "slack" => Ok(Self::Slack),
            "meeting" => Ok(Self::Meeting),
            "call" => Ok(Self::Call),
            "text" => Ok(Self::Text),
            "web" => Ok(Self::Web),
            "other" => Ok(Self::Other),
            other => Err(SignalError::Validation(format!(
                "unsupported channel_type: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Commitment {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: CommitmentStatus,
    pub urgency: Option<Urgency>,
    pub person: Option<String>,
    pub organization: Option<String>,
    pub channel_type: Option<ChannelType>,
    pub channel_title: Option<String>,
    pub channel_link: Option<String>,
    pub source_snippet: Option<String>,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub due_at: Option<DateTime<Utc>>,
    pub last_touched_at: DateTime<Utc>,
}

impl Commitment {
    pub fn is_closed(&self) -> bool {
        self.status == CommitmentStatus::Closed
    }

    /// Days between opening and closing (or `now` while still open),
    /// rounded to two decimals.
    pub fn days_open(&self, now: DateTime<Utc>) -> f64 {
        let end = self.closed_at.unwrap_or(now);
        let seconds = (end - self.opened_at).num_milliseconds() as f64 / 1000.0;
        let days = seconds / 86_400.0;
        (days * 100.0).round() / 100.0
    }

    /// Moves the commitment to CLOSED. `closed_at` keeps its first value.
    pub fn close(&mut self, now: DateTime<Utc>) {
        self.status = CommitmentStatus::Closed;
        if self.closed_at.is_none() {
            self.closed_at = Some(now);
        }
        self.last_touched_at = now;
    }
}

/// A commitment together with the fields derived at read time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommitmentView {
    #[serde(flatten)]
    pub commitment: Commitment,
    pub days_open: f64,
}

impl CommitmentView {
    pub fn at(commitment: Commitment, now: DateTime<Utc>) -> Self {
        let days_open = commitment.days_open(now);
        Self {
            commitment,
            days_open,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCommitment {
    pub title: String,
    pub description: Option<String>,
    pub person: Option<String>,
    pub organization: Option<String>,
    pub channel_type: Option<ChannelType>,
    pub channel_title: Option<String>,
    pub channel_link: Option<String>,
    pub urgency: Option<Urgency>,
    pub due_at: Option<DateTime<Utc>>,
    pub source_snippet: Option<String>,
    #[serde(default)]
    pub status: CommitmentStatus,
}

impl NewCommitment {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn into_commitment(self, now: DateTime<Utc>) -> Result<Commitment, SignalError> {
        let title = validate_title(&self.title)?;
        let closed_at = (self.status == CommitmentStatus::Closed).then_some(now);

        Ok(Commitment {
            id: Uuid::new_v4(),
            title,
            description: self.description,
            status: self.status,
            urgency: self.urgency,
            person: self.person,
            organization: self.organization,
            channel_type: self.channel_type,
            channel_title: self.channel_title,
            channel_link: self.channel_link,
            source_snippet: self.source_snippet,
            opened_at: now,
            closed_at,
            due_at: self.due_at,
            last_touched_at: now,
        })
    }
}

/// Partial update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommitmentPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<CommitmentStatus>,
    pub urgency: Option<Urgency>,
    pub person: Option<String>,
    pub organization: Option<String>,
    pub channel_type: Option<ChannelType>,
    pub channel_title: Option<String>,
    pub channel_link: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub source_snippet: Option<String>,
}

impl CommitmentPatch {
    pub fn apply(self, commitment: &mut Commitment, now: DateTime<Utc>) -> Result<(), SignalError> {
        if let Some(status) = self.status {
            if commitment.is_closed() && status != CommitmentStatus::Closed {
                return Err(SignalError::Validation(format!(
                    "commitment {} is closed and cannot move to {}",
                    commitment.id,
                    status.as_str()
                )));
            }
        }

        if let Some(title) = self.title {
            commitment.title = validate_title(&title)?;
        }
        if let Some(description) = self.description {
            commitment.description = Some(description);
        }
        if let Some(urgency) = self.urgency {
            commitment.urgency = Some(urgency);
        }
        if let Some(person) = self.person {
            commitment.person = Some(person);
        }
        if let Some(organization) = self.organization {
            commitment.organization = Some(organization);
        }
        if let Some(channel_type) = self.channel_type {
            commitment.channel_type = Some(channel_type);
        }
        if let Some(channel_title) = self.channel_title {
            commitment.channel_title = Some(channel_title);
        }
        if let Some(channel_link) = self.channel_link {
            commitment.channel_link = Some(channel_link);
        }
        if let Some(due_at) = self.due_at {
            commitment.due_at = Some(due_at);
        }
        if let Some(source_snippet) = self.source_snippet {
            commitment.source_snippet = Some(source_snippet);
        }

        match self.status {
            Some(CommitmentStatus::Closed) => commitment.close(now),
            Some(status) => commitment.status = status,
            None => {}
        }

        commitment.last_touched_at = now;
        Ok(())
    }
}

/// Identifies the commitment to close. `commitment_id` takes precedence over
/// `title`; `person` only narrows a title lookup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CloseTarget {
    pub commitment_id: Option<Uuid>,
    pub title: Option<String>,
    pub person: Option<String>,
}

impl CloseTarget {
    pub fn by_id(commitment_id: Uuid) -> Self {
        Self {
            commitment_id: Some(commitment_id),
            ..Self::default()
        }
    }

    pub fn by_title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reminder {
    pub id: Uuid,
    pub commitment_id: Uuid,
    pub remind_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub delivery_channel: String,
    pub delivery_target: Option<String>,
    pub message: Option<String>,
}

impl Reminder {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.sent_at.is_none() && self.remind_at <= now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReminder {
    pub commitment_id: Uuid,
    pub remind_at: DateTime<Utc>,
    pub message: Option<String>,
    pub delivery_target: Option<String>,
    pub delivery_channel: Option<String>,
}

fn validate_title(raw: &str) -> Result<String, SignalError> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(SignalError::Validation("title is required".to_string()));
    }
    if title.chars().count() > TITLE_MAX_LEN {
        return Err(SignalError::Validation(format!(
            "title exceeds {TITLE_MAX_LEN} characters"
        )));
    }
    Ok(title.to_string())
}

/// Parses an RFC 3339 timestamp, or a naive ISO-8601 one interpreted as UTC.
///
/// A positive offset whose `+` was decoded to a space by an unencoded query
/// string (`2026-03-01T11:00:00 02:00`) is read as `+02:00`.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, SignalError> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Some((head, offset)) = value.rsplit_once(' ') {
        if head.contains('T') && is_bare_offset(offset) {
            if let Ok(parsed) = DateTime::parse_from_rfc3339(&format!("{head}+{offset}")) {
                return Ok(parsed.with_timezone(&Utc));
            }
        }
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| SignalError::Validation(format!("invalid timestamp: {value:?}")))
}

fn is_bare_offset(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 5
        && bytes[2] == b':'
        && [0, 1, 3, 4].iter().all(|&i| bytes[i].is_ascii_digit())
}
