use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ChannelType, Commitment, CommitmentStatus, Urgency};

/// Conjunctive commitment filter. Unset fields match everything, so the
/// default filter returns every commitment, closed ones included.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CommitmentFilter {
    /// Case-insensitive substring of `person`.
    pub person: Option<String>,
    pub status: Option<CommitmentStatus>,
    pub urgency: Option<Urgency>,
    pub channel_type: Option<ChannelType>,
    pub due_before: Option<DateTime<Utc>>,
    pub due_after: Option<DateTime<Utc>>,
    pub opened_before: Option<DateTime<Utc>>,
    pub opened_after: Option<DateTime<Utc>>,
    /// Case-insensitive substring of `title` or `description`.
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub exclude_closed: bool,
}

impl CommitmentFilter {
    pub fn open_only() -> Self {
        Self {
            exclude_closed: true,
            ..Self::default()
        }
    }

    pub fn matches(&self, commitment: &Commitment) -> bool {
        if self.exclude_closed && commitment.is_closed() {
            return false;
        }
        if let Some(person) = non_blank(&self.person) {
            let matched = commitment
                .person
                .as_deref()
                .is_some_and(|value| contains_ignore_case(value, person));
            if !matched {
                return false;
            }
        }
        if self.status.is_some_and(|status| status != commitment.status) {
            return false;
        }
        if self.urgency.is_some() && self.urgency != commitment.urgency {
            return false;
        }
        if self.channel_type.is_some() && self.channel_type != commitment.channel_type {
            return false;
        }
        if let Some(bound) = self.due_before {
            if !commitment.due_at.is_some_and(|due| due <= bound) {
                return false;
            }
        }
        if let Some(bound) = self.due_after {
            if !commitment.due_at.is_some_and(|due| due >= bound) {
                return false;
            }
        }
        if self.opened_before.is_some_and(|bound| commitment.opened_at > bound) {
            return false;
        }
        if self.opened_after.is_some_and(|bound| commitment.opened_at < bound) {
            return false;
        }
        if let Some(text) = non_blank(&self.text) {
            let in_title = contains_ignore_case(&commitment.title, text);
            let in_description = commitment
                .description
                .as_deref()
                .is_some_and(|description| contains_ignore_case(description, text));
            if !in_title && !in_description {
                return false;
            }
        }
        true
    }
}

/// Resolves a close-by-title request among `candidates`.
///
/// Only commitments that are not yet closed are considered. Exact
/// (case-sensitive) title matches win over case-insensitive ones, and among
/// equals the most recently opened commitment is chosen.
pub fn pick_title_match<I>(candidates: I, title: &str, person: Option<&str>) -> Option<Commitment>
where
    I: IntoIterator<Item = Commitment>,
{
    let title = title.trim();
    let person = person.map(str::trim).filter(|value| !value.is_empty());

    candidates
        .into_iter()
        .filter(|commitment| !commitment.is_closed())
        .filter(|commitment| same_ignore_case(&commitment.title, title))
        .filter(|commitment| match person {
            Some(person) => commitment
                .person
                .as_deref()
                .is_some_and(|value| same_ignore_case(value, person)),
            None => true,
        })
        .max_by_key(|commitment| (commitment.title.trim() == title, commitment.opened_at))
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn same_ignore_case(left: &str, right: &str) -> bool {
    left.trim().to_lowercase() == right.trim().to_lowercase()
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
