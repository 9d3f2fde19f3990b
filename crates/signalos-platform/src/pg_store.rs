//! Postgres-backed stores.
//!
//! Expects the `commitments` and `reminders` tables together with the
//! `commitment_status`, `urgency` and `channel_type` enum types. Enum columns
//! are read back as text and bound as text with an explicit cast.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use signalos_core::{
    ChannelType, Commitment, CommitmentFilter, CommitmentStatus, CommitmentStore, Reminder,
    ReminderStore, Urgency, pick_title_match,
};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

const COMMITMENT_COLUMNS: &str = r#"
    id,
    title,
    description,
    status::text AS status,
    urgency::text AS urgency,
    person,
    organization,
    channel_type::text AS channel_type,
    channel_title,
    channel_link,
    source_snippet,
    opened_at,
    closed_at,
    due_at,
    last_touched_at
"#;

const REMINDER_COLUMNS: &str = r#"
    id,
    commitment_id,
    remind_at,
    sent_at,
    delivery_channel,
    delivery_target,
    message
"#;

#[derive(Clone)]
pub struct PgCommitmentStore {
    pool: PgPool,
}

impl PgCommitmentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommitmentStore for PgCommitmentStore {
    async fn create(&self, commitment: Commitment) -> Result<Commitment> {
        let sql = format!(
            r#"
            INSERT INTO commitments (
                id, title, description, status, urgency, person, organization,
                channel_type, channel_title, channel_link, source_snippet,
                opened_at, closed_at, due_at, last_touched_at
            )
            VALUES (
                $1, $2, $3, $4::commitment_status, $5::urgency, $6, $7,
                $8::channel_type, $9, $10, $11, $12, $13, $14, $15
            )
            RETURNING {COMMITMENT_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(commitment.id)
            .bind(&commitment.title)
            .bind(&commitment.description)
            .bind(commitment.status.as_str())
            .bind(commitment.urgency.map(|urgency| urgency.as_str()))
            .bind(&commitment.person)
            .bind(&commitment.organization)
            .bind(commitment.channel_type.map(|channel| channel.as_str()))
            .bind(&commitment.channel_title)
            .bind(&commitment.channel_link)
            .bind(&commitment.source_snippet)
            .bind(commitment.opened_at)
            .bind(commitment.closed_at)
            .bind(commitment.due_at)
            .bind(commitment.last_touched_at)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("failed to insert commitment {}", commitment.id))?;

        commitment_from_row(&row)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Commitment>> {
        let sql = format!("SELECT {COMMITMENT_COLUMNS} FROM commitments WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(commitment_from_row).transpose()
    }

    async fn find_by_title(&self, title: &str, person: Option<&str>) -> Result<Option<Commitment>> {
        let person = person.map(str::trim).filter(|value| !value.is_empty());
        let sql = format!(
            r#"
            SELECT {COMMITMENT_COLUMNS}
            FROM commitments
            WHERE status <> 'CLOSED'
              AND lower(btrim(title)) = lower($1)
              AND ($2::text IS NULL OR lower(btrim(person)) = lower($2))
            "#
        );

        let rows = sqlx::query(&sql)
            .bind(title.trim())
            .bind(person)
            .fetch_all(&self.pool)
            .await?;

        let candidates = rows
            .iter()
            .map(commitment_from_row)
            .collect::<Result<Vec<_>>>()?;
        Ok(pick_title_match(candidates, title, person))
    }

    async fn list(&self, filter: &CommitmentFilter) -> Result<Vec<Commitment>> {
        let sql = format!(
            r#"
            SELECT {COMMITMENT_COLUMNS}
            FROM commitments
            WHERE ($1::boolean = FALSE OR status <> 'CLOSED')
              AND ($2::text IS NULL OR person ILIKE $2)
              AND ($3::text IS NULL OR status = $3::commitment_status)
              AND ($4::text IS NULL OR urgency = $4::urgency)
              AND ($5::text IS NULL OR channel_type = $5::channel_type)
              AND ($6::timestamptz IS NULL OR due_at <= $6)
              AND ($7::timestamptz IS NULL OR due_at >= $7)
              AND ($8::timestamptz IS NULL OR opened_at <= $8)
              AND ($9::timestamptz IS NULL OR opened_at >= $9)
              AND ($10::text IS NULL OR title ILIKE $10 OR description ILIKE $10)
            ORDER BY opened_at ASC, id ASC
            "#
        );

        let rows = sqlx::query(&sql)
            .bind(filter.exclude_closed)
            .bind(contains_pattern(filter.person.as_deref()))
            .bind(filter.status.map(|status| status.as_str()))
            .bind(filter.urgency.map(|urgency| urgency.as_str()))
            .bind(filter.channel_type.map(|channel| channel.as_str()))
            .bind(filter.due_before)
            .bind(filter.due_after)
            .bind(filter.opened_before)
            .bind(filter.opened_after)
            .bind(contains_pattern(filter.text.as_deref()))
            .fetch_all(&self.pool)
            .await
            .context("failed to query commitments")?;

        rows.iter().map(commitment_from_row).collect()
    }

    async fn update(&self, commitment: &Commitment) -> Result<Option<Commitment>> {
        let sql = format!(
            r#"
            UPDATE commitments
            SET
                title = $2,
                description = $3,
                status = $4::commitment_status,
                urgency = $5::urgency,
                person = $6,
                organization = $7,
                channel_type = $8::channel_type,
                channel_title = $9,
                channel_link = $10,
                source_snippet = $11,
                closed_at = $12,
                due_at = $13,
                last_touched_at = $14
            WHERE id = $1
            RETURNING {COMMITMENT_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(commitment.id)
            .bind(&commitment.title)
            .bind(&commitment.description)
            .bind(commitment.status.as_str())
            .bind(commitment.urgency.map(|urgency| urgency.as_str()))
            .bind(&commitment.person)
            .bind(&commitment.organization)
            .bind(commitment.channel_type.map(|channel| channel.as_str()))
            .bind(&commitment.channel_title)
            .bind(&commitment.channel_link)
            .bind(&commitment.source_snippet)
            .bind(commitment.closed_at)
            .bind(commitment.due_at)
            .bind(commitment.last_touched_at)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to update commitment {}", commitment.id))?;

        row.as_ref().map(commitment_from_row).transpose()
    }
}

#[derive(Clone)]
pub struct PgReminderStore {
    pool: PgPool,
}

impl PgReminderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReminderStore for PgReminderStore {
    async fn create(&self, reminder: Reminder) -> Result<Reminder> {
        let sql = format!(
            r#"
            INSERT INTO reminders (
                id, commitment_id, remind_at, sent_at, delivery_channel, delivery_target, message
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {REMINDER_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(reminder.id)
            .bind(reminder.commitment_id)
            .bind(reminder.remind_at)
            .bind(reminder.sent_at)
            .bind(&reminder.delivery_channel)
            .bind(&reminder.delivery_target)
            .bind(&reminder.message)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("failed to insert reminder {}", reminder.id))?;

        reminder_from_row(&row)
    }

    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>> {
        let sql = format!(
            r#"
            SELECT {REMINDER_COLUMNS}
            FROM reminders
            WHERE sent_at IS NULL
              AND remind_at <= $1
            ORDER BY remind_at ASC, id ASC
            "#
        );

        let rows = sqlx::query(&sql).bind(now).fetch_all(&self.pool).await?;
        rows.iter().map(reminder_from_row).collect()
    }

    async fn list_for_commitment(&self, commitment_id: Uuid) -> Result<Vec<Reminder>> {
        let sql = format!(
            r#"
            SELECT {REMINDER_COLUMNS}
            FROM reminders
            WHERE commitment_id = $1
            ORDER BY remind_at ASC, id ASC
            "#
        );

        let rows = sqlx::query(&sql)
            .bind(commitment_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(reminder_from_row).collect()
    }

    async fn mark_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE reminders
            SET sent_at = $2
            WHERE id = $1
              AND sent_at IS NULL
            "#,
        )
        .bind(id)
        .bind(sent_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to mark reminder {id} as sent"))?;

        Ok(result.rows_affected() == 1)
    }
}

fn commitment_from_row(row: &PgRow) -> Result<Commitment> {
    let status: String = row.try_get("status")?;
    let urgency: Option<String> = row.try_get("urgency")?;
    let channel_type: Option<String> = row.try_get("channel_type")?;

    Ok(Commitment {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        status: CommitmentStatus::parse(&status)?,
        urgency: urgency.as_deref().map(Urgency::parse).transpose()?,
        person: row.try_get("person")?,
        organization: row.try_get("organization")?,
        channel_type: channel_type.as_deref().map(ChannelType::parse).transpose()?,
        channel_title: row.try_get("channel_title")?,
        channel_link: row.try_get("channel_link")?,
        source_snippet: row.try_get("source_snippet")?,
        opened_at: row.try_get("opened_at")?,
        closed_at: row.try_get("closed_at")?,
        due_at: row.try_get("due_at")?,
        last_touched_at: row.try_get("last_touched_at")?,
    })
}

fn reminder_from_row(row: &PgRow) -> Result<Reminder> {
    Ok(Reminder {
        id: row.try_get("id")?,
        commitment_id: row.try_get("commitment_id")?,
        remind_at: row.try_get("remind_at")?,
        sent_at: row.try_get("sent_at")?,
        delivery_channel: row.try_get("delivery_channel")?,
        delivery_target: row.try_get("delivery_target")?,
        message: row.try_get("message")?,
    })
}

/// `%needle%` for ILIKE with the pattern metacharacters escaped. Blank
/// input yields `None` so the clause is skipped.
fn contains_pattern(value: Option<&str>) -> Option<String> {
    let value = value.map(str::trim).filter(|value| !value.is_empty())?;
    let mut pattern = String::with_capacity(value.len() + 2);
    pattern.push('%');
    for ch in value.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    Some(pattern)
}
