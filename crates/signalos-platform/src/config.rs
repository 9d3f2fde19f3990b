use std::time::Duration;

use anyhow::{Context, Result};
use signalos_services::{
    ReminderSettings,
    reminders::{DEFAULT_DELIVERY_CHANNEL, DEFAULT_DELIVERY_TARGET},
};
use tracing::warn;

pub const DEV_API_KEY: &str = "dev-key-change-me";

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub database_url: String,
    /// When set, reminders are delivered through Redis instead of the log.
    pub redis_url: Option<String>,
    pub http_addr: String,
    pub api_key: String,
    pub worker_interval: Duration,
    pub reminders: ReminderSettings,
}

impl ServiceConfig {
    pub fn from_env(default_http_addr: &str) -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is required")?;
        let http_addr =
            std::env::var("HTTP_ADDR").unwrap_or_else(|_| default_http_addr.to_string());
        let api_key = std::env::var("AGENT_API_KEY").unwrap_or_else(|_| {
            warn!("AGENT_API_KEY is not set; using the development key");
            DEV_API_KEY.to_string()
        });

        Ok(Self {
            database_url,
            redis_url: optional_var("REDIS_URL"),
            http_addr,
            api_key,
            worker_interval: worker_interval_from_env()?,
            reminders: reminder_settings_from_env()?,
        })
    }

    pub fn worker_from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is required")?;

        Ok(Self {
            database_url,
            redis_url: optional_var("REDIS_URL"),
            http_addr: String::new(),
            api_key: String::new(),
            worker_interval: worker_interval_from_env()?,
            reminders: reminder_settings_from_env()?,
        })
    }
}

fn worker_interval_from_env() -> Result<Duration> {
    let seconds = parse_seconds("WORKER_INTERVAL", 60)?;
    if seconds == 0 {
        anyhow::bail!("WORKER_INTERVAL must be at least 1 second");
    }
    Ok(Duration::from_secs(seconds))
}

fn reminder_settings_from_env() -> Result<ReminderSettings> {
    Ok(ReminderSettings {
        default_channel: optional_var("DEFAULT_DELIVERY_CHANNEL")
            .unwrap_or_else(|| DEFAULT_DELIVERY_CHANNEL.to_string()),
        default_target: optional_var("DEFAULT_DELIVERY_TARGET")
            .unwrap_or_else(|| DEFAULT_DELIVERY_TARGET.to_string()),
        send_timeout: Duration::from_secs(parse_seconds("NOTIFIER_TIMEOUT_SECS", 10)?),
    })
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_seconds(name: &str, default: u64) -> Result<u64> {
    match optional_var(name) {
        Some(raw) => raw
            .parse::<u64>()
            .with_context(|| format!("{name} must be a whole number of seconds, got {raw:?}")),
        None => Ok(default),
    }
}
