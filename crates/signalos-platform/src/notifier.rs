use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use signalos_core::Notifier;
use tracing::{info, warn};

use crate::config::ServiceConfig;
use crate::contracts::OutboundMessage;
use crate::redis_bus::RedisBus;

const LOG_PREVIEW_CHARS: usize = 200;

/// Redis delivery when `REDIS_URL` is configured, the log notifier otherwise.
pub fn notifier_from_config(config: &ServiceConfig) -> Result<Arc<dyn Notifier>> {
    match &config.redis_url {
        Some(redis_url) => {
            let bus = RedisBus::connect(redis_url)?;
            info!("delivering reminders through redis");
            Ok(Arc::new(RedisNotifier::new(bus)))
        }
        None => {
            warn!("REDIS_URL is not set; reminders are only logged");
            Ok(Arc::new(LogNotifier))
        }
    }
}

/// Publishes each message as [`OutboundMessage`] JSON on
/// `notifications.<channel>` for a delivery adapter to pick up.
#[derive(Clone)]
pub struct RedisNotifier {
    bus: RedisBus,
}

impl RedisNotifier {
    pub fn new(bus: RedisBus) -> Self {
        Self { bus }
    }

    pub fn topic(channel: &str) -> String {
        format!("notifications.{channel}")
    }
}

#[async_trait]
impl Notifier for RedisNotifier {
    async fn send(&self, target: &str, message: &str, channel: &str) -> Result<()> {
        let payload = OutboundMessage {
            channel: channel.to_string(),
            target: target.to_string(),
            message: message.to_string(),
            queued_at: Utc::now(),
        };
        let topic = Self::topic(channel);
        let receivers = self.bus.publish_json(&topic, &payload).await?;
        if receivers == 0 {
            // Nobody took the message; leave the reminder pending.
            bail!("no subscriber on {topic}");
        }
        Ok(())
    }
}

/// Development notifier that only writes the message to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn render(target: &str, message: &str, channel: &str) -> String {
        let preview: String = message.chars().take(LOG_PREVIEW_CHARS).collect();
        format!("[MOCK {channel}] To: {target} | Message: {preview}")
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, target: &str, message: &str, channel: &str) -> Result<()> {
        info!("{}", Self::render(target, message, channel));
        Ok(())
    }
}
