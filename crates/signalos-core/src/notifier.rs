use async_trait::async_trait;

/// Outbound delivery channel for reminder messages.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, target: &str, message: &str, channel: &str) -> anyhow::Result<()>;
}
