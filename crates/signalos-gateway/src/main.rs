use std::{net::SocketAddr, sync::Arc};

use anyhow::Result;
use signalos_gateway::{AppState, build_router};
use signalos_platform::{
    PgCommitmentStore, PgReminderStore, ServiceConfig, connect_database, notifier_from_config,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "signalos_gateway=info,signalos_services=info".to_string()),
        )
        .init();

    let config = ServiceConfig::from_env("0.0.0.0:8300")?;
    let pool = connect_database(&config.database_url).await?;
    let notifier = notifier_from_config(&config)?;

    let state = AppState::new(
        Arc::new(PgCommitmentStore::new(pool.clone())),
        Arc::new(PgReminderStore::new(pool)),
        notifier,
        config.reminders.clone(),
        &config.api_key,
    );
    let router = build_router(state);

    let addr: SocketAddr = config.http_addr.parse()?;
    info!("signal gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
