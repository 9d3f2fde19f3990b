pub mod config;
pub mod contracts;
pub mod db;
pub mod notifier;
pub mod pg_store;
pub mod redis_bus;

pub use config::{DEV_API_KEY, ServiceConfig};
pub use contracts::{
    CloseCommitmentRequest, CommitmentQuery, CreateReminderRequest, ErrorResponse,
    HealthResponse, OpenCommitmentRequest, OutboundMessage, UpdateCommitmentRequest,
};
pub use db::connect_database;
pub use notifier::{LogNotifier, RedisNotifier, notifier_from_config};
pub use pg_store::{PgCommitmentStore, PgReminderStore};
pub use redis_bus::RedisBus;
