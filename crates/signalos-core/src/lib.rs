pub mod error;
pub mod models;
pub mod notifier;
pub mod query;
pub mod storage;

pub use error::{Result, SignalError};
pub use models::{
    ChannelType, CloseTarget, Commitment, CommitmentPatch, CommitmentStatus, CommitmentView,
    NewCommitment, NewReminder, Reminder, Urgency, parse_timestamp,
};
pub use notifier::Notifier;
pub use query::{CommitmentFilter, pick_title_match};
pub use storage::{CommitmentStore, ReminderStore};
