pub mod commitments;
pub mod poller;
pub mod reminders;

pub use commitments::CommitmentService;
pub use poller::{DispatchCycle, PollHandle, PollLoop};
pub use reminders::{DispatchFailure, DispatchReport, ReminderService, ReminderSettings};
