// Background jobs: periodic escalation and reminder processing

pub mod escalation_checker;
pub mod reminder_checker;
pub mod scheduler;

pub use escalation_checker::{EscalationCheckResult, EscalationCheckerJob};
pub use reminder_checker::{ReminderCheckResult, ReminderCheckerJob};
pub use scheduler::{JobError, JobExecutionLog, JobResult, JobScheduler, JobStatus};
