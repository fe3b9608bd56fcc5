pub mod escalations;
pub mod executions;
pub mod jobs;
pub mod leads;
pub mod reminders;
pub mod rules;

pub use escalations::escalation_rule_routes;
pub use executions::execution_routes;
pub use jobs::job_routes;
pub use leads::lead_routes;
pub use reminders::reminder_routes;
pub use rules::rule_routes;
