// Postgres-backed implementations of the engine collaborator traits

pub mod agents;
pub mod escalations;
pub mod executions;
pub mod leads;
pub mod reminders;
pub mod rules;

pub use agents::PgAgentPool;
pub use escalations::PgEscalationStore;
pub use executions::PgExecutionLog;
pub use leads::PgLeadProvider;
pub use reminders::PgReminderStore;
pub use rules::PgRuleStore;
