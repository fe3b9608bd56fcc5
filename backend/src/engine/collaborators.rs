// Engine collaborator traits, implemented by the Postgres stores in
// production and by in-memory fakes in tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use leadflow_shared::{
    Agent, FollowUpReminder, Lead, LeadTask, ReminderPriority, ReminderType, WorkflowExecution,
};

use super::rules::{RuleType, WorkflowRule};
use super::EngineError;

#[async_trait]
pub trait RuleStore: Send + Sync {
    async fn list_rules(&self, rule_type: Option<RuleType>) -> Result<Vec<WorkflowRule>, EngineError>;
    async fn get_rule(&self, id: Uuid) -> Result<Option<WorkflowRule>, EngineError>;
    async fn create_rule(&self, rule: &WorkflowRule) -> Result<(), EngineError>;
    async fn update_rule(&self, rule: &WorkflowRule) -> Result<(), EngineError>;
    async fn delete_rule(&self, id: Uuid) -> Result<bool, EngineError>;
}

#[async_trait]
pub trait LeadProvider: Send + Sync {
    async fn get_lead(&self, id: Uuid) -> Result<Option<Lead>, EngineError>;
    /// Leads still in play, that is not converted and not lost. The
    /// escalation checker scans these for matching triggers.
    async fn open_leads(&self) -> Result<Vec<Lead>, EngineError>;
    async fn assign_agent(&self, lead_id: Uuid, agent_id: Uuid) -> Result<(), EngineError>;
    async fn update_status(&self, lead_id: Uuid, status: &str) -> Result<(), EngineError>;
    async fn create_task(&self, task: &LeadTask) -> Result<(), EngineError>;
}

#[async_trait]
pub trait AgentPool: Send + Sync {
    async fn get_agent(&self, id: Uuid) -> Result<Option<Agent>, EngineError>;
    /// Next active agent in rotation order. Advances the rotation cursor.
    async fn next_round_robin_agent(&self) -> Result<Agent, EngineError>;
    /// Active agent with the fewest currently assigned leads.
    async fn least_loaded_agent(&self) -> Result<Agent, EngineError>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), EngineError>;
}

#[derive(Debug, Clone)]
pub struct NewReminder {
    pub lead_id: Uuid,
    pub assigned_to: Uuid,
    pub reminder_type: ReminderType,
    pub title: String,
    pub due_date: DateTime<Utc>,
    pub priority: ReminderPriority,
}

#[async_trait]
pub trait ReminderStore: Send + Sync {
    async fn create_reminder(&self, reminder: NewReminder) -> Result<FollowUpReminder, EngineError>;
}

/// Persistence of execution audit records. `append` writes the initial
/// pending row; `update` persists each later status transition.
#[async_trait]
pub trait ExecutionLog: Send + Sync {
    async fn append(&self, execution: &WorkflowExecution) -> Result<(), EngineError>;
    async fn update(&self, execution: &WorkflowExecution) -> Result<(), EngineError>;
}
