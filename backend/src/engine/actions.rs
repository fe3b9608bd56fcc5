// Workflow action definitions and parameter validation

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use leadflow_shared::{ReminderPriority, ReminderType};

use super::EngineError;

/// Agent assignment strategies. A `specific_agent` assignment without an
/// `agent_id` fails to deserialize, so malformed rules are rejected before
/// they are ever stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum AssignStrategy {
    RoundRobin,
    WorkloadBased,
    SpecificAgent { agent_id: Uuid },
}

/// One step of a rule's action sequence. The JSON wire shape tags each
/// action with a `type` field, e.g.
/// `{"type": "assign_agent", "strategy": "round_robin"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowAction {
    AssignAgent {
        #[serde(flatten)]
        strategy: AssignStrategy,
    },
    SendEmail {
        /// Recipient; `{{email}}` resolves to the lead's address.
        to: String,
        subject: String,
        /// Body template; `{{field}}` placeholders resolve against the lead.
        body: String,
    },
    CreateTask {
        title: String,
        #[serde(default)]
        description: Option<String>,
        /// Defaults to the lead's assigned agent when omitted.
        #[serde(default)]
        assigned_to: Option<Uuid>,
    },
    UpdateStatus {
        status: String,
    },
    CreateReminder {
        reminder_type: ReminderType,
        title: String,
        due_in_hours: i64,
        #[serde(default)]
        priority: ReminderPriority,
        #[serde(default)]
        assigned_to: Option<Uuid>,
    },
    Escalate {
        escalate_to: Vec<Uuid>,
        message: String,
    },
}

/// Action discriminant, used for rule-type vocabulary checks and for
/// naming actions in execution results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    AssignAgent,
    SendEmail,
    CreateTask,
    UpdateStatus,
    CreateReminder,
    Escalate,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AssignAgent => "assign_agent",
            Self::SendEmail => "send_email",
            Self::CreateTask => "create_task",
            Self::UpdateStatus => "update_status",
            Self::CreateReminder => "create_reminder",
            Self::Escalate => "escalate",
        }
    }
}

const LEAD_STATUSES: &[&str] = &["new", "contacted", "qualified", "converted", "lost"];

impl WorkflowAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::AssignAgent { .. } => ActionKind::AssignAgent,
            Self::SendEmail { .. } => ActionKind::SendEmail,
            Self::CreateTask { .. } => ActionKind::CreateTask,
            Self::UpdateStatus { .. } => ActionKind::UpdateStatus,
            Self::CreateReminder { .. } => ActionKind::CreateReminder,
            Self::Escalate { .. } => ActionKind::Escalate,
        }
    }

    /// Parameter checks that run before an execution enters the running
    /// state. Any failure here fails the whole execution without side
    /// effects.
    pub fn validate(&self) -> Result<(), EngineError> {
        match self {
            Self::AssignAgent { .. } => Ok(()),
            Self::SendEmail { to, subject, .. } => {
                if to.trim().is_empty() {
                    return Err(EngineError::InvalidParameters(
                        "send_email requires a recipient".into(),
                    ));
                }
                if subject.trim().is_empty() {
                    return Err(EngineError::InvalidParameters(
                        "send_email requires a subject".into(),
                    ));
                }
                Ok(())
            }
            Self::CreateTask { title, .. } => {
                if title.trim().is_empty() {
                    return Err(EngineError::InvalidParameters(
                        "create_task requires a title".into(),
                    ));
                }
                Ok(())
            }
            Self::UpdateStatus { status } => {
                if !LEAD_STATUSES.contains(&status.as_str()) {
                    return Err(EngineError::InvalidParameters(format!(
                        "unknown lead status '{status}'"
                    )));
                }
                Ok(())
            }
            Self::CreateReminder { title, due_in_hours, .. } => {
                if title.trim().is_empty() {
                    return Err(EngineError::InvalidParameters(
                        "create_reminder requires a title".into(),
                    ));
                }
                if *due_in_hours <= 0 {
                    return Err(EngineError::InvalidParameters(
                        "create_reminder due_in_hours must be positive".into(),
                    ));
                }
                Ok(())
            }
            Self::Escalate { escalate_to, .. } => {
                if escalate_to.is_empty() {
                    return Err(EngineError::InvalidParameters(
                        "escalate requires at least one recipient".into(),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Outcome of one executed action, recorded in the execution's result data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub action: String,
    pub output: serde_json::Value,
    pub duration_ms: u64,
}
