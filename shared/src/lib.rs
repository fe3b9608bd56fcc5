use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub country: String,
    pub status: String, // new, contacted, qualified, converted, lost
    pub kyc_status: String, // not_started, pending, approved, rejected
    pub balance: Decimal,
    pub assigned_agent: Option<Uuid>,
    pub source: Option<String>,
    pub last_contact_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Lead {
    /// Flat JSON view of the lead that workflow conditions evaluate against.
    /// The balance is exposed as a plain number so numeric operators work.
    pub fn to_record(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "first_name": self.first_name,
            "last_name": self.last_name,
            "email": self.email,
            "phone": self.phone,
            "country": self.country,
            "status": self.status,
            "kyc_status": self.kyc_status,
            "balance": self.balance.to_f64(),
            "assigned_agent": self.assigned_agent,
            "source": self.source,
            "last_contact_at": self.last_contact_at,
            "created_at": self.created_at,
        })
    }
}

#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Agent {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A task created for an agent against a lead (target of the `create_task`
/// workflow action).
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadTask {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub assigned_to: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub status: String, // open, done
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl LeadTask {
    pub fn new(lead_id: Uuid, assigned_to: Option<Uuid>, title: &str, description: Option<&str>) -> Self {
        Self {
            id: Uuid::new_v4(),
            lead_id,
            assigned_to,
            title: title.to_string(),
            description: description.map(|d| d.to_string()),
            status: "open".to_string(),
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "reminder_type", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ReminderType {
    Call,
    Email,
    Meeting,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "reminder_status", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ReminderStatus {
    Pending,
    Completed,
    Overdue,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "reminder_priority", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ReminderPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUpReminder {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub assigned_to: Uuid,
    pub reminder_type: ReminderType,
    pub title: String,
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
    pub status: ReminderStatus,
    pub priority: ReminderPriority,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl FollowUpReminder {
    pub fn new(
        lead_id: Uuid,
        assigned_to: Uuid,
        reminder_type: ReminderType,
        title: &str,
        due_date: DateTime<Utc>,
        priority: ReminderPriority,
        created_by: Option<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            lead_id,
            assigned_to,
            reminder_type,
            title: title.to_string(),
            description: None,
            due_date,
            status: ReminderStatus::Pending,
            priority,
            created_by,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Overdue is a derived view: stored status stays `pending` until an
    /// explicit transition.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == ReminderStatus::Pending && now > self.due_date
    }

    /// Status as observed at `now`, with the derived overdue view applied.
    pub fn status_at(&self, now: DateTime<Utc>) -> ReminderStatus {
        if self.is_overdue(now) {
            ReminderStatus::Overdue
        } else {
            self.status
        }
    }

    /// `pending -> completed`. Returns false if the reminder already left
    /// the pending state.
    pub fn complete(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != ReminderStatus::Pending {
            return false;
        }
        self.status = ReminderStatus::Completed;
        self.completed_at = Some(now);
        true
    }

    /// `pending -> cancelled`. Returns false if the reminder already left
    /// the pending state.
    pub fn cancel(&mut self) -> bool {
        if self.status != ReminderStatus::Pending {
            return false;
        }
        self.status = ReminderStatus::Cancelled;
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "execution_status", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Audit record of one attempt to run a rule's actions against one lead.
/// Terminal states are absorbing; a retry is a new execution.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub id: Uuid,
    pub rule_id: Uuid,
    pub lead_id: Uuid,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub result_data: Option<serde_json::Value>,
}

impl WorkflowExecution {
    pub fn pending(rule_id: Uuid, lead_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            rule_id,
            lead_id,
            status: ExecutionStatus::Pending,
            started_at: Utc::now(),
            completed_at: None,
            error_message: None,
            result_data: None,
        }
    }

    pub fn start(&mut self) {
        if self.status == ExecutionStatus::Pending {
            self.status = ExecutionStatus::Running;
        }
    }

    pub fn complete(&mut self, result_data: serde_json::Value) {
        if self.status.is_terminal() {
            return;
        }
        self.status = ExecutionStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.result_data = Some(result_data);
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = ExecutionStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error_message = Some(error.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn reminder(due_in_hours: i64) -> FollowUpReminder {
        FollowUpReminder::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            ReminderType::Call,
            "Follow up on deposit",
            Utc::now() + Duration::hours(due_in_hours),
            ReminderPriority::High,
            None,
        )
    }

    #[test]
    fn reminder_overdue_is_derived() {
        let r = reminder(-2);
        let now = Utc::now();
        assert_eq!(r.status, ReminderStatus::Pending);
        assert!(r.is_overdue(now));
        assert_eq!(r.status_at(now), ReminderStatus::Overdue);

        let upcoming = reminder(2);
        assert!(!upcoming.is_overdue(now));
        assert_eq!(upcoming.status_at(now), ReminderStatus::Pending);
    }

    #[test]
    fn reminder_completion_sets_timestamp() {
        let mut r = reminder(1);
        let now = Utc::now();
        assert!(r.complete(now));
        assert_eq!(r.status, ReminderStatus::Completed);
        assert_eq!(r.completed_at, Some(now));

        // terminal: neither completion nor cancellation applies twice
        assert!(!r.complete(now));
        assert!(!r.cancel());
    }

    #[test]
    fn cancelled_reminder_never_reads_overdue() {
        let mut r = reminder(-5);
        assert!(r.cancel());
        assert_eq!(r.status_at(Utc::now()), ReminderStatus::Cancelled);
    }

    #[test]
    fn execution_lifecycle() {
        let mut exec = WorkflowExecution::pending(Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(exec.status, ExecutionStatus::Pending);

        exec.start();
        assert_eq!(exec.status, ExecutionStatus::Running);

        exec.complete(serde_json::json!([{"action": "send_email"}]));
        assert_eq!(exec.status, ExecutionStatus::Completed);
        assert!(exec.completed_at.is_some());

        // absorbing
        exec.fail("too late");
        assert_eq!(exec.status, ExecutionStatus::Completed);
        assert!(exec.error_message.is_none());
    }

    #[test]
    fn lead_record_exposes_numeric_balance() {
        let lead = Lead {
            id: Uuid::new_v4(),
            first_name: "Ada".into(),
            last_name: "Bell".into(),
            email: "ada@example.com".into(),
            phone: None,
            country: "US".into(),
            status: "new".into(),
            kyc_status: "pending".into(),
            balance: Decimal::new(150050, 2),
            assigned_agent: None,
            source: None,
            last_contact_at: None,
            created_at: Utc::now(),
            updated_at: None,
        };

        let record = lead.to_record();
        assert_eq!(record["country"], "US");
        assert_eq!(record["balance"].as_f64(), Some(1500.5));
        assert!(record["assigned_agent"].is_null());
    }
}
