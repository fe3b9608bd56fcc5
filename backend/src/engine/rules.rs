// Workflow rule model - condition/action pairs driving lead automation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::actions::{ActionKind, WorkflowAction};
use super::EngineError;

/// Rule categories. The type of a rule determines which action vocabulary
/// is legal and which lead events consider the rule for selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "rule_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    LeadAssignment,
    EmailAutomation,
    FollowUp,
    Escalation,
}

impl RuleType {
    /// Action vocabulary legal for this rule type. Notification and
    /// bookkeeping actions are shared; the signature action of each type
    /// is exclusive to it.
    pub fn allows(&self, kind: ActionKind) -> bool {
        match self {
            Self::LeadAssignment => matches!(
                kind,
                ActionKind::AssignAgent | ActionKind::SendEmail | ActionKind::CreateTask
            ),
            Self::EmailAutomation => matches!(
                kind,
                ActionKind::SendEmail | ActionKind::UpdateStatus | ActionKind::CreateTask
            ),
            Self::FollowUp => matches!(
                kind,
                ActionKind::CreateReminder | ActionKind::SendEmail | ActionKind::CreateTask
            ),
            Self::Escalation => matches!(
                kind,
                ActionKind::Escalate
                    | ActionKind::AssignAgent
                    | ActionKind::SendEmail
                    | ActionKind::CreateReminder
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    GreaterThan,
    LessThan,
    In,
    NotIn,
}

/// How a condition combines with the *next* condition in the sequence.
/// The value on the last condition is ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionLogic {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowCondition {
    /// Lead attribute to test (e.g. `country`, `status`, `balance`).
    pub field: String,
    pub operator: ConditionOperator,
    /// Comparison operand; a scalar for most operators, an array for
    /// `in`/`not_in`.
    pub value: serde_json::Value,
    #[serde(default)]
    pub logic: ConditionLogic,
}

impl WorkflowCondition {
    pub fn new(field: &str, operator: ConditionOperator, value: serde_json::Value) -> Self {
        Self {
            field: field.to_string(),
            operator,
            value,
            logic: ConditionLogic::And,
        }
    }

    pub fn equals(field: &str, value: serde_json::Value) -> Self {
        Self::new(field, ConditionOperator::Equals, value)
    }

    pub fn not_equals(field: &str, value: serde_json::Value) -> Self {
        Self::new(field, ConditionOperator::NotEquals, value)
    }

    pub fn contains(field: &str, value: &str) -> Self {
        Self::new(field, ConditionOperator::Contains, serde_json::Value::String(value.to_string()))
    }

    pub fn greater_than(field: &str, value: f64) -> Self {
        Self::new(field, ConditionOperator::GreaterThan, serde_json::json!(value))
    }

    pub fn less_than(field: &str, value: f64) -> Self {
        Self::new(field, ConditionOperator::LessThan, serde_json::json!(value))
    }

    pub fn in_list(field: &str, values: Vec<serde_json::Value>) -> Self {
        Self::new(field, ConditionOperator::In, serde_json::Value::Array(values))
    }

    pub fn or(mut self) -> Self {
        self.logic = ConditionLogic::Or;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRule {
    pub id: Uuid,
    pub name: String,
    pub rule_type: RuleType,
    /// Empty conditions means the rule always matches.
    pub conditions: Vec<WorkflowCondition>,
    /// Empty actions is a legal no-op, not an error.
    pub actions: Vec<WorkflowAction>,
    pub is_active: bool,
    /// Higher priority rules are evaluated first within a type.
    pub priority: i32,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl WorkflowRule {
    pub fn new(name: &str, rule_type: RuleType) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            rule_type,
            conditions: Vec::new(),
            actions: Vec::new(),
            is_active: true,
            priority: 0,
            created_by: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    pub fn with_conditions(mut self, conditions: Vec<WorkflowCondition>) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn with_actions(mut self, actions: Vec<WorkflowAction>) -> Self {
        self.actions = actions;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Structural validation applied at create/update time: non-empty name
    /// and an action vocabulary legal for the rule type.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.name.trim().is_empty() {
            return Err(EngineError::InvalidParameters("rule name must not be empty".into()));
        }
        for action in &self.actions {
            let kind = action.kind();
            if !self.rule_type.allows(kind) {
                return Err(EngineError::InvalidParameters(format!(
                    "action '{}' is not legal for rule type '{:?}'",
                    kind.as_str(),
                    self.rule_type
                )));
            }
            action.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::actions::AssignStrategy;

    #[test]
    fn condition_builders() {
        let cond = WorkflowCondition::equals("country", serde_json::json!("US"));
        assert_eq!(cond.field, "country");
        assert_eq!(cond.operator, ConditionOperator::Equals);
        assert_eq!(cond.logic, ConditionLogic::And);

        let cond = WorkflowCondition::greater_than("balance", 1000.0).or();
        assert_eq!(cond.logic, ConditionLogic::Or);
    }

    #[test]
    fn rule_type_gates_action_vocabulary() {
        let rule = WorkflowRule::new("auto-assign", RuleType::LeadAssignment).with_actions(vec![
            WorkflowAction::AssignAgent { strategy: AssignStrategy::RoundRobin },
        ]);
        assert!(rule.validate().is_ok());

        let rule = WorkflowRule::new("auto-assign", RuleType::EmailAutomation).with_actions(vec![
            WorkflowAction::AssignAgent { strategy: AssignStrategy::RoundRobin },
        ]);
        assert!(rule.validate().is_err());
    }

    #[test]
    fn empty_name_is_rejected() {
        let rule = WorkflowRule::new("  ", RuleType::FollowUp);
        assert!(rule.validate().is_err());
    }

    #[test]
    fn condition_serde_round_trip() {
        let json = serde_json::json!({
            "field": "kyc_status",
            "operator": "not_equals",
            "value": "approved",
            "logic": "or"
        });
        let cond: WorkflowCondition = serde_json::from_value(json).unwrap();
        assert_eq!(cond.operator, ConditionOperator::NotEquals);
        assert_eq!(cond.logic, ConditionLogic::Or);

        // logic defaults to `and` when omitted
        let json = serde_json::json!({
            "field": "country",
            "operator": "equals",
            "value": "US"
        });
        let cond: WorkflowCondition = serde_json::from_value(json).unwrap();
        assert_eq!(cond.logic, ConditionLogic::And);
    }
}
