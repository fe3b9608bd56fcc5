// Lead lifecycle events that trigger workflow processing

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::rules::RuleType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadEventType {
    Created,
    Updated,
    Inactive,
}

impl LeadEventType {
    /// Rule types considered when this event fires, in processing order.
    pub fn rule_types(&self) -> &'static [RuleType] {
        match self {
            Self::Created => &[RuleType::LeadAssignment, RuleType::EmailAutomation],
            Self::Updated => &[RuleType::EmailAutomation],
            Self::Inactive => &[RuleType::FollowUp, RuleType::Escalation],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadEvent {
    pub lead_id: Uuid,
    pub event_type: LeadEventType,
}

impl LeadEvent {
    pub fn created(lead_id: Uuid) -> Self {
        Self { lead_id, event_type: LeadEventType::Created }
    }

    pub fn updated(lead_id: Uuid) -> Self {
        Self { lead_id, event_type: LeadEventType::Updated }
    }

    pub fn inactive(lead_id: Uuid) -> Self {
        Self { lead_id, event_type: LeadEventType::Inactive }
    }
}
