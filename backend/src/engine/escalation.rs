// Escalation rules: time-ordered level sequences for stalled leads

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use leadflow_shared::Lead;

use super::EngineError;

/// Account balance from which a lead counts as high value.
const HIGH_VALUE_BALANCE: i64 = 10_000;

/// Lead situations that start an escalation. The checker job opens an
/// escalation state for every open lead whose current state matches an
/// active rule's trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationTrigger {
    NoContact24h,
    NoContact48h,
    KycStalled72h,
    HighValueInactive,
}

impl EscalationTrigger {
    /// Whether `lead` is currently in the situation this trigger names.
    /// Closed leads (converted or lost) never trigger. A lead that was
    /// never contacted counts from its creation time.
    pub fn matches(&self, lead: &Lead, now: DateTime<Utc>) -> bool {
        if lead.status == "converted" || lead.status == "lost" {
            return false;
        }
        let last_contact = lead.last_contact_at.unwrap_or(lead.created_at);
        match self {
            Self::NoContact24h => now - last_contact >= Duration::hours(24),
            Self::NoContact48h => now - last_contact >= Duration::hours(48),
            Self::KycStalled72h => {
                !matches!(lead.kyc_status.as_str(), "approved" | "rejected")
                    && now - lead.created_at >= Duration::hours(72)
            }
            Self::HighValueInactive => {
                lead.balance >= Decimal::from(HIGH_VALUE_BALANCE)
                    && now - last_contact >= Duration::hours(24)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationAction {
    /// Email the level's recipients.
    Notify,
    /// Reassign the lead to the first recipient and email the rest.
    Reassign,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationLevel {
    /// 1-based position in the sequence.
    pub level: i32,
    /// Hours after the previous level (or after the trigger, for level 1).
    pub delay_hours: i64,
    pub action: EscalationAction,
    pub escalate_to: Vec<Uuid>,
    /// `{{field}}` placeholders resolve against the lead record.
    pub message_template: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationRule {
    pub id: Uuid,
    pub name: String,
    pub trigger_condition: EscalationTrigger,
    pub escalation_levels: Vec<EscalationLevel>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl EscalationRule {
    /// Builds a rule, rejecting level sequences that are not 1-based and
    /// contiguous. Level order is meaningful (notify before reassign), so
    /// a malformed sequence is an error rather than something to reorder.
    pub fn new(
        name: &str,
        trigger_condition: EscalationTrigger,
        escalation_levels: Vec<EscalationLevel>,
    ) -> Result<Self, EngineError> {
        validate_levels(&escalation_levels)?;
        Ok(Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            trigger_condition,
            escalation_levels,
            is_active: true,
            created_at: Utc::now(),
        })
    }

    /// Due date of a level, counted from when the escalation triggered.
    /// Delays are cumulative: level k is due after the sum of the delays
    /// of levels 1 through k.
    pub fn level_due_at(&self, level: i32, triggered_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut cumulative = 0i64;
        for l in &self.escalation_levels {
            cumulative += l.delay_hours;
            if l.level == level {
                return Some(triggered_at + Duration::hours(cumulative));
            }
        }
        None
    }
}

pub fn validate_levels(levels: &[EscalationLevel]) -> Result<(), EngineError> {
    for (index, level) in levels.iter().enumerate() {
        if level.level != index as i32 + 1 {
            return Err(EngineError::InvalidEscalationLevels(format!(
                "expected level {} at position {}, found level {}",
                index + 1,
                index,
                level.level
            )));
        }
        if level.delay_hours < 0 {
            return Err(EngineError::InvalidEscalationLevels(format!(
                "level {} has a negative delay",
                level.level
            )));
        }
        if level.escalate_to.is_empty() {
            return Err(EngineError::InvalidEscalationLevels(format!(
                "level {} has no recipients",
                level.level
            )));
        }
    }
    Ok(())
}

/// Returns the levels newly due at `now` for an escalation triggered at
/// `triggered_at`, given the levels that already fired.
///
/// Pure: persistence of `levels_fired` is the caller's job (the checker
/// job uses a compare-and-set so concurrent ticks cannot double-fire).
/// Levels advance strictly in order: a level whose time has come is still
/// held back until its predecessor has fired, so at most one level is
/// returned per tick and re-ticking with the same inputs never returns an
/// already-fired level again.
pub fn tick<'a>(
    rule: &'a EscalationRule,
    triggered_at: DateTime<Utc>,
    now: DateTime<Utc>,
    levels_fired: &[i32],
) -> Vec<&'a EscalationLevel> {
    if !rule.is_active {
        return Vec::new();
    }

    let mut cumulative = 0i64;
    for level in &rule.escalation_levels {
        cumulative += level.delay_hours;
        if levels_fired.contains(&level.level) {
            continue;
        }
        let predecessor_fired =
            level.level == 1 || levels_fired.contains(&(level.level - 1));
        let due = now >= triggered_at + Duration::hours(cumulative);
        if predecessor_fired && due {
            return vec![level];
        }
        // the first unfired level gates everything after it
        return Vec::new();
    }
    Vec::new()
}
