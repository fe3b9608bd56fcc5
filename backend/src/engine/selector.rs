// Rule selection: which rules fire for a lead record

use serde_json::Value;

use super::conditions::evaluate_conditions;
use super::rules::{RuleType, WorkflowRule};

/// Selects every rule that should fire for a lead record.
///
/// Candidates are the active rules of the requested type, visited in
/// priority order (highest first, creation time as the tiebreak so older
/// rules win at equal priority). All matching rules are returned; one match
/// never shadows another.
pub fn select_rules<'a>(
    rules: &'a [WorkflowRule],
    rule_type: RuleType,
    record: &Value,
) -> Vec<&'a WorkflowRule> {
    let mut candidates: Vec<&WorkflowRule> = rules
        .iter()
        .filter(|rule| rule.is_active && rule.rule_type == rule_type)
        .collect();
    candidates.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
    candidates
        .into_iter()
        .filter(|rule| evaluate_conditions(&rule.conditions, record))
        .collect()
}
