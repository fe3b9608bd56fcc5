// Condition evaluation against a flat lead record

use serde_json::Value;

use super::rules::{ConditionLogic, ConditionOperator, WorkflowCondition};

/// Evaluates a rule's condition sequence against a lead record.
///
/// Conditions fold strictly left to right: the accumulated result so far is
/// combined with the next condition using the previous condition's `logic`.
/// There is no short-circuiting and no operator precedence, so
/// `a AND b OR c` reads as `(a AND b) OR c`.
///
/// An empty sequence always matches.
pub fn evaluate_conditions(conditions: &[WorkflowCondition], record: &Value) -> bool {
    let mut iter = conditions.iter();
    let Some(first) = iter.next() else {
        return true;
    };

    let mut result = evaluate_condition(first, record);
    let mut logic = first.logic;
    for condition in iter {
        let matched = evaluate_condition(condition, record);
        result = match logic {
            ConditionLogic::And => result && matched,
            ConditionLogic::Or => result || matched,
        };
        logic = condition.logic;
    }
    result
}

/// Evaluates a single condition. A field absent from the record (or present
/// as JSON null) makes every operator evaluate to false, including
/// `not_equals` and `not_in`: absence is never evidence.
pub fn evaluate_condition(condition: &WorkflowCondition, record: &Value) -> bool {
    let Some(field_value) = record.get(&condition.field) else {
        return false;
    };
    if field_value.is_null() {
        return false;
    }

    match condition.operator {
        ConditionOperator::Equals => values_equal(field_value, &condition.value),
        ConditionOperator::NotEquals => !values_equal(field_value, &condition.value),
        ConditionOperator::Contains => match (field_value, &condition.value) {
            (Value::String(haystack), Value::String(needle)) => haystack.contains(needle.as_str()),
            (Value::Array(items), needle) => items.iter().any(|item| values_equal(item, needle)),
            _ => false,
        },
        ConditionOperator::GreaterThan => match (field_value.as_f64(), condition.value.as_f64()) {
            (Some(field), Some(operand)) => field > operand,
            _ => false,
        },
        ConditionOperator::LessThan => match (field_value.as_f64(), condition.value.as_f64()) {
            (Some(field), Some(operand)) => field < operand,
            _ => false,
        },
        ConditionOperator::In => match &condition.value {
            Value::Array(options) => options.iter().any(|option| values_equal(field_value, option)),
            _ => false,
        },
        ConditionOperator::NotIn => match &condition.value {
            Value::Array(options) => {
                !options.iter().any(|option| values_equal(field_value, option))
            }
            _ => false,
        },
    }
}

/// Equality with numeric awareness: `5` and `5.0` compare equal, but a
/// number never equals a string.
fn values_equal(a: &Value, b: &Value) -> bool {
    if a.is_number() && b.is_number() {
        return a.as_f64() == b.as_f64();
    }
    a == b
}
