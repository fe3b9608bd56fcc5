use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::engine::escalation::{EscalationRule, EscalationTrigger};
use crate::engine::EngineError;

/// One lead's progress through an escalation rule. `levels_fired` is the
/// persisted counterpart of the pure tick function's input.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EscalationState {
    pub id: Uuid,
    pub escalation_rule_id: Uuid,
    pub lead_id: Uuid,
    pub triggered_at: DateTime<Utc>,
    pub levels_fired: Vec<i32>,
    pub completed: bool,
}

pub struct PgEscalationStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct EscalationRuleRow {
    id: Uuid,
    name: String,
    trigger_condition: String,
    escalation_levels: serde_json::Value,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl EscalationRuleRow {
    fn into_rule(self) -> Result<EscalationRule, EngineError> {
        let trigger: EscalationTrigger =
            serde_json::from_value(serde_json::Value::String(self.trigger_condition))
                .map_err(EngineError::collaborator)?;
        Ok(EscalationRule {
            id: self.id,
            name: self.name,
            trigger_condition: trigger,
            escalation_levels: serde_json::from_value(self.escalation_levels)
                .map_err(EngineError::collaborator)?,
            is_active: self.is_active,
            created_at: self.created_at,
        })
    }
}

fn trigger_tag(trigger: EscalationTrigger) -> Result<String, EngineError> {
    let tag = serde_json::to_string(&trigger).map_err(EngineError::collaborator)?;
    Ok(tag.trim_matches('"').to_string())
}

const ESCALATION_RULE_COLUMNS: &str =
    "id, name, trigger_condition, escalation_levels, is_active, created_at";

impl PgEscalationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_rules(&self, only_active: bool) -> Result<Vec<EscalationRule>, EngineError> {
        let rows = sqlx::query_as::<_, EscalationRuleRow>(&format!(
            "SELECT {ESCALATION_RULE_COLUMNS} FROM escalation_rules
             WHERE is_active OR NOT $1
             ORDER BY created_at ASC"
        ))
        .bind(only_active)
        .fetch_all(&self.pool)
        .await
        .map_err(EngineError::collaborator)?;

        rows.into_iter().map(EscalationRuleRow::into_rule).collect()
    }

    pub async fn get_rule(&self, id: Uuid) -> Result<Option<EscalationRule>, EngineError> {
        let row = sqlx::query_as::<_, EscalationRuleRow>(&format!(
            "SELECT {ESCALATION_RULE_COLUMNS} FROM escalation_rules WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(EngineError::collaborator)?;

        row.map(EscalationRuleRow::into_rule).transpose()
    }

    pub async fn create_rule(&self, rule: &EscalationRule) -> Result<(), EngineError> {
        sqlx::query(
            "INSERT INTO escalation_rules
             (id, name, trigger_condition, escalation_levels, is_active, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(rule.id)
        .bind(&rule.name)
        .bind(trigger_tag(rule.trigger_condition)?)
        .bind(serde_json::to_value(&rule.escalation_levels).map_err(EngineError::collaborator)?)
        .bind(rule.is_active)
        .bind(rule.created_at)
        .execute(&self.pool)
        .await
        .map_err(EngineError::collaborator)?;
        Ok(())
    }

    pub async fn set_rule_active(&self, id: Uuid, is_active: bool) -> Result<bool, EngineError> {
        let result = sqlx::query("UPDATE escalation_rules SET is_active = $2 WHERE id = $1")
            .bind(id)
            .bind(is_active)
            .execute(&self.pool)
            .await
            .map_err(EngineError::collaborator)?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_rule(&self, id: Uuid) -> Result<bool, EngineError> {
        let result = sqlx::query("DELETE FROM escalation_rules WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(EngineError::collaborator)?;
        Ok(result.rows_affected() > 0)
    }

    /// Opens an escalation for a lead unless one already exists for the
    /// same rule. Idempotent under repeated checker passes; returns true
    /// only when this call created the state.
    pub async fn open_state(
        &self,
        rule_id: Uuid,
        lead_id: Uuid,
        triggered_at: DateTime<Utc>,
    ) -> Result<bool, EngineError> {
        let result = sqlx::query(
            "INSERT INTO escalation_state (id, escalation_rule_id, lead_id, triggered_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (escalation_rule_id, lead_id) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(rule_id)
        .bind(lead_id)
        .bind(triggered_at)
        .execute(&self.pool)
        .await
        .map_err(EngineError::collaborator)?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn open_states(&self) -> Result<Vec<EscalationState>, EngineError> {
        sqlx::query_as::<_, EscalationState>(
            "SELECT id, escalation_rule_id, lead_id, triggered_at, levels_fired, completed
             FROM escalation_state WHERE NOT completed",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(EngineError::collaborator)
    }

    /// Records a fired level with a compare-and-set on `levels_fired`.
    /// Returns false when another tick won the race, in which case the
    /// caller must not apply the level's side effects again.
    pub async fn mark_level_fired(
        &self,
        state_id: Uuid,
        expected_fired: &[i32],
        level: i32,
        completed: bool,
    ) -> Result<bool, EngineError> {
        let mut fired = expected_fired.to_vec();
        fired.push(level);
        let result = sqlx::query(
            "UPDATE escalation_state
             SET levels_fired = $2, completed = $3
             WHERE id = $1 AND levels_fired = $4",
        )
        .bind(state_id)
        .bind(&fired)
        .bind(completed)
        .bind(expected_fired)
        .execute(&self.pool)
        .await
        .map_err(EngineError::collaborator)?;
        Ok(result.rows_affected() > 0)
    }
}
