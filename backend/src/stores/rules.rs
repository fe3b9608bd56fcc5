use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::engine::{EngineError, RuleStore, RuleType, WorkflowRule};

pub struct PgRuleStore {
    pool: PgPool,
}

impl PgRuleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Raw row shape: conditions and actions live in JSONB columns and are
/// decoded into their typed forms after the fetch.
#[derive(sqlx::FromRow)]
struct RuleRow {
    id: Uuid,
    name: String,
    rule_type: RuleType,
    conditions: serde_json::Value,
    actions: serde_json::Value,
    is_active: bool,
    priority: i32,
    created_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl RuleRow {
    fn into_rule(self) -> Result<WorkflowRule, EngineError> {
        Ok(WorkflowRule {
            id: self.id,
            name: self.name,
            rule_type: self.rule_type,
            conditions: serde_json::from_value(self.conditions)
                .map_err(EngineError::collaborator)?,
            actions: serde_json::from_value(self.actions).map_err(EngineError::collaborator)?,
            is_active: self.is_active,
            priority: self.priority,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const RULE_COLUMNS: &str =
    "id, name, rule_type, conditions, actions, is_active, priority, created_by, created_at, updated_at";

#[async_trait]
impl RuleStore for PgRuleStore {
    async fn list_rules(
        &self,
        rule_type: Option<RuleType>,
    ) -> Result<Vec<WorkflowRule>, EngineError> {
        let rows = sqlx::query_as::<_, RuleRow>(&format!(
            "SELECT {RULE_COLUMNS} FROM workflow_rules
             WHERE $1::rule_type IS NULL OR rule_type = $1
             ORDER BY priority DESC, created_at ASC"
        ))
        .bind(rule_type)
        .fetch_all(&self.pool)
        .await
        .map_err(EngineError::collaborator)?;

        rows.into_iter().map(RuleRow::into_rule).collect()
    }

    async fn get_rule(&self, id: Uuid) -> Result<Option<WorkflowRule>, EngineError> {
        let row = sqlx::query_as::<_, RuleRow>(&format!(
            "SELECT {RULE_COLUMNS} FROM workflow_rules WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(EngineError::collaborator)?;

        row.map(RuleRow::into_rule).transpose()
    }

    async fn create_rule(&self, rule: &WorkflowRule) -> Result<(), EngineError> {
        sqlx::query(
            "INSERT INTO workflow_rules
             (id, name, rule_type, conditions, actions, is_active, priority, created_by, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(rule.id)
        .bind(&rule.name)
        .bind(rule.rule_type)
        .bind(serde_json::to_value(&rule.conditions).map_err(EngineError::collaborator)?)
        .bind(serde_json::to_value(&rule.actions).map_err(EngineError::collaborator)?)
        .bind(rule.is_active)
        .bind(rule.priority)
        .bind(rule.created_by)
        .bind(rule.created_at)
        .execute(&self.pool)
        .await
        .map_err(EngineError::collaborator)?;
        Ok(())
    }

    async fn update_rule(&self, rule: &WorkflowRule) -> Result<(), EngineError> {
        sqlx::query(
            "UPDATE workflow_rules
             SET name = $2, rule_type = $3, conditions = $4, actions = $5,
                 is_active = $6, priority = $7, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(rule.id)
        .bind(&rule.name)
        .bind(rule.rule_type)
        .bind(serde_json::to_value(&rule.conditions).map_err(EngineError::collaborator)?)
        .bind(serde_json::to_value(&rule.actions).map_err(EngineError::collaborator)?)
        .bind(rule.is_active)
        .bind(rule.priority)
        .execute(&self.pool)
        .await
        .map_err(EngineError::collaborator)?;
        Ok(())
    }

    async fn delete_rule(&self, id: Uuid) -> Result<bool, EngineError> {
        let result = sqlx::query("DELETE FROM workflow_rules WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(EngineError::collaborator)?;
        Ok(result.rows_affected() > 0)
    }
}
