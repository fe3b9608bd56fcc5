use async_trait::async_trait;
use sqlx::PgPool;

use leadflow_shared::WorkflowExecution;

use crate::engine::{EngineError, ExecutionLog};

pub struct PgExecutionLog {
    pool: PgPool,
}

impl PgExecutionLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExecutionLog for PgExecutionLog {
    async fn append(&self, execution: &WorkflowExecution) -> Result<(), EngineError> {
        sqlx::query(
            "INSERT INTO workflow_executions
             (id, rule_id, lead_id, status, started_at, completed_at, error_message, result_data)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(execution.id)
        .bind(execution.rule_id)
        .bind(execution.lead_id)
        .bind(execution.status)
        .bind(execution.started_at)
        .bind(execution.completed_at)
        .bind(&execution.error_message)
        .bind(&execution.result_data)
        .execute(&self.pool)
        .await
        .map_err(EngineError::collaborator)?;
        Ok(())
    }

    async fn update(&self, execution: &WorkflowExecution) -> Result<(), EngineError> {
        sqlx::query(
            "UPDATE workflow_executions
             SET status = $2, completed_at = $3, error_message = $4, result_data = $5
             WHERE id = $1",
        )
        .bind(execution.id)
        .bind(execution.status)
        .bind(execution.completed_at)
        .bind(&execution.error_message)
        .bind(&execution.result_data)
        .execute(&self.pool)
        .await
        .map_err(EngineError::collaborator)?;
        Ok(())
    }
}
