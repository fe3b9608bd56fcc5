use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use leadflow_shared::{ExecutionStatus, WorkflowExecution};

use crate::error::{ApiResult, AppError};
use crate::AppState;

#[derive(Deserialize)]
pub struct ExecutionQuery {
    pub lead_id: Option<Uuid>,
    pub rule_id: Option<Uuid>,
    pub status: Option<ExecutionStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Read-only audit surface over workflow executions.
pub fn execution_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_executions))
        .route("/:id", get(get_execution))
}

async fn list_executions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ExecutionQuery>,
) -> ApiResult<Json<Vec<WorkflowExecution>>> {
    let limit = params.limit.unwrap_or(50).clamp(1, 200);
    let offset = params.offset.unwrap_or(0).max(0);

    let executions = sqlx::query_as::<_, WorkflowExecution>(
        "SELECT * FROM workflow_executions
         WHERE ($1::uuid IS NULL OR lead_id = $1)
           AND ($2::uuid IS NULL OR rule_id = $2)
           AND ($3::execution_status IS NULL OR status = $3)
         ORDER BY started_at DESC
         LIMIT $4 OFFSET $5",
    )
    .bind(params.lead_id)
    .bind(params.rule_id)
    .bind(params.status)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(executions))
}

async fn get_execution(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WorkflowExecution>> {
    let execution =
        sqlx::query_as::<_, WorkflowExecution>("SELECT * FROM workflow_executions WHERE id = $1")
            .bind(id)
            .fetch_optional(&state.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Execution".to_string()))?;
    Ok(Json(execution))
}
