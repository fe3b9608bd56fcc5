use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::error::{ApiResult, AppError};
use crate::jobs::{JobError, JobExecutionLog};
use crate::AppState;

/// Admin surface over the background job scheduler.
pub fn job_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/runs", get(list_job_runs))
        .route("/:name/run", post(run_job))
}

async fn list_job_runs(State(state): State<Arc<AppState>>) -> Json<Vec<JobExecutionLog>> {
    Json(state.scheduler.get_execution_logs().await)
}

async fn run_job(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    state.scheduler.run_job_now(&name).await.map_err(|e| match e {
        JobError::ConfigError(_) => AppError::NotFound(format!("Job '{name}'")),
        other => AppError::InternalError(other.to_string()),
    })?;
    Ok(StatusCode::ACCEPTED)
}
