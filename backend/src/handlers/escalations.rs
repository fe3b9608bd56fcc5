use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, patch},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::engine::escalation::{EscalationLevel, EscalationRule, EscalationTrigger};
use crate::error::{ApiResult, AppError};
use crate::AppState;

#[derive(Deserialize)]
pub struct EscalationRuleCreate {
    pub name: String,
    pub trigger_condition: EscalationTrigger,
    pub escalation_levels: Vec<EscalationLevel>,
}

#[derive(Deserialize)]
pub struct EscalationRuleToggle {
    pub is_active: bool,
}

pub fn escalation_rule_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_escalation_rules).post(create_escalation_rule))
        .route("/:id", get(get_escalation_rule).delete(delete_escalation_rule))
        .route("/:id/active", patch(toggle_escalation_rule))
}

async fn list_escalation_rules(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<EscalationRule>>> {
    let rules = state.escalations.list_rules(false).await?;
    Ok(Json(rules))
}

async fn get_escalation_rule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<EscalationRule>> {
    let rule = state
        .escalations
        .get_rule(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Escalation rule".to_string()))?;
    Ok(Json(rule))
}

async fn create_escalation_rule(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<EscalationRuleCreate>,
) -> ApiResult<(StatusCode, Json<EscalationRule>)> {
    if payload.name.trim().is_empty() {
        return Err(crate::error::validation_error("name", "Name is required"));
    }
    // level ordering is validated at construction and rejected with 400
    let rule = EscalationRule::new(
        payload.name.trim(),
        payload.trigger_condition,
        payload.escalation_levels,
    )?;

    state.escalations.create_rule(&rule).await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

async fn toggle_escalation_rule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<EscalationRuleToggle>,
) -> ApiResult<StatusCode> {
    if state.escalations.set_rule_active(id, payload.is_active).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("Escalation rule".to_string()))
    }
}

async fn delete_escalation_rule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if state.escalations.delete_rule(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("Escalation rule".to_string()))
    }
}
