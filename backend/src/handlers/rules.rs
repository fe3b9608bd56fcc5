use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::engine::collaborators::RuleStore;
use crate::engine::{EngineError, RuleType, WorkflowAction, WorkflowCondition, WorkflowRule};
use crate::error::{ApiResult, AppError, ValidationBuilder};
use crate::AppState;

#[derive(Deserialize)]
pub struct RuleCreate {
    pub name: String,
    pub rule_type: RuleType,
    #[serde(default)]
    pub conditions: Vec<WorkflowCondition>,
    #[serde(default)]
    pub actions: Vec<WorkflowAction>,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Deserialize)]
pub struct RuleUpdate {
    pub name: Option<String>,
    pub conditions: Option<Vec<WorkflowCondition>>,
    pub actions: Option<Vec<WorkflowAction>>,
    pub priority: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Deserialize)]
pub struct RuleQuery {
    pub rule_type: Option<RuleType>,
}

pub fn rule_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_rules).post(create_rule))
        .route("/:id", get(get_rule).put(update_rule).delete(delete_rule))
}

async fn list_rules(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RuleQuery>,
) -> ApiResult<Json<Vec<WorkflowRule>>> {
    let rules = state.rules.list_rules(params.rule_type).await?;
    Ok(Json(rules))
}

async fn get_rule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WorkflowRule>> {
    let rule = state
        .rules
        .get_rule(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Workflow rule".to_string()))?;
    Ok(Json(rule))
}

async fn create_rule(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RuleCreate>,
) -> ApiResult<(StatusCode, Json<WorkflowRule>)> {
    let mut rule = WorkflowRule::new(payload.name.trim(), payload.rule_type)
        .with_conditions(payload.conditions)
        .with_actions(payload.actions);
    if let Some(priority) = payload.priority {
        rule.priority = priority;
    }
    if let Some(is_active) = payload.is_active {
        rule.is_active = is_active;
    }

    check_rule(&rule)?;
    state.rules.create_rule(&rule).await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

async fn update_rule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RuleUpdate>,
) -> ApiResult<Json<WorkflowRule>> {
    let mut rule = state
        .rules
        .get_rule(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Workflow rule".to_string()))?;

    if let Some(name) = payload.name {
        rule.name = name.trim().to_string();
    }
    if let Some(conditions) = payload.conditions {
        rule.conditions = conditions;
    }
    if let Some(actions) = payload.actions {
        rule.actions = actions;
    }
    if let Some(priority) = payload.priority {
        rule.priority = priority;
    }
    if let Some(is_active) = payload.is_active {
        rule.is_active = is_active;
    }
    rule.updated_at = Some(chrono::Utc::now());

    check_rule(&rule)?;
    state.rules.update_rule(&rule).await?;
    Ok(Json(rule))
}

async fn delete_rule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if state.rules.delete_rule(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("Workflow rule".to_string()))
    }
}

/// Maps structural rule problems onto a field-level validation response.
fn check_rule(rule: &WorkflowRule) -> Result<(), AppError> {
    if let Err(EngineError::InvalidParameters(message)) = rule.validate() {
        let field = if message.contains("name") { "name" } else { "actions" };
        if let Some(error) = ValidationBuilder::new().error(field, &message).build() {
            return Err(error);
        }
    }
    Ok(())
}
