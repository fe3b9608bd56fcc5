use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use leadflow_shared::{FollowUpReminder, ReminderPriority, ReminderStatus, ReminderType};

use crate::error::{ApiResult, AppError, ValidationBuilder};
use crate::AppState;

#[derive(Deserialize)]
pub struct ReminderCreate {
    pub lead_id: Uuid,
    pub assigned_to: Uuid,
    pub reminder_type: ReminderType,
    pub title: String,
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
    #[serde(default)]
    pub priority: ReminderPriority,
}

#[derive(Deserialize)]
pub struct ReminderQuery {
    pub lead_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    pub status: Option<ReminderStatus>,
    pub limit: Option<i64>,
}

pub fn reminder_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_reminders).post(create_reminder))
        .route("/:id", get(get_reminder).delete(delete_reminder))
        .route("/:id/complete", post(complete_reminder))
        .route("/:id/cancel", post(cancel_reminder))
}

const REMINDER_COLUMNS: &str =
    "id, lead_id, assigned_to, reminder_type, title, description, due_date, status, priority, created_by, created_at, completed_at";

/// Listing applies the derived overdue view: stored `pending` rows past
/// their due date are reported as `overdue` without being rewritten.
async fn list_reminders(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReminderQuery>,
) -> ApiResult<Json<Vec<FollowUpReminder>>> {
    let limit = params.limit.unwrap_or(100).clamp(1, 500);
    let mut reminders = sqlx::query_as::<_, FollowUpReminder>(&format!(
        "SELECT {REMINDER_COLUMNS} FROM follow_up_reminders
         WHERE ($1::uuid IS NULL OR lead_id = $1)
           AND ($2::uuid IS NULL OR assigned_to = $2)
         ORDER BY due_date ASC
         LIMIT $3"
    ))
    .bind(params.lead_id)
    .bind(params.assigned_to)
    .bind(limit)
    .fetch_all(&state.db)
    .await?;

    let now = Utc::now();
    for reminder in &mut reminders {
        reminder.status = reminder.status_at(now);
    }
    if let Some(status) = params.status {
        reminders.retain(|r| r.status == status);
    }

    Ok(Json(reminders))
}

async fn get_reminder(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<FollowUpReminder>> {
    let mut reminder = fetch_reminder(&state, id).await?;
    reminder.status = reminder.status_at(Utc::now());
    Ok(Json(reminder))
}

async fn create_reminder(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ReminderCreate>,
) -> ApiResult<(StatusCode, Json<FollowUpReminder>)> {
    let mut validation = ValidationBuilder::new();
    if payload.title.trim().is_empty() {
        validation = validation.error("title", "Title is required");
    }
    if payload.due_date <= Utc::now() {
        validation = validation.error("due_date", "Due date must be in the future");
    }
    if let Some(error) = validation.build() {
        return Err(error);
    }

    let mut reminder = FollowUpReminder::new(
        payload.lead_id,
        payload.assigned_to,
        payload.reminder_type,
        payload.title.trim(),
        payload.due_date,
        payload.priority,
        None,
    );
    reminder.description = payload.description;

    sqlx::query(
        "INSERT INTO follow_up_reminders
         (id, lead_id, assigned_to, reminder_type, title, description, due_date, status, priority, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(reminder.id)
    .bind(reminder.lead_id)
    .bind(reminder.assigned_to)
    .bind(reminder.reminder_type)
    .bind(&reminder.title)
    .bind(&reminder.description)
    .bind(reminder.due_date)
    .bind(reminder.status)
    .bind(reminder.priority)
    .bind(reminder.created_at)
    .execute(&state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(reminder)))
}

async fn complete_reminder(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<FollowUpReminder>> {
    let mut reminder = fetch_reminder(&state, id).await?;
    if !reminder.complete(Utc::now()) {
        return Err(AppError::Conflict("Reminder is no longer pending".to_string()));
    }

    sqlx::query(
        "UPDATE follow_up_reminders SET status = $2, completed_at = $3 WHERE id = $1",
    )
    .bind(reminder.id)
    .bind(reminder.status)
    .bind(reminder.completed_at)
    .execute(&state.db)
    .await?;

    // a completed reminder counts as contact with the lead
    sqlx::query("UPDATE leads SET last_contact_at = NOW(), updated_at = NOW() WHERE id = $1")
        .bind(reminder.lead_id)
        .execute(&state.db)
        .await?;

    Ok(Json(reminder))
}

async fn cancel_reminder(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<FollowUpReminder>> {
    let mut reminder = fetch_reminder(&state, id).await?;
    if !reminder.cancel() {
        return Err(AppError::Conflict("Reminder is no longer pending".to_string()));
    }

    sqlx::query("UPDATE follow_up_reminders SET status = $2 WHERE id = $1")
        .bind(reminder.id)
        .bind(reminder.status)
        .execute(&state.db)
        .await?;

    Ok(Json(reminder))
}

async fn delete_reminder(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let result = sqlx::query("DELETE FROM follow_up_reminders WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() > 0 {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("Reminder".to_string()))
    }
}

async fn fetch_reminder(state: &Arc<AppState>, id: Uuid) -> Result<FollowUpReminder, AppError> {
    sqlx::query_as::<_, FollowUpReminder>(&format!(
        "SELECT {REMINDER_COLUMNS} FROM follow_up_reminders WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("Reminder".to_string()))
}
