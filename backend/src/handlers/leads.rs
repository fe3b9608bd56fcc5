use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use leadflow_shared::Lead;

use crate::engine::LeadEvent;
use crate::error::{ApiResult, AppError, ValidationBuilder};
use crate::AppState;

#[derive(Deserialize)]
pub struct LeadCreate {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub country: String,
    pub source: Option<String>,
    #[serde(default)]
    pub balance: Option<Decimal>,
}

#[derive(Deserialize)]
pub struct LeadUpdate {
    pub status: Option<String>,
    pub kyc_status: Option<String>,
    pub balance: Option<Decimal>,
    pub assigned_agent: Option<Uuid>,
    pub last_contact_at: Option<chrono::DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct LeadQuery {
    pub status: Option<String>,
    pub country: Option<String>,
    pub assigned_agent: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub fn lead_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_leads).post(create_lead))
        .route("/:id", get(get_lead).put(update_lead))
}

async fn list_leads(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LeadQuery>,
) -> ApiResult<Json<Vec<Lead>>> {
    let limit = params.limit.unwrap_or(50).clamp(1, 200);
    let offset = params.offset.unwrap_or(0).max(0);

    let leads = sqlx::query_as::<_, Lead>(
        "SELECT * FROM leads
         WHERE ($1::text IS NULL OR status = $1)
           AND ($2::text IS NULL OR country = $2)
           AND ($3::uuid IS NULL OR assigned_agent = $3)
         ORDER BY created_at DESC
         LIMIT $4 OFFSET $5",
    )
    .bind(&params.status)
    .bind(&params.country)
    .bind(params.assigned_agent)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(leads))
}

async fn get_lead(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Lead>> {
    let lead = sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Lead".to_string()))?;
    Ok(Json(lead))
}

async fn create_lead(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LeadCreate>,
) -> ApiResult<(StatusCode, Json<Lead>)> {
    let mut validation = ValidationBuilder::new();
    if payload.first_name.trim().is_empty() {
        validation = validation.error("first_name", "First name is required");
    }
    if payload.last_name.trim().is_empty() {
        validation = validation.error("last_name", "Last name is required");
    }
    if !payload.email.contains('@') {
        validation = validation.error("email", "A valid email address is required");
    }
    if payload.country.trim().is_empty() {
        validation = validation.error("country", "Country is required");
    }
    if let Some(error) = validation.build() {
        return Err(error);
    }

    let lead = Lead {
        id: Uuid::new_v4(),
        first_name: payload.first_name.trim().to_string(),
        last_name: payload.last_name.trim().to_string(),
        email: payload.email.trim().to_string(),
        phone: payload.phone,
        country: payload.country.trim().to_uppercase(),
        status: "new".to_string(),
        kyc_status: "not_started".to_string(),
        balance: payload.balance.unwrap_or_default(),
        assigned_agent: None,
        source: payload.source,
        last_contact_at: None,
        created_at: Utc::now(),
        updated_at: None,
    };

    sqlx::query(
        "INSERT INTO leads
         (id, first_name, last_name, email, phone, country, status, kyc_status, balance, source, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
    )
    .bind(lead.id)
    .bind(&lead.first_name)
    .bind(&lead.last_name)
    .bind(&lead.email)
    .bind(&lead.phone)
    .bind(&lead.country)
    .bind(&lead.status)
    .bind(&lead.kyc_status)
    .bind(lead.balance)
    .bind(&lead.source)
    .bind(lead.created_at)
    .execute(&state.db)
    .await?;

    fire_event(&state, LeadEvent::created(lead.id)).await;

    // re-read so the response reflects what the assignment rules did
    let lead = sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = $1")
        .bind(lead.id)
        .fetch_one(&state.db)
        .await?;

    Ok((StatusCode::CREATED, Json(lead)))
}

async fn update_lead(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<LeadUpdate>,
) -> ApiResult<Json<Lead>> {
    let existing = sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Lead".to_string()))?;

    let status_changed = payload
        .status
        .as_ref()
        .map(|s| *s != existing.status)
        .unwrap_or(false);

    sqlx::query(
        "UPDATE leads
         SET status = COALESCE($2, status),
             kyc_status = COALESCE($3, kyc_status),
             balance = COALESCE($4, balance),
             assigned_agent = COALESCE($5, assigned_agent),
             last_contact_at = COALESCE($6, last_contact_at),
             updated_at = NOW()
         WHERE id = $1",
    )
    .bind(id)
    .bind(&payload.status)
    .bind(&payload.kyc_status)
    .bind(payload.balance)
    .bind(payload.assigned_agent)
    .bind(payload.last_contact_at)
    .execute(&state.db)
    .await?;

    if status_changed {
        fire_event(&state, LeadEvent::updated(id)).await;
    }

    let lead = sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = $1")
        .bind(id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(lead))
}

/// Runs the workflow engine for one lead event under the per-lead lock.
/// Engine trouble is logged and never fails the API write that caused it.
async fn fire_event(state: &Arc<AppState>, event: LeadEvent) {
    let _guard = state.locks.acquire(event.lead_id).await;
    if let Err(e) = state.engine.process_event(&event).await {
        error!(lead_id = %event.lead_id, %e, "workflow processing failed");
    }
}
