mod config;
mod database;
mod engine;
mod error;
mod handlers;
mod jobs;
mod services;
mod stores;

use std::sync::Arc;

use axum::{extract::State, response::Json, routing::get, Router};
use serde_json::json;
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::engine::{ActionDispatcher, WorkflowEngine};
use crate::jobs::{EscalationCheckerJob, JobScheduler, ReminderCheckerJob};
use crate::services::{EmailService, LeadLocks};
use crate::stores::{
    PgAgentPool, PgEscalationStore, PgExecutionLog, PgLeadProvider, PgReminderStore, PgRuleStore,
};

pub struct AppState {
    pub db: PgPool,
    pub rules: Arc<PgRuleStore>,
    pub escalations: Arc<PgEscalationStore>,
    pub engine: Arc<WorkflowEngine>,
    pub locks: LeadLocks,
    pub scheduler: Arc<JobScheduler>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    if !config.smtp.is_configured() {
        warn!("SMTP is not fully configured; workflow emails will fail to send");
    }

    let pool = database::create_pool(&config.database_url).await?;
    database::migrate(&pool).await?;

    let email_service = Arc::new(
        EmailService::new(&config.smtp)
            .map_err(|e| anyhow::anyhow!("failed to build SMTP transport: {e}"))?,
    );

    let rules = Arc::new(PgRuleStore::new(pool.clone()));
    let leads = Arc::new(PgLeadProvider::new(pool.clone()));
    let agents = Arc::new(PgAgentPool::new(pool.clone()));
    let reminders = Arc::new(PgReminderStore::new(pool.clone()));
    let executions = Arc::new(PgExecutionLog::new(pool.clone()));
    let escalations = Arc::new(PgEscalationStore::new(pool.clone()));

    let dispatcher = ActionDispatcher::new(
        leads.clone(),
        agents.clone(),
        email_service.clone(),
        reminders.clone(),
        executions.clone(),
    );
    let workflow_engine = Arc::new(WorkflowEngine::new(rules.clone(), leads.clone(), dispatcher));
    let locks = LeadLocks::new();

    let escalation_checker = Arc::new(EscalationCheckerJob::new(
        escalations.clone(),
        leads.clone(),
        agents.clone(),
        email_service.clone(),
    ));
    let reminder_checker = Arc::new(ReminderCheckerJob::new(
        pool.clone(),
        reminders.clone(),
        leads.clone(),
        agents.clone(),
        email_service.clone(),
        workflow_engine.clone(),
        locks.clone(),
        config.jobs.inactivity_threshold_hours,
    ));
    let scheduler = Arc::new(
        JobScheduler::new(escalation_checker, reminder_checker, config.jobs.clone()).await?,
    );
    scheduler.start().await?;

    let state = Arc::new(AppState {
        db: pool,
        rules,
        escalations,
        engine: workflow_engine,
        locks,
        scheduler: scheduler.clone(),
    });

    let app = Router::new()
        .route("/health", get(health))
        .nest("/api/v1/leads", handlers::lead_routes())
        .nest("/api/v1/rules", handlers::rule_routes())
        .nest("/api/v1/escalation-rules", handlers::escalation_rule_routes())
        .nest("/api/v1/reminders", handlers::reminder_routes())
        .nest("/api/v1/executions", handlers::execution_routes())
        .nest("/api/v1/jobs", handlers::job_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    info!("Leadflow backend listening on {}", config.server_addr);
    let listener = tokio::net::TcpListener::bind(&config.server_addr).await?;
    axum::serve(listener, app).await?;

    scheduler.shutdown().await?;
    Ok(())
}

async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let database = database::health_check(&state.db).await;
    Json(json!({
        "status": if database { "ok" } else { "degraded" },
        "database": database,
    }))
}
