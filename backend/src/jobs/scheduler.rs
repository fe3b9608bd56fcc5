// Job Scheduler - Central scheduler for all background jobs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler as TokioScheduler, JobSchedulerError};
use tracing::{error, info};
use uuid::Uuid;

use super::{EscalationCheckerJob, ReminderCheckerJob};
use crate::config::JobsConfig;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Scheduler error: {0}")]
    SchedulerError(#[from] JobSchedulerError),
    #[error("Job execution error: {0}")]
    ExecutionError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type JobResult<T> = Result<T, JobError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobExecutionLog {
    pub id: Uuid,
    pub job_name: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: JobStatus,
    pub items_processed: i32,
    pub errors: Vec<String>,
    pub duration_ms: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
    PartialFailure,
}

pub struct JobScheduler {
    scheduler: TokioScheduler,
    escalation_checker: Arc<EscalationCheckerJob>,
    reminder_checker: Arc<ReminderCheckerJob>,
    config: JobsConfig,
    execution_logs: Arc<RwLock<Vec<JobExecutionLog>>>,
}

impl JobScheduler {
    pub async fn new(
        escalation_checker: Arc<EscalationCheckerJob>,
        reminder_checker: Arc<ReminderCheckerJob>,
        config: JobsConfig,
    ) -> JobResult<Self> {
        let scheduler = TokioScheduler::new().await?;

        Ok(Self {
            scheduler,
            escalation_checker,
            reminder_checker,
            config,
            execution_logs: Arc::new(RwLock::new(Vec::new())),
        })
    }

    pub async fn start(&self) -> JobResult<()> {
        info!("Starting background job scheduler");

        self.schedule_escalation_checker().await?;
        self.schedule_reminder_checker().await?;

        self.scheduler.start().await?;

        info!("Background job scheduler started successfully");
        Ok(())
    }

    pub async fn shutdown(&self) -> JobResult<()> {
        info!("Shutting down background job scheduler");
        self.scheduler.clone().shutdown().await?;
        Ok(())
    }

    async fn schedule_escalation_checker(&self) -> JobResult<()> {
        let interval = self.config.escalation_check_interval_minutes;
        let cron_expr = format!("0 */{} * * * *", interval); // Every N minutes

        let checker = self.escalation_checker.clone();
        let logs = self.execution_logs.clone();

        let job = Job::new_async(cron_expr.as_str(), move |_uuid, _lock| {
            let checker = checker.clone();
            let logs = logs.clone();

            Box::pin(async move {
                let started_at = Utc::now();
                info!("Running escalation checker job");

                match checker.run().await {
                    Ok(result) => {
                        record_run(
                            &logs,
                            "Escalation Checker",
                            started_at,
                            result.states_checked,
                            result.errors,
                        )
                        .await;
                        info!(
                            "Escalation checker completed: {} states opened, {} checked, {} levels fired",
                            result.states_opened, result.states_checked, result.levels_fired
                        );
                    }
                    Err(e) => {
                        error!("Escalation checker failed: {}", e);
                    }
                }
            })
        })?;

        self.scheduler.add(job).await?;
        info!("Scheduled escalation checker to run every {} minutes", interval);

        Ok(())
    }

    async fn schedule_reminder_checker(&self) -> JobResult<()> {
        let interval = self.config.reminder_check_interval_minutes;
        let cron_expr = format!("0 */{} * * * *", interval);

        let checker = self.reminder_checker.clone();
        let logs = self.execution_logs.clone();

        let job = Job::new_async(cron_expr.as_str(), move |_uuid, _lock| {
            let checker = checker.clone();
            let logs = logs.clone();

            Box::pin(async move {
                let started_at = Utc::now();
                info!("Running reminder checker job");

                match checker.run().await {
                    Ok(result) => {
                        let items = result.overdue_flagged + result.inactive_leads_processed;
                        record_run(&logs, "Reminder Checker", started_at, items, result.errors)
                            .await;
                        info!(
                            "Reminder checker completed: {} overdue flagged, {} inactive leads processed",
                            result.overdue_flagged, result.inactive_leads_processed
                        );
                    }
                    Err(e) => {
                        error!("Reminder checker failed: {}", e);
                    }
                }
            })
        })?;

        self.scheduler.add(job).await?;
        info!("Scheduled reminder checker to run every {} minutes", interval);

        Ok(())
    }

    pub async fn get_execution_logs(&self) -> Vec<JobExecutionLog> {
        self.execution_logs.read().await.clone()
    }

    pub async fn run_job_now(&self, job_name: &str) -> JobResult<()> {
        match job_name {
            "escalation_checker" => {
                self.escalation_checker
                    .run()
                    .await
                    .map_err(|e| JobError::ExecutionError(e.to_string()))?;
            }
            "reminder_checker" => {
                self.reminder_checker
                    .run()
                    .await
                    .map_err(|e| JobError::ExecutionError(e.to_string()))?;
            }
            _ => return Err(JobError::ConfigError(format!("Unknown job: {}", job_name))),
        }

        Ok(())
    }
}

async fn record_run(
    logs: &Arc<RwLock<Vec<JobExecutionLog>>>,
    job_name: &str,
    started_at: DateTime<Utc>,
    items_processed: i32,
    errors: Vec<String>,
) {
    let completed_at = Utc::now();
    let log = JobExecutionLog {
        id: Uuid::new_v4(),
        job_name: job_name.to_string(),
        started_at,
        completed_at: Some(completed_at),
        status: if errors.is_empty() { JobStatus::Completed } else { JobStatus::PartialFailure },
        items_processed,
        errors,
        duration_ms: Some((completed_at - started_at).num_milliseconds()),
    };

    let mut logs = logs.write().await;
    logs.push(log);
    // Keep only last 100 logs
    if logs.len() > 100 {
        logs.remove(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::World;
    use crate::engine::{ActionDispatcher, WorkflowEngine};
    use crate::services::LeadLocks;
    use crate::stores::{PgEscalationStore, PgReminderStore};

    // Connects nothing: the pool is lazy and these tests never run a job
    // that touches the database.
    async fn scheduler() -> JobScheduler {
        let world = World::new();
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/leadflow")
            .unwrap();

        let dispatcher = ActionDispatcher::new(
            world.leads.clone(),
            world.agents.clone(),
            world.notifier.clone(),
            world.reminders.clone(),
            world.log.clone(),
        );
        let engine = Arc::new(WorkflowEngine::new(
            world.rules.clone(),
            world.leads.clone(),
            dispatcher,
        ));
        let escalation_checker = Arc::new(EscalationCheckerJob::new(
            Arc::new(PgEscalationStore::new(pool.clone())),
            world.leads.clone(),
            world.agents.clone(),
            world.notifier.clone(),
        ));
        let reminder_checker = Arc::new(ReminderCheckerJob::new(
            pool.clone(),
            Arc::new(PgReminderStore::new(pool)),
            world.leads.clone(),
            world.agents.clone(),
            world.notifier.clone(),
            engine,
            LeadLocks::new(),
            48,
        ));
        let config = JobsConfig {
            escalation_check_interval_minutes: 5,
            reminder_check_interval_minutes: 5,
            inactivity_threshold_hours: 48,
        };
        JobScheduler::new(escalation_checker, reminder_checker, config).await.unwrap()
    }

    #[tokio::test]
    async fn unknown_job_name_is_rejected() {
        let scheduler = scheduler().await;
        let err = scheduler.run_job_now("coffee_maker").await.unwrap_err();
        assert!(matches!(err, JobError::ConfigError(_)));
    }

    #[tokio::test]
    async fn execution_log_starts_empty() {
        let scheduler = scheduler().await;
        assert!(scheduler.get_execution_logs().await.is_empty());
    }
}
