// Reminder Checker Job - flags overdue reminders and surfaces inactive leads

use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

use crate::engine::{AgentPool, EngineError, LeadEvent, LeadProvider, Notifier, WorkflowEngine};
use crate::services::{EmailService, LeadLocks};
use crate::stores::PgReminderStore;

pub struct ReminderCheckerJob {
    pool: PgPool,
    reminders: Arc<PgReminderStore>,
    leads: Arc<dyn LeadProvider>,
    agents: Arc<dyn AgentPool>,
    notifier: Arc<dyn Notifier>,
    engine: Arc<WorkflowEngine>,
    locks: LeadLocks,
    inactivity_threshold_hours: i64,
}

#[derive(Debug, Default)]
pub struct ReminderCheckResult {
    pub overdue_flagged: i32,
    pub inactive_leads_processed: i32,
    pub errors: Vec<String>,
}

impl ReminderCheckerJob {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: PgPool,
        reminders: Arc<PgReminderStore>,
        leads: Arc<dyn LeadProvider>,
        agents: Arc<dyn AgentPool>,
        notifier: Arc<dyn Notifier>,
        engine: Arc<WorkflowEngine>,
        locks: LeadLocks,
        inactivity_threshold_hours: i64,
    ) -> Self {
        Self {
            pool,
            reminders,
            leads,
            agents,
            notifier,
            engine,
            locks,
            inactivity_threshold_hours,
        }
    }

    pub async fn run(&self) -> Result<ReminderCheckResult, EngineError> {
        let mut result = ReminderCheckResult::default();
        self.notify_overdue_reminders(&mut result).await;
        self.process_inactive_leads(&mut result).await?;
        Ok(result)
    }

    /// Nudges the assignee of each pending reminder that went past its due
    /// date. Stored status stays `pending`; overdue is a derived view, so
    /// this only sends the notification and records that it was sent.
    async fn notify_overdue_reminders(&self, result: &mut ReminderCheckResult) {
        let due = match self.reminders.due_unnotified().await {
            Ok(due) => due,
            Err(e) => {
                result.errors.push(format!("failed to load overdue reminders: {e}"));
                return;
            }
        };

        for reminder in due {
            let lead_name = match self.leads.get_lead(reminder.lead_id).await {
                Ok(Some(lead)) => format!("{} {}", lead.first_name, lead.last_name),
                _ => reminder.lead_id.to_string(),
            };
            let agent = match self.agents.get_agent(reminder.assigned_to).await {
                Ok(Some(agent)) => agent,
                _ => {
                    result.errors.push(format!(
                        "reminder {} assignee {} not found",
                        reminder.id, reminder.assigned_to
                    ));
                    continue;
                }
            };

            let subject = format!("Overdue reminder: {}", reminder.title);
            let body = EmailService::overdue_reminder_body(
                &lead_name,
                &reminder.title,
                &reminder.due_date.to_rfc3339(),
            );
            if let Err(e) = self.notifier.send_email(&agent.email, &subject, &body).await {
                result.errors.push(format!("reminder {} notification failed: {e}", reminder.id));
                continue;
            }
            if let Err(e) = self.reminders.mark_overdue_notified(reminder.id).await {
                result.errors.push(format!("reminder {} flag update failed: {e}", reminder.id));
                continue;
            }
            result.overdue_flagged += 1;
        }
    }

    /// Fires a `lead_inactive` event for every open lead whose last contact
    /// is older than the threshold. Each lead is re-raised at most once per
    /// day so follow-up rules do not pile up between checker passes.
    async fn process_inactive_leads(
        &self,
        result: &mut ReminderCheckResult,
    ) -> Result<(), EngineError> {
        let lead_ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM leads
             WHERE status NOT IN ('converted', 'lost')
               AND COALESCE(last_contact_at, created_at) < NOW() - ($1 * INTERVAL '1 hour')
               AND (last_inactive_event_at IS NULL
                    OR last_inactive_event_at < NOW() - INTERVAL '24 hours')",
        )
        .bind(self.inactivity_threshold_hours as f64)
        .fetch_all(&self.pool)
        .await
        .map_err(EngineError::collaborator)?;

        if !lead_ids.is_empty() {
            info!(count = lead_ids.len(), "processing inactive leads");
        }

        for lead_id in lead_ids {
            let _guard = self.locks.acquire(lead_id).await;
            match self.engine.process_event(&LeadEvent::inactive(lead_id)).await {
                Ok(_) => {
                    if let Err(e) = sqlx::query(
                        "UPDATE leads SET last_inactive_event_at = $2 WHERE id = $1",
                    )
                    .bind(lead_id)
                    .bind(Utc::now())
                    .execute(&self.pool)
                    .await
                    {
                        error!(lead_id = %lead_id, %e, "failed to stamp inactive event");
                    }
                    result.inactive_leads_processed += 1;
                }
                Err(e) => {
                    result.errors.push(format!("inactive lead {lead_id}: {e}"));
                }
            }
        }
        Ok(())
    }
}
