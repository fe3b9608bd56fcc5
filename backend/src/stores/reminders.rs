use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use leadflow_shared::{FollowUpReminder, ReminderStatus};

use crate::engine::{EngineError, NewReminder, ReminderStore};

pub struct PgReminderStore {
    pool: PgPool,
}

impl PgReminderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Pending reminders past their due date that have not been flagged
    /// for the assignee yet. Used by the reminder checker job.
    pub async fn due_unnotified(&self) -> Result<Vec<FollowUpReminder>, EngineError> {
        sqlx::query_as::<_, FollowUpReminder>(
            "SELECT id, lead_id, assigned_to, reminder_type, title, description, due_date,
                    status, priority, created_by, created_at, completed_at
             FROM follow_up_reminders
             WHERE status = 'pending' AND due_date < NOW() AND overdue_notified_at IS NULL
             ORDER BY due_date ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(EngineError::collaborator)
    }

    pub async fn mark_overdue_notified(&self, id: Uuid) -> Result<(), EngineError> {
        sqlx::query("UPDATE follow_up_reminders SET overdue_notified_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(EngineError::collaborator)?;
        Ok(())
    }
}

#[async_trait]
impl ReminderStore for PgReminderStore {
    async fn create_reminder(
        &self,
        reminder: NewReminder,
    ) -> Result<FollowUpReminder, EngineError> {
        let row = FollowUpReminder {
            id: Uuid::new_v4(),
            lead_id: reminder.lead_id,
            assigned_to: reminder.assigned_to,
            reminder_type: reminder.reminder_type,
            title: reminder.title,
            description: None,
            due_date: reminder.due_date,
            status: ReminderStatus::Pending,
            priority: reminder.priority,
            created_by: None,
            created_at: Utc::now(),
            completed_at: None,
        };

        sqlx::query(
            "INSERT INTO follow_up_reminders
             (id, lead_id, assigned_to, reminder_type, title, due_date, status, priority, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(row.id)
        .bind(row.lead_id)
        .bind(row.assigned_to)
        .bind(row.reminder_type)
        .bind(&row.title)
        .bind(row.due_date)
        .bind(row.status)
        .bind(row.priority)
        .bind(row.created_at)
        .execute(&self.pool)
        .await
        .map_err(EngineError::collaborator)?;

        Ok(row)
    }
}
