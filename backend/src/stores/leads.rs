use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use leadflow_shared::{Lead, LeadTask};

use crate::engine::{EngineError, LeadProvider};

pub struct PgLeadProvider {
    pool: PgPool,
}

impl PgLeadProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeadProvider for PgLeadProvider {
    async fn get_lead(&self, id: Uuid) -> Result<Option<Lead>, EngineError> {
        sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(EngineError::collaborator)
    }

    async fn open_leads(&self) -> Result<Vec<Lead>, EngineError> {
        sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE status NOT IN ('converted', 'lost')")
            .fetch_all(&self.pool)
            .await
            .map_err(EngineError::collaborator)
    }

    async fn assign_agent(&self, lead_id: Uuid, agent_id: Uuid) -> Result<(), EngineError> {
        sqlx::query("UPDATE leads SET assigned_agent = $2, updated_at = NOW() WHERE id = $1")
            .bind(lead_id)
            .bind(agent_id)
            .execute(&self.pool)
            .await
            .map_err(EngineError::collaborator)?;
        Ok(())
    }

    async fn update_status(&self, lead_id: Uuid, status: &str) -> Result<(), EngineError> {
        sqlx::query("UPDATE leads SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(lead_id)
            .bind(status)
            .execute(&self.pool)
            .await
            .map_err(EngineError::collaborator)?;
        Ok(())
    }

    async fn create_task(&self, task: &LeadTask) -> Result<(), EngineError> {
        sqlx::query(
            "INSERT INTO lead_tasks (id, lead_id, assigned_to, title, description, status, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(task.id)
        .bind(task.lead_id)
        .bind(task.assigned_to)
        .bind(&task.title)
        .bind(&task.description)
        .bind(&task.status)
        .bind(task.created_at)
        .execute(&self.pool)
        .await
        .map_err(EngineError::collaborator)?;
        Ok(())
    }
}
