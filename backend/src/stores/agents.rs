use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use leadflow_shared::Agent;

use crate::engine::{AgentPool, EngineError};

/// Agent lookup plus the two pool-wide assignment strategies. Round-robin
/// state lives in a single-row table so rotation survives restarts and is
/// shared across instances.
pub struct PgAgentPool {
    pool: PgPool,
}

impl PgAgentPool {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AgentPool for PgAgentPool {
    async fn get_agent(&self, id: Uuid) -> Result<Option<Agent>, EngineError> {
        sqlx::query_as::<_, Agent>("SELECT * FROM agents WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(EngineError::collaborator)
    }

    async fn next_round_robin_agent(&self) -> Result<Agent, EngineError> {
        // advancing the cursor and reading the roster happen in one
        // transaction so two concurrent assignments get distinct slots
        let mut tx = self.pool.begin().await.map_err(EngineError::collaborator)?;

        let cursor: i64 = sqlx::query_scalar(
            "UPDATE agent_rotation SET cursor = cursor + 1 WHERE singleton RETURNING cursor",
        )
        .fetch_one(&mut *tx)
        .await
        .map_err(EngineError::collaborator)?;

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM agents WHERE is_active")
                .fetch_one(&mut *tx)
                .await
                .map_err(EngineError::collaborator)?;
        if count == 0 {
            return Err(EngineError::Collaborator("no active agents".into()));
        }

        let agent = sqlx::query_as::<_, Agent>(
            "SELECT * FROM agents WHERE is_active
             ORDER BY created_at ASC, id ASC
             OFFSET $1 LIMIT 1",
        )
        .bind(cursor % count)
        .fetch_one(&mut *tx)
        .await
        .map_err(EngineError::collaborator)?;

        tx.commit().await.map_err(EngineError::collaborator)?;
        Ok(agent)
    }

    async fn least_loaded_agent(&self) -> Result<Agent, EngineError> {
        sqlx::query_as::<_, Agent>(
            "SELECT a.id, a.email, a.first_name, a.last_name, a.is_active, a.created_at
             FROM agents a
             LEFT JOIN leads l ON l.assigned_agent = a.id
             WHERE a.is_active
             GROUP BY a.id
             ORDER BY COUNT(l.id) ASC, a.created_at ASC
             LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(EngineError::collaborator)?
        .ok_or_else(|| EngineError::Collaborator("no active agents".into()))
    }
}
