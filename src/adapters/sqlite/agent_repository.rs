//! SQLite implementation of the AgentRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Agent, AgentStatus, Seniority};
use crate::domain::ports::AgentRepository;

#[derive(Clone)]
pub struct SqliteAgentRepository {
    pool: SqlitePool,
}

impl SqliteAgentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AgentRepository for SqliteAgentRepository {
    async fn create(&self, agent: &Agent) -> DomainResult<()> {
        let skills_json = serde_json::to_string(&agent.skills)?;

        sqlx::query(
            r#"INSERT INTO agents (id, workspace_id, name, role, seniority, skills, status, cooldown_until, current_task_id, last_used_at, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(agent.id.to_string())
        .bind(agent.workspace_id.to_string())
        .bind(&agent.name)
        .bind(&agent.role)
        .bind(agent.seniority.as_str())
        .bind(&skills_json)
        .bind(agent.status.as_str())
        .bind(agent.cooldown_until.map(|t| t.to_rfc3339()))
        .bind(agent.current_task_id.map(|id| id.to_string()))
        .bind(agent.last_used_at.map(|t| t.to_rfc3339()))
        .bind(agent.created_at.to_rfc3339())
        .bind(agent.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Agent>> {
        let row: Option<AgentRow> = sqlx::query_as("SELECT * FROM agents WHERE id = ?").bind(id.to_string()).fetch_optional(&self.pool).await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update(&self, agent: &Agent) -> DomainResult<()> {
        let skills_json = serde_json::to_string(&agent.skills)?;

        let result = sqlx::query(
            r#"UPDATE agents SET name = ?, role = ?, seniority = ?, skills = ?, status = ?, cooldown_until = ?,
               current_task_id = ?, last_used_at = ?, updated_at = ? WHERE id = ?"#,
        )
        .bind(&agent.name)
        .bind(&agent.role)
        .bind(agent.seniority.as_str())
        .bind(&skills_json)
        .bind(agent.status.as_str())
        .bind(agent.cooldown_until.map(|t| t.to_rfc3339()))
        .bind(agent.current_task_id.map(|id| id.to_string()))
        .bind(agent.last_used_at.map(|t| t.to_rfc3339()))
        .bind(agent.updated_at.to_rfc3339())
        .bind(agent.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::AgentNotFound(agent.id));
        }

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM agents WHERE id = ?").bind(id.to_string()).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(DomainError::AgentNotFound(id));
        }
        Ok(())
    }

    async fn list_by_workspace(&self, workspace_id: Uuid) -> DomainResult<Vec<Agent>> {
        let rows: Vec<AgentRow> = sqlx::query_as("SELECT * FROM agents WHERE workspace_id = ? ORDER BY created_at")
            .bind(workspace_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_available(&self, workspace_id: Uuid) -> DomainResult<Vec<Agent>> {
        let rows: Vec<AgentRow> = sqlx::query_as("SELECT * FROM agents WHERE workspace_id = ? AND status = 'idle' ORDER BY created_at")
            .bind(workspace_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct AgentRow {
    id: String,
    workspace_id: String,
    name: String,
    role: String,
    seniority: String,
    skills: String,
    status: String,
    cooldown_until: Option<String>,
    current_task_id: Option<String>,
    last_used_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<AgentRow> for Agent {
    type Error = DomainError;

    fn try_from(row: AgentRow) -> Result<Self, Self::Error> {
        let seniority = Seniority::from_str(&row.seniority).ok_or_else(|| DomainError::Serialization(format!("invalid seniority: {}", row.seniority)))?;
        let status = AgentStatus::from_str(&row.status).ok_or_else(|| DomainError::Serialization(format!("invalid agent status: {}", row.status)))?;
        let skills: BTreeSet<String> = serde_json::from_str(&row.skills)?;

        Ok(Agent {
            id: super::parse_uuid(&row.id)?,
            workspace_id: super::parse_uuid(&row.workspace_id)?,
            name: row.name,
            role: row.role,
            seniority,
            skills,
            status,
            cooldown_until: super::parse_optional_datetime(row.cooldown_until)?,
            current_task_id: super::parse_optional_uuid(row.current_task_id)?,
            last_used_at: super::parse_optional_datetime(row.last_used_at)?,
            created_at: super::parse_datetime(&row.created_at)?,
            updated_at: super::parse_datetime(&row.updated_at)?,
        })
    }
}
