//! SQLite implementation of the WorkspaceRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Workspace, WorkspaceStatus};
use crate::domain::ports::WorkspaceRepository;

#[derive(Clone)]
pub struct SqliteWorkspaceRepository {
    pool: SqlitePool,
}

impl SqliteWorkspaceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkspaceRepository for SqliteWorkspaceRepository {
    async fn create(&self, workspace: &Workspace) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO workspaces (
                id, name, goal_text, status, compliance_score, recovery_count, last_recovery_at,
                total_recovery_attempts, successful_recoveries, consecutive_empty_ticks,
                consecutive_successes_in_degraded, created_at, updated_at, version
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(workspace.id.to_string())
        .bind(&workspace.name)
        .bind(&workspace.goal_text)
        .bind(workspace.status.as_str())
        .bind(i64::from(workspace.compliance_score))
        .bind(i64::from(workspace.recovery_count))
        .bind(workspace.last_recovery_at.map(|t| t.to_rfc3339()))
        .bind(workspace.total_recovery_attempts as i64)
        .bind(workspace.successful_recoveries as i64)
        .bind(i64::from(workspace.consecutive_empty_ticks))
        .bind(i64::from(workspace.consecutive_successes_in_degraded))
        .bind(workspace.created_at.to_rfc3339())
        .bind(workspace.updated_at.to_rfc3339())
        .bind(workspace.version as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Workspace>> {
        let row: Option<WorkspaceRow> = sqlx::query_as("SELECT * FROM workspaces WHERE id = ?").bind(id.to_string()).fetch_optional(&self.pool).await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update(&self, workspace: &Workspace) -> DomainResult<()> {
        // Mutators on `Workspace` bump `version` in place before `update` is
        // called, so the stored row must still be one version behind.
        let previous_version = (workspace.version as i64).saturating_sub(1);
        let result = sqlx::query(
            r#"UPDATE workspaces SET name = ?, goal_text = ?, status = ?, compliance_score = ?, recovery_count = ?,
               last_recovery_at = ?, total_recovery_attempts = ?, successful_recoveries = ?,
               consecutive_empty_ticks = ?, consecutive_successes_in_degraded = ?, updated_at = ?, version = ?
               WHERE id = ? AND version = ?"#,
        )
        .bind(&workspace.name)
        .bind(&workspace.goal_text)
        .bind(workspace.status.as_str())
        .bind(i64::from(workspace.compliance_score))
        .bind(i64::from(workspace.recovery_count))
        .bind(workspace.last_recovery_at.map(|t| t.to_rfc3339()))
        .bind(workspace.total_recovery_attempts as i64)
        .bind(workspace.successful_recoveries as i64)
        .bind(i64::from(workspace.consecutive_empty_ticks))
        .bind(i64::from(workspace.consecutive_successes_in_degraded))
        .bind(workspace.updated_at.to_rfc3339())
        .bind(workspace.version as i64)
        .bind(workspace.id.to_string())
        .bind(previous_version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.get(workspace.id).await? {
                Some(_) => Err(DomainError::ConcurrencyConflict { entity: "workspace".to_string(), id: workspace.id.to_string() }),
                None => Err(DomainError::WorkspaceNotFound(workspace.id)),
            };
        }

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM workspaces WHERE id = ?").bind(id.to_string()).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(DomainError::WorkspaceNotFound(id));
        }
        Ok(())
    }

    async fn list(&self) -> DomainResult<Vec<Workspace>> {
        let rows: Vec<WorkspaceRow> = sqlx::query_as("SELECT * FROM workspaces ORDER BY created_at DESC").fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_by_status(&self, status: WorkspaceStatus) -> DomainResult<Vec<Workspace>> {
        let rows: Vec<WorkspaceRow> = sqlx::query_as("SELECT * FROM workspaces WHERE status = ? ORDER BY created_at DESC")
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct WorkspaceRow {
    id: String,
    name: String,
    goal_text: String,
    status: String,
    compliance_score: i64,
    recovery_count: i64,
    last_recovery_at: Option<String>,
    total_recovery_attempts: i64,
    successful_recoveries: i64,
    consecutive_empty_ticks: i64,
    consecutive_successes_in_degraded: i64,
    created_at: String,
    updated_at: String,
    version: i64,
}

impl TryFrom<WorkspaceRow> for Workspace {
    type Error = DomainError;

    fn try_from(row: WorkspaceRow) -> Result<Self, Self::Error> {
        let status = WorkspaceStatus::from_str(&row.status).ok_or_else(|| DomainError::Serialization(format!("invalid workspace status: {}", row.status)))?;

        Ok(Workspace {
            id: super::parse_uuid(&row.id)?,
            name: row.name,
            goal_text: row.goal_text,
            status,
            compliance_score: row.compliance_score as u8,
            recovery_count: row.recovery_count as u32,
            last_recovery_at: super::parse_optional_datetime(row.last_recovery_at)?,
            total_recovery_attempts: row.total_recovery_attempts as u64,
            successful_recoveries: row.successful_recoveries as u64,
            consecutive_empty_ticks: row.consecutive_empty_ticks as u32,
            consecutive_successes_in_degraded: row.consecutive_successes_in_degraded as u32,
            created_at: super::parse_datetime(&row.created_at)?,
            updated_at: super::parse_datetime(&row.updated_at)?,
            version: row.version as u64,
        })
    }
}
