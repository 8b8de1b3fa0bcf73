//! SQLite implementation of the GoalRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Goal, GoalPriority, GoalStatus, MetricType};
use crate::domain::ports::GoalRepository;

#[derive(Clone)]
pub struct SqliteGoalRepository {
    pool: SqlitePool,
}

impl SqliteGoalRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GoalRepository for SqliteGoalRepository {
    async fn create(&self, goal: &Goal) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO goals (id, workspace_id, description, metric_type, target_value, current_value, status, priority, created_at, updated_at, version)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(goal.id.to_string())
        .bind(goal.workspace_id.to_string())
        .bind(&goal.description)
        .bind(goal.metric_type.as_str())
        .bind(goal.target_value)
        .bind(goal.current_value)
        .bind(goal.status.as_str())
        .bind(goal.priority.as_str())
        .bind(goal.created_at.to_rfc3339())
        .bind(goal.updated_at.to_rfc3339())
        .bind(goal.version as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Goal>> {
        let row: Option<GoalRow> = sqlx::query_as("SELECT * FROM goals WHERE id = ?").bind(id.to_string()).fetch_optional(&self.pool).await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update(&self, goal: &Goal) -> DomainResult<()> {
        // Mutators on `Goal` bump `version` in place before `update` is
        // called, so the stored row must still be one version behind.
        let previous_version = (goal.version as i64).saturating_sub(1);
        let result = sqlx::query(
            r#"UPDATE goals SET description = ?, metric_type = ?, target_value = ?, current_value = ?, status = ?,
               priority = ?, updated_at = ?, version = ? WHERE id = ? AND version = ?"#,
        )
        .bind(&goal.description)
        .bind(goal.metric_type.as_str())
        .bind(goal.target_value)
        .bind(goal.current_value)
        .bind(goal.status.as_str())
        .bind(goal.priority.as_str())
        .bind(goal.updated_at.to_rfc3339())
        .bind(goal.version as i64)
        .bind(goal.id.to_string())
        .bind(previous_version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.get(goal.id).await? {
                Some(_) => Err(DomainError::ConcurrencyConflict { entity: "goal".to_string(), id: goal.id.to_string() }),
                None => Err(DomainError::GoalNotFound(goal.id)),
            };
        }

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM goals WHERE id = ?").bind(id.to_string()).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(DomainError::GoalNotFound(id));
        }
        Ok(())
    }

    async fn list_by_workspace(&self, workspace_id: Uuid) -> DomainResult<Vec<Goal>> {
        let rows: Vec<GoalRow> = sqlx::query_as("SELECT * FROM goals WHERE workspace_id = ? ORDER BY created_at")
            .bind(workspace_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_by_status(&self, workspace_id: Uuid, status: GoalStatus) -> DomainResult<Vec<Goal>> {
        let rows: Vec<GoalRow> = sqlx::query_as("SELECT * FROM goals WHERE workspace_id = ? AND status = ? ORDER BY priority DESC, created_at")
            .bind(workspace_id.to_string())
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct GoalRow {
    id: String,
    workspace_id: String,
    description: String,
    metric_type: String,
    target_value: f64,
    current_value: f64,
    status: String,
    priority: String,
    created_at: String,
    updated_at: String,
    version: i64,
}

impl TryFrom<GoalRow> for Goal {
    type Error = DomainError;

    fn try_from(row: GoalRow) -> Result<Self, Self::Error> {
        let metric_type = MetricType::from_str(&row.metric_type).ok_or_else(|| DomainError::Serialization(format!("invalid metric type: {}", row.metric_type)))?;
        let status = GoalStatus::from_str(&row.status).ok_or_else(|| DomainError::Serialization(format!("invalid goal status: {}", row.status)))?;
        let priority = GoalPriority::from_str(&row.priority).ok_or_else(|| DomainError::Serialization(format!("invalid goal priority: {}", row.priority)))?;

        Ok(Goal {
            id: super::parse_uuid(&row.id)?,
            workspace_id: super::parse_uuid(&row.workspace_id)?,
            description: row.description,
            metric_type,
            target_value: row.target_value,
            current_value: row.current_value,
            status,
            priority,
            created_at: super::parse_datetime(&row.created_at)?,
            updated_at: super::parse_datetime(&row.updated_at)?,
            version: row.version as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use crate::adapters::sqlite::workspace_repository::SqliteWorkspaceRepository;
    use crate::domain::models::Workspace;
    use crate::domain::ports::WorkspaceRepository;

    async fn setup() -> (SqliteWorkspaceRepository, SqliteGoalRepository) {
        let pool = create_migrated_test_pool().await.unwrap();
        (SqliteWorkspaceRepository::new(pool.clone()), SqliteGoalRepository::new(pool))
    }

    #[tokio::test]
    async fn create_then_list_by_workspace() {
        let (workspaces, goals) = setup().await;
        let workspace = Workspace::new("Outreach", "100 leads");
        workspaces.create(&workspace).await.unwrap();

        let goal = Goal::new(workspace.id, "book 100 demos", MetricType::Count, 100.0);
        goals.create(&goal).await.unwrap();

        let listed = goals.list_by_workspace(workspace.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].target_value, 100.0);
    }

    #[tokio::test]
    async fn update_persists_progress() {
        let (workspaces, goals) = setup().await;
        let workspace = Workspace::new("Outreach", "100 leads");
        workspaces.create(&workspace).await.unwrap();

        let mut goal = Goal::new(workspace.id, "book 100 demos", MetricType::Count, 100.0);
        goals.create(&goal).await.unwrap();

        goal.advance(10.0).unwrap();
        goals.update(&goal).await.unwrap();

        let fetched = goals.get(goal.id).await.unwrap().unwrap();
        assert_eq!(fetched.current_value, 10.0);
    }
}
