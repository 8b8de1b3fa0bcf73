//! SQLite implementation of the DeliverableRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Deliverable, DeliverableEntry, DeliverableStatus, DisplayFormat, TransformationStatus};
use crate::domain::ports::DeliverableRepository;

#[derive(Clone)]
pub struct SqliteDeliverableRepository {
    pool: SqlitePool,
}

impl SqliteDeliverableRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeliverableRepository for SqliteDeliverableRepository {
    async fn create(&self, deliverable: &Deliverable) -> DomainResult<()> {
        let entries_json = serde_json::to_string(&deliverable.entries)?;

        sqlx::query(
            r#"INSERT INTO deliverables (
                id, workspace_id, goal_id, title, status, entries, content, display_content, display_format,
                display_quality_score, transformation_status, transformation_timestamp, business_value_score,
                created_at, updated_at, version
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(deliverable.id.to_string())
        .bind(deliverable.workspace_id.to_string())
        .bind(deliverable.goal_id.to_string())
        .bind(&deliverable.title)
        .bind(deliverable.status.as_str())
        .bind(&entries_json)
        .bind(&deliverable.content)
        .bind(&deliverable.display_content)
        .bind(deliverable.display_format.as_str())
        .bind(deliverable.display_quality_score)
        .bind(deliverable.transformation_status.as_str())
        .bind(deliverable.transformation_timestamp.map(|t| t.to_rfc3339()))
        .bind(deliverable.business_value_score)
        .bind(deliverable.created_at.to_rfc3339())
        .bind(deliverable.updated_at.to_rfc3339())
        .bind(deliverable.version as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Deliverable>> {
        let row: Option<DeliverableRow> = sqlx::query_as("SELECT * FROM deliverables WHERE id = ?").bind(id.to_string()).fetch_optional(&self.pool).await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update(&self, deliverable: &Deliverable) -> DomainResult<()> {
        let entries_json = serde_json::to_string(&deliverable.entries)?;
        let previous_version = (deliverable.version as i64).saturating_sub(1);

        let result = sqlx::query(
            r#"UPDATE deliverables SET title = ?, status = ?, entries = ?, content = ?, display_content = ?,
               display_format = ?, display_quality_score = ?, transformation_status = ?, transformation_timestamp = ?,
               business_value_score = ?, updated_at = ?, version = ? WHERE id = ? AND version = ?"#,
        )
        .bind(&deliverable.title)
        .bind(deliverable.status.as_str())
        .bind(&entries_json)
        .bind(&deliverable.content)
        .bind(&deliverable.display_content)
        .bind(deliverable.display_format.as_str())
        .bind(deliverable.display_quality_score)
        .bind(deliverable.transformation_status.as_str())
        .bind(deliverable.transformation_timestamp.map(|t| t.to_rfc3339()))
        .bind(deliverable.business_value_score)
        .bind(deliverable.updated_at.to_rfc3339())
        .bind(deliverable.version as i64)
        .bind(deliverable.id.to_string())
        .bind(previous_version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.get(deliverable.id).await? {
                Some(_) => Err(DomainError::ConcurrencyConflict { entity: "deliverable".to_string(), id: deliverable.id.to_string() }),
                None => Err(DomainError::DeliverableNotFound(deliverable.id)),
            };
        }

        Ok(())
    }

    async fn list_by_workspace(&self, workspace_id: Uuid) -> DomainResult<Vec<Deliverable>> {
        let rows: Vec<DeliverableRow> = sqlx::query_as("SELECT * FROM deliverables WHERE workspace_id = ? ORDER BY created_at")
            .bind(workspace_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_by_goal(&self, goal_id: Uuid) -> DomainResult<Vec<Deliverable>> {
        let rows: Vec<DeliverableRow> = sqlx::query_as("SELECT * FROM deliverables WHERE goal_id = ? ORDER BY created_at")
            .bind(goal_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn get_by_title(&self, workspace_id: Uuid, goal_id: Uuid, title: &str) -> DomainResult<Option<Deliverable>> {
        let row: Option<DeliverableRow> = sqlx::query_as("SELECT * FROM deliverables WHERE workspace_id = ? AND goal_id = ? AND title = ?")
            .bind(workspace_id.to_string())
            .bind(goal_id.to_string())
            .bind(title)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }
}

#[derive(sqlx::FromRow)]
struct DeliverableRow {
    id: String,
    workspace_id: String,
    goal_id: String,
    title: String,
    status: String,
    entries: String,
    content: serde_json::Value,
    display_content: Option<String>,
    display_format: String,
    display_quality_score: f64,
    transformation_status: String,
    transformation_timestamp: Option<String>,
    business_value_score: f64,
    created_at: String,
    updated_at: String,
    version: i64,
}

impl TryFrom<DeliverableRow> for Deliverable {
    type Error = DomainError;

    fn try_from(row: DeliverableRow) -> Result<Self, Self::Error> {
        let status = DeliverableStatus::from_str(&row.status).ok_or_else(|| DomainError::Serialization(format!("invalid deliverable status: {}", row.status)))?;
        let display_format = DisplayFormat::from_str(&row.display_format).ok_or_else(|| DomainError::Serialization(format!("invalid display format: {}", row.display_format)))?;
        let transformation_status = TransformationStatus::from_str(&row.transformation_status)
            .ok_or_else(|| DomainError::Serialization(format!("invalid transformation status: {}", row.transformation_status)))?;
        let entries: Vec<DeliverableEntry> = serde_json::from_str(&row.entries)?;

        Ok(Deliverable {
            id: super::parse_uuid(&row.id)?,
            workspace_id: super::parse_uuid(&row.workspace_id)?,
            goal_id: super::parse_uuid(&row.goal_id)?,
            title: row.title,
            status,
            entries,
            content: row.content,
            display_content: row.display_content,
            display_format,
            display_quality_score: row.display_quality_score,
            transformation_status,
            transformation_timestamp: super::parse_optional_datetime(row.transformation_timestamp)?,
            business_value_score: row.business_value_score,
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
    use crate::adapters::sqlite::goal_repository::SqliteGoalRepository;
    use crate::adapters::sqlite::workspace_repository::SqliteWorkspaceRepository;
    use crate::domain::models::{Goal, MetricType, Workspace};
    use crate::domain::ports::{GoalRepository, WorkspaceRepository};

    async fn setup() -> (SqliteDeliverableRepository, Uuid, Uuid) {
        let pool = create_migrated_test_pool().await.unwrap();
        let workspaces = SqliteWorkspaceRepository::new(pool.clone());
        let goals = SqliteGoalRepository::new(pool.clone());
        let deliverables = SqliteDeliverableRepository::new(pool);

        let workspace = Workspace::new("Outreach", "100 leads");
        workspaces.create(&workspace).await.unwrap();
        let goal = Goal::new(workspace.id, "book demos", MetricType::Count, 100.0);
        goals.create(&goal).await.unwrap();

        (deliverables, workspace.id, goal.id)
    }

    #[tokio::test]
    async fn create_then_get_by_title() {
        let (deliverables, workspace_id, goal_id) = setup().await;
        let deliverable = Deliverable::new(workspace_id, goal_id, "Outreach email batch");
        deliverables.create(&deliverable).await.unwrap();

        let fetched = deliverables.get_by_title(workspace_id, goal_id, "Outreach email batch").await.unwrap();
        assert!(fetched.is_some());
    }

    #[tokio::test]
    async fn stale_update_conflicts() {
        let (deliverables, workspace_id, goal_id) = setup().await;
        let deliverable = Deliverable::new(workspace_id, goal_id, "Outreach email batch");
        deliverables.create(&deliverable).await.unwrap();

        let stale = deliverable.clone();
        let mut fresh = deliverables.get(deliverable.id).await.unwrap().unwrap();
        fresh.business_value_score = 0.5;
        fresh.version += 1;
        deliverables.update(&fresh).await.unwrap();

        let result = deliverables.update(&stale).await;
        assert!(result.is_err());
    }
}
