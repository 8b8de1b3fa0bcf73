//! SQLite implementation of the TaskRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{FailureKind, QualityFlag, Task, TaskPriority, TaskResult, TaskStatus};
use crate::domain::ports::{TaskFilter, TaskRepository};

#[derive(Clone)]
pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn create(&self, task: &Task) -> DomainResult<()> {
        let result_json = task.result.as_ref().map(serde_json::to_string).transpose()?;

        sqlx::query(
            r#"INSERT INTO tasks (
                id, workspace_id, goal_id, agent_id, name, description, status, priority, priority_score,
                recovery_count, last_failure_type, quality_flag, semantic_hash, cooldown_until, result,
                created_at, updated_at, version
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(task.id.to_string())
        .bind(task.workspace_id.to_string())
        .bind(task.goal_id.to_string())
        .bind(task.agent_id.map(|id| id.to_string()))
        .bind(&task.name)
        .bind(&task.description)
        .bind(task.status.as_str())
        .bind(task.priority.as_str())
        .bind(task.priority_score)
        .bind(i64::from(task.recovery_count))
        .bind(task.last_failure_type.map(|k| k.as_str()))
        .bind(task.quality_flag.as_str())
        .bind(&task.semantic_hash)
        .bind(task.cooldown_until.map(|t| t.to_rfc3339()))
        .bind(result_json)
        .bind(task.created_at.to_rfc3339())
        .bind(task.updated_at.to_rfc3339())
        .bind(task.version as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "task"))?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id = ?").bind(id.to_string()).fetch_optional(&self.pool).await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update(&self, task: &Task) -> DomainResult<()> {
        let result_json = task.result.as_ref().map(serde_json::to_string).transpose()?;
        // Mutators on `Task` bump `version` in place before `update` is called.
        let previous_version = (task.version as i64).saturating_sub(1);

        let result = sqlx::query(
            r#"UPDATE tasks SET agent_id = ?, name = ?, description = ?, status = ?, priority = ?, priority_score = ?,
               recovery_count = ?, last_failure_type = ?, quality_flag = ?, cooldown_until = ?, result = ?,
               updated_at = ?, version = ? WHERE id = ? AND version = ?"#,
        )
        .bind(task.agent_id.map(|id| id.to_string()))
        .bind(&task.name)
        .bind(&task.description)
        .bind(task.status.as_str())
        .bind(task.priority.as_str())
        .bind(task.priority_score)
        .bind(i64::from(task.recovery_count))
        .bind(task.last_failure_type.map(|k| k.as_str()))
        .bind(task.quality_flag.as_str())
        .bind(task.cooldown_until.map(|t| t.to_rfc3339()))
        .bind(result_json)
        .bind(task.updated_at.to_rfc3339())
        .bind(task.version as i64)
        .bind(task.id.to_string())
        .bind(previous_version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.get(task.id).await? {
                Some(_) => Err(DomainError::ConcurrencyConflict { entity: "task".to_string(), id: task.id.to_string() }),
                None => Err(DomainError::TaskNotFound(task.id)),
            };
        }

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?").bind(id.to_string()).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(DomainError::TaskNotFound(id));
        }
        Ok(())
    }

    async fn list(&self, workspace_id: Uuid, filter: TaskFilter) -> DomainResult<Vec<Task>> {
        let mut query = String::from("SELECT * FROM tasks WHERE workspace_id = ?");
        if filter.status.is_some() {
            query.push_str(" AND status = ?");
        }
        if filter.priority.is_some() {
            query.push_str(" AND priority = ?");
        }
        if filter.goal_id.is_some() {
            query.push_str(" AND goal_id = ?");
        }
        if filter.agent_id.is_some() {
            query.push_str(" AND agent_id = ?");
        }
        query.push_str(" ORDER BY created_at");

        let mut q = sqlx::query_as::<_, TaskRow>(&query).bind(workspace_id.to_string());
        if let Some(status) = filter.status {
            q = q.bind(status.as_str().to_string());
        }
        if let Some(priority) = filter.priority {
            q = q.bind(priority.as_str().to_string());
        }
        if let Some(goal_id) = filter.goal_id {
            q = q.bind(goal_id.to_string());
        }
        if let Some(agent_id) = filter.agent_id {
            q = q.bind(agent_id.to_string());
        }

        let rows: Vec<TaskRow> = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_by_goal(&self, goal_id: Uuid) -> DomainResult<Vec<Task>> {
        let rows: Vec<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE goal_id = ? ORDER BY created_at").bind(goal_id.to_string()).fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn get_ready_tasks(&self, workspace_id: Uuid, limit: usize) -> DomainResult<Vec<Task>> {
        let rows: Vec<TaskRow> = sqlx::query_as(
            "SELECT * FROM tasks WHERE workspace_id = ? AND status = 'ready' AND (cooldown_until IS NULL OR cooldown_until <= ?)
             ORDER BY priority_score DESC, created_at ASC LIMIT ?",
        )
        .bind(workspace_id.to_string())
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn count_pending(&self, workspace_id: Uuid) -> DomainResult<usize> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tasks WHERE workspace_id = ? AND status IN ('pending', 'ready')")
            .bind(workspace_id.to_string())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0 as usize)
    }

    async fn get_by_semantic_hash(&self, workspace_id: Uuid, semantic_hash: &str) -> DomainResult<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE workspace_id = ? AND semantic_hash = ?")
            .bind(workspace_id.to_string())
            .bind(semantic_hash)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }
}

/// Translates the `(workspace_id, semantic_hash)` unique-index violation
/// into the domain's dedicated error, rather than leaking a raw SQL message.
fn map_unique_violation(err: sqlx::Error, _entity: &str) -> DomainError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.message().contains("UNIQUE constraint failed") && db_err.message().contains("semantic_hash") {
            return DomainError::DuplicateTask;
        }
    }
    DomainError::from(err)
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    workspace_id: String,
    goal_id: String,
    agent_id: Option<String>,
    name: String,
    description: String,
    status: String,
    priority: String,
    priority_score: f64,
    recovery_count: i64,
    last_failure_type: Option<String>,
    quality_flag: String,
    semantic_hash: String,
    cooldown_until: Option<String>,
    result: Option<String>,
    created_at: String,
    updated_at: String,
    version: i64,
}

impl TryFrom<TaskRow> for Task {
    type Error = DomainError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let status = TaskStatus::from_str(&row.status).ok_or_else(|| DomainError::Serialization(format!("invalid task status: {}", row.status)))?;
        let priority = TaskPriority::from_str(&row.priority).ok_or_else(|| DomainError::Serialization(format!("invalid task priority: {}", row.priority)))?;
        let quality_flag = QualityFlag::from_str(&row.quality_flag).ok_or_else(|| DomainError::Serialization(format!("invalid quality flag: {}", row.quality_flag)))?;
        let last_failure_type = row.last_failure_type.map(|s| FailureKind::from_str(&s).ok_or_else(|| DomainError::Serialization(format!("invalid failure kind: {s}")))).transpose()?;
        let result: Option<TaskResult> = row.result.map(|s| serde_json::from_str(&s)).transpose()?;

        Ok(Task {
            id: super::parse_uuid(&row.id)?,
            workspace_id: super::parse_uuid(&row.workspace_id)?,
            goal_id: super::parse_uuid(&row.goal_id)?,
            agent_id: super::parse_optional_uuid(row.agent_id)?,
            name: row.name,
            description: row.description,
            status,
            priority,
            priority_score: row.priority_score,
            recovery_count: row.recovery_count as u32,
            last_failure_type,
            quality_flag,
            semantic_hash: row.semantic_hash,
            cooldown_until: super::parse_optional_datetime(row.cooldown_until)?,
            result,
            created_at: super::parse_datetime(&row.created_at)?,
            updated_at: super::parse_datetime(&row.updated_at)?,
            version: row.version as u64,
        })
    }
}
