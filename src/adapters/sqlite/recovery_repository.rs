//! SQLite implementation of the RecoveryRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{FailureKind, RecoveryAttempt, RecoveryOutcome, RecoveryStrategy};
use crate::domain::ports::RecoveryRepository;

#[derive(Clone)]
pub struct SqliteRecoveryRepository {
    pool: SqlitePool,
}

impl SqliteRecoveryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecoveryRepository for SqliteRecoveryRepository {
    async fn record(&self, attempt: &RecoveryAttempt) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO recovery_attempts (id, workspace_id, task_id, failure_kind, failure_signature, strategy,
               confidence, outcome, attempted_at, resolved_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(attempt.id.to_string())
        .bind(attempt.workspace_id.to_string())
        .bind(attempt.task_id.to_string())
        .bind(attempt.failure_kind.as_str())
        .bind(&attempt.failure_signature)
        .bind(attempt.strategy.as_str())
        .bind(attempt.confidence)
        .bind(attempt.outcome.as_str())
        .bind(attempt.attempted_at.to_rfc3339())
        .bind(attempt.resolved_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, attempt: &RecoveryAttempt) -> DomainResult<()> {
        let result = sqlx::query("UPDATE recovery_attempts SET outcome = ?, resolved_at = ? WHERE id = ?")
            .bind(attempt.outcome.as_str())
            .bind(attempt.resolved_at.map(|t| t.to_rfc3339()))
            .bind(attempt.id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::Database(format!("recovery attempt {} not found", attempt.id)));
        }

        Ok(())
    }

    async fn list_by_task(&self, task_id: Uuid) -> DomainResult<Vec<RecoveryAttempt>> {
        let rows: Vec<RecoveryAttemptRow> = sqlx::query_as("SELECT * FROM recovery_attempts WHERE task_id = ? ORDER BY attempted_at")
            .bind(task_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_by_workspace(&self, workspace_id: Uuid) -> DomainResult<Vec<RecoveryAttempt>> {
        let rows: Vec<RecoveryAttemptRow> = sqlx::query_as("SELECT * FROM recovery_attempts WHERE workspace_id = ? ORDER BY attempted_at")
            .bind(workspace_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn count_by_signature(&self, workspace_id: Uuid, signature: &str) -> DomainResult<u32> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM recovery_attempts WHERE workspace_id = ? AND failure_signature = ?")
            .bind(workspace_id.to_string())
            .bind(signature)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0 as u32)
    }
}

#[derive(sqlx::FromRow)]
struct RecoveryAttemptRow {
    id: String,
    workspace_id: String,
    task_id: String,
    failure_kind: String,
    failure_signature: String,
    strategy: String,
    confidence: f64,
    outcome: String,
    attempted_at: String,
    resolved_at: Option<String>,
}

impl TryFrom<RecoveryAttemptRow> for RecoveryAttempt {
    type Error = DomainError;

    fn try_from(row: RecoveryAttemptRow) -> Result<Self, Self::Error> {
        let failure_kind = FailureKind::from_str(&row.failure_kind).ok_or_else(|| DomainError::Serialization(format!("invalid failure kind: {}", row.failure_kind)))?;
        let strategy = RecoveryStrategy::from_str(&row.strategy).ok_or_else(|| DomainError::Serialization(format!("invalid recovery strategy: {}", row.strategy)))?;
        let outcome = RecoveryOutcome::from_str(&row.outcome).ok_or_else(|| DomainError::Serialization(format!("invalid recovery outcome: {}", row.outcome)))?;

        Ok(RecoveryAttempt {
            id: super::parse_uuid(&row.id)?,
            workspace_id: super::parse_uuid(&row.workspace_id)?,
            task_id: super::parse_uuid(&row.task_id)?,
            failure_kind,
            failure_signature: row.failure_signature,
            strategy,
            confidence: row.confidence,
            outcome,
            attempted_at: super::parse_datetime(&row.attempted_at)?,
            resolved_at: super::parse_optional_datetime(row.resolved_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use crate::adapters::sqlite::goal_repository::SqliteGoalRepository;
    use crate::adapters::sqlite::task_repository::SqliteTaskRepository;
    use crate::adapters::sqlite::workspace_repository::SqliteWorkspaceRepository;
    use crate::domain::models::{recovery::failure_signature, Goal, MetricType, Task, Workspace};
    use crate::domain::ports::{GoalRepository, TaskRepository, WorkspaceRepository};
    use chrono::Utc;

    #[tokio::test]
    async fn count_by_signature_tracks_recurrence() {
        let pool = create_migrated_test_pool().await.unwrap();
        let workspaces = SqliteWorkspaceRepository::new(pool.clone());
        let goals = SqliteGoalRepository::new(pool.clone());
        let tasks = SqliteTaskRepository::new(pool.clone());
        let recoveries = SqliteRecoveryRepository::new(pool);

        let workspace = Workspace::new("Outreach", "100 leads");
        workspaces.create(&workspace).await.unwrap();
        let goal = Goal::new(workspace.id, "book demos", MetricType::Count, 100.0);
        goals.create(&goal).await.unwrap();
        let task = Task::new(workspace.id, goal.id, "Draft email", "Write a cold email");
        tasks.create(&task).await.unwrap();

        let signature = failure_signature(&task.semantic_hash, FailureKind::ToolFailure);
        let attempt = RecoveryAttempt {
            id: Uuid::new_v4(),
            workspace_id: workspace.id,
            task_id: task.id,
            failure_kind: FailureKind::ToolFailure,
            failure_signature: signature.clone(),
            strategy: RecoveryStrategy::RetryWithDelay,
            confidence: 0.8,
            outcome: RecoveryOutcome::Pending,
            attempted_at: Utc::now(),
            resolved_at: None,
        };
        recoveries.record(&attempt).await.unwrap();

        assert_eq!(recoveries.count_by_signature(workspace.id, &signature).await.unwrap(), 1);
    }
}
