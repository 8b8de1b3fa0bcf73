//! Task repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Task, TaskPriority, TaskStatus};

/// Filter criteria for listing tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub goal_id: Option<Uuid>,
    pub agent_id: Option<Uuid>,
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create(&self, task: &Task) -> DomainResult<()>;
    async fn get(&self, id: Uuid) -> DomainResult<Option<Task>>;

    /// Update with optimistic concurrency on `version`.
    async fn update(&self, task: &Task) -> DomainResult<()>;

    async fn delete(&self, id: Uuid) -> DomainResult<()>;
    async fn list(&self, workspace_id: Uuid, filter: TaskFilter) -> DomainResult<Vec<Task>>;
    async fn list_by_goal(&self, goal_id: Uuid) -> DomainResult<Vec<Task>>;

    /// Ready-status tasks for a workspace, ordered by `priority_score` descending.
    async fn get_ready_tasks(&self, workspace_id: Uuid, limit: usize) -> DomainResult<Vec<Task>>;

    async fn count_pending(&self, workspace_id: Uuid) -> DomainResult<usize>;

    /// Look up an existing task by its dedup key, enforcing
    /// `(workspace_id, semantic_hash)` uniqueness at the application layer.
    async fn get_by_semantic_hash(&self, workspace_id: Uuid, semantic_hash: &str) -> DomainResult<Option<Task>>;
}
