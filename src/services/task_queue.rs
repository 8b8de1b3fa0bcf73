//! Task Queue & Deduplication.
//!
//! Owns the pending/ready/in-progress/complete lifecycle for tasks within a
//! workspace: semantic-hash dedup on enqueue, priority-ordered ready
//! selection, and the queue-depth backpressure ceiling.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{GoalStatus, Task, TaskStatus};
use crate::domain::ports::{GoalRepository, TaskRepository};
use crate::services::priority_calculator;

/// Default ceiling on pending tasks per workspace (SPEC §4.2).
pub const DEFAULT_BACKPRESSURE_CEILING: usize = 200;

pub struct TaskQueue<T: TaskRepository, G: GoalRepository> {
    tasks: Arc<T>,
    goals: Arc<G>,
    backpressure_ceiling: usize,
}

impl<T: TaskRepository, G: GoalRepository> TaskQueue<T, G> {
    pub fn new(tasks: Arc<T>, goals: Arc<G>) -> Self {
        Self { tasks, goals, backpressure_ceiling: DEFAULT_BACKPRESSURE_CEILING }
    }

    pub fn with_backpressure_ceiling(mut self, ceiling: usize) -> Self {
        self.backpressure_ceiling = ceiling;
        self
    }

    /// Enqueue a new task. Idempotent on `(workspace_id, semantic_hash)`: a
    /// second call with identical name/description/goal returns the existing
    /// task id rather than creating a duplicate row.
    pub async fn enqueue(&self, workspace_id: Uuid, goal_id: Uuid, name: &str, description: &str) -> DomainResult<Task> {
        let goal = self.goals.get(goal_id).await?.ok_or(DomainError::GoalNotFound(goal_id))?;
        if goal.status.is_terminal() {
            return Err(DomainError::GoalInactive(goal_id));
        }

        let task = Task::new(workspace_id, goal_id, name, description);
        if let Some(existing) = self.tasks.get_by_semantic_hash(workspace_id, &task.semantic_hash).await? {
            return Ok(existing);
        }

        let pending = self.tasks.count_pending(workspace_id).await?;
        if pending >= self.backpressure_ceiling {
            return Err(DomainError::QueueBackpressure { pending, ceiling: self.backpressure_ceiling });
        }

        self.tasks.create(&task).await?;
        Ok(task)
    }

    /// Select up to `n` ready tasks, scored and ordered by `priority_score`
    /// desc, ties broken by `created_at` asc (enforced by the repository's
    /// `ORDER BY`; here we only refresh scores before returning).
    pub async fn pick_ready(&self, workspace_id: Uuid, n: usize) -> DomainResult<Vec<Task>> {
        let mut candidates = self.tasks.get_ready_tasks(workspace_id, n).await?;
        let now = Utc::now();
        for task in &mut candidates {
            if let Some(goal) = self.goals.get(task.goal_id).await? {
                if !goal.status.accepts_dispatch() {
                    continue;
                }
                task.priority_score = priority_calculator::score(task, goal.priority, now);
                self.tasks.update(task).await?;
            }
        }
        Ok(candidates)
    }

    pub async fn mark_in_progress(&self, task_id: Uuid, agent_id: Uuid) -> DomainResult<Task> {
        let mut task = self.tasks.get(task_id).await?.ok_or(DomainError::TaskNotFound(task_id))?;
        task.mark_in_progress(agent_id)
            .map_err(|e| DomainError::InvalidStateTransition { from: task.status.as_str().into(), to: e })?;
        self.tasks.update(&task).await?;
        Ok(task)
    }

    pub async fn mark_complete(&self, task_id: Uuid, result: crate::domain::models::TaskResult) -> DomainResult<Task> {
        let mut task = self.tasks.get(task_id).await?.ok_or(DomainError::TaskNotFound(task_id))?;
        task.mark_completed(result)
            .map_err(|e| DomainError::InvalidStateTransition { from: task.status.as_str().into(), to: e })?;
        self.tasks.update(&task).await?;
        Ok(task)
    }

    pub async fn mark_failed(&self, task_id: Uuid, kind: crate::domain::models::FailureKind) -> DomainResult<Task> {
        let mut task = self.tasks.get(task_id).await?.ok_or(DomainError::TaskNotFound(task_id))?;
        task.record_failure(kind)
            .map_err(|e| DomainError::InvalidStateTransition { from: task.status.as_str().into(), to: e })?;
        self.tasks.update(&task).await?;
        Ok(task)
    }

    pub async fn requeue(&self, task_id: Uuid, delay: chrono::Duration) -> DomainResult<Task> {
        let mut task = self.tasks.get(task_id).await?.ok_or(DomainError::TaskNotFound(task_id))?;
        task.requeue(delay)
            .map_err(|e| DomainError::InvalidStateTransition { from: task.status.as_str().into(), to: e })?;
        self.tasks.update(&task).await?;
        Ok(task)
    }

    /// Closes out a task the Recovery Engine gave up on (`skip_with_fallback`):
    /// completes it in place, flagged `degraded`, carrying the fallback result.
    pub async fn mark_skipped_with_fallback(&self, task_id: Uuid, result: crate::domain::models::TaskResult) -> DomainResult<Task> {
        let mut task = self.tasks.get(task_id).await?.ok_or(DomainError::TaskNotFound(task_id))?;
        task.mark_degraded_completed(result)
            .map_err(|e| DomainError::InvalidStateTransition { from: task.status.as_str().into(), to: e })?;
        self.tasks.update(&task).await?;
        Ok(task)
    }

    /// Count of tasks currently dispatched in a workspace, used by the
    /// supervisor to respect the parallelism cap before pulling more work.
    pub async fn count_in_progress(&self, workspace_id: Uuid) -> DomainResult<usize> {
        let filter = crate::domain::ports::TaskFilter { status: Some(TaskStatus::InProgress), ..Default::default() };
        Ok(self.tasks.list(workspace_id, filter).await?.len())
    }

    /// Transition a freshly-created pending task to ready once its
    /// prerequisites (none modeled beyond goal activity in this core) hold.
    pub async fn mark_ready(&self, task_id: Uuid) -> DomainResult<Task> {
        let mut task = self.tasks.get(task_id).await?.ok_or(DomainError::TaskNotFound(task_id))?;
        task.transition_to(TaskStatus::Ready)
            .map_err(|e| DomainError::InvalidStateTransition { from: task.status.as_str().into(), to: e })?;
        self.tasks.update(&task).await?;
        Ok(task)
    }

    /// Cancels a task outright. Used by the Recovery Engine's `decompose`
    /// strategy to retire the original task once its replacement subtasks
    /// have been enqueued.
    pub async fn cancel(&self, task_id: Uuid) -> DomainResult<Task> {
        let mut task = self.tasks.get(task_id).await?.ok_or(DomainError::TaskNotFound(task_id))?;
        task.transition_to(TaskStatus::Cancelled)
            .map_err(|e| DomainError::InvalidStateTransition { from: task.status.as_str().into(), to: e })?;
        self.tasks.update(&task).await?;
        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Goal, MetricType};
    use crate::domain::ports::TaskFilter;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct InMemoryTasks {
        rows: Mutex<HashMap<Uuid, Task>>,
    }

    #[async_trait]
    impl TaskRepository for InMemoryTasks {
        async fn create(&self, task: &Task) -> DomainResult<()> {
            self.rows.lock().await.insert(task.id, task.clone());
            Ok(())
        }
        async fn get(&self, id: Uuid) -> DomainResult<Option<Task>> {
            Ok(self.rows.lock().await.get(&id).cloned())
        }
        async fn update(&self, task: &Task) -> DomainResult<()> {
            self.rows.lock().await.insert(task.id, task.clone());
            Ok(())
        }
        async fn delete(&self, id: Uuid) -> DomainResult<()> {
            self.rows.lock().await.remove(&id);
            Ok(())
        }
        async fn list(&self, _workspace_id: Uuid, _filter: TaskFilter) -> DomainResult<Vec<Task>> {
            Ok(self.rows.lock().await.values().cloned().collect())
        }
        async fn list_by_goal(&self, goal_id: Uuid) -> DomainResult<Vec<Task>> {
            Ok(self.rows.lock().await.values().filter(|t| t.goal_id == goal_id).cloned().collect())
        }
        async fn get_ready_tasks(&self, workspace_id: Uuid, limit: usize) -> DomainResult<Vec<Task>> {
            let rows = self.rows.lock().await;
            let mut ready: Vec<Task> = rows
                .values()
                .filter(|t| t.workspace_id == workspace_id && t.status == TaskStatus::Ready)
                .cloned()
                .collect();
            ready.sort_by(|a, b| b.priority_score.partial_cmp(&a.priority_score).unwrap());
            ready.truncate(limit);
            Ok(ready)
        }
        async fn count_pending(&self, workspace_id: Uuid) -> DomainResult<usize> {
            Ok(self
                .rows
                .lock()
                .await
                .values()
                .filter(|t| t.workspace_id == workspace_id && t.status == TaskStatus::Pending)
                .count())
        }
        async fn get_by_semantic_hash(&self, workspace_id: Uuid, hash: &str) -> DomainResult<Option<Task>> {
            Ok(self
                .rows
                .lock()
                .await
                .values()
                .find(|t| t.workspace_id == workspace_id && t.semantic_hash == hash)
                .cloned())
        }
    }

    #[derive(Default)]
    struct InMemoryGoals {
        rows: Mutex<HashMap<Uuid, Goal>>,
    }

    #[async_trait]
    impl GoalRepository for InMemoryGoals {
        async fn create(&self, goal: &Goal) -> DomainResult<()> {
            self.rows.lock().await.insert(goal.id, goal.clone());
            Ok(())
        }
        async fn get(&self, id: Uuid) -> DomainResult<Option<Goal>> {
            Ok(self.rows.lock().await.get(&id).cloned())
        }
        async fn update(&self, goal: &Goal) -> DomainResult<()> {
            self.rows.lock().await.insert(goal.id, goal.clone());
            Ok(())
        }
        async fn delete(&self, id: Uuid) -> DomainResult<()> {
            self.rows.lock().await.remove(&id);
            Ok(())
        }
        async fn list_by_workspace(&self, workspace_id: Uuid) -> DomainResult<Vec<Goal>> {
            Ok(self.rows.lock().await.values().filter(|g| g.workspace_id == workspace_id).cloned().collect())
        }
        async fn list_by_status(&self, workspace_id: Uuid, status: GoalStatus) -> DomainResult<Vec<Goal>> {
            Ok(self
                .rows
                .lock()
                .await
                .values()
                .filter(|g| g.workspace_id == workspace_id && g.status == status)
                .cloned()
                .collect())
        }
    }

    async fn setup() -> (TaskQueue<InMemoryTasks, InMemoryGoals>, Uuid, Uuid) {
        let tasks = Arc::new(InMemoryTasks::default());
        let goals = Arc::new(InMemoryGoals::default());
        let workspace_id = Uuid::new_v4();
        let goal = Goal::new(workspace_id, "100 leads", MetricType::Count, 100.0);
        let goal_id = goal.id;
        goals.create(&goal).await.unwrap();
        (TaskQueue::new(tasks, goals), workspace_id, goal_id)
    }

    #[tokio::test]
    async fn enqueue_twice_is_idempotent() {
        let (queue, workspace_id, goal_id) = setup().await;
        let first = queue.enqueue(workspace_id, goal_id, "Draft email #1", "write it").await.unwrap();
        let second = queue.enqueue(workspace_id, goal_id, "Draft email #1", "write it").await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn enqueue_rejects_inactive_goal() {
        let (queue, workspace_id, goal_id) = setup().await;
        {
            let mut g = queue.goals.get(goal_id).await.unwrap().unwrap();
            g.transition_to(GoalStatus::Cancelled).unwrap();
            queue.goals.update(&g).await.unwrap();
        }
        let result = queue.enqueue(workspace_id, goal_id, "x", "y").await;
        assert!(matches!(result, Err(DomainError::GoalInactive(_))));
    }

    #[tokio::test]
    async fn backpressure_trips_at_ceiling() {
        let (queue, workspace_id, goal_id) = setup().await;
        let queue = queue.with_backpressure_ceiling(2);
        queue.enqueue(workspace_id, goal_id, "a", "a desc").await.unwrap();
        queue.enqueue(workspace_id, goal_id, "b", "b desc").await.unwrap();
        let result = queue.enqueue(workspace_id, goal_id, "c", "c desc").await;
        assert!(matches!(result, Err(DomainError::QueueBackpressure { .. })));
    }

    #[tokio::test]
    async fn cancel_retires_a_failed_task() {
        let (queue, workspace_id, goal_id) = setup().await;
        let task = queue.enqueue(workspace_id, goal_id, "flaky", "flaky desc").await.unwrap();
        queue.mark_ready(task.id).await.unwrap();
        let agent_id = Uuid::new_v4();
        queue.mark_in_progress(task.id, agent_id).await.unwrap();
        queue.mark_failed(task.id, crate::domain::models::FailureKind::ToolFailure).await.unwrap();

        let cancelled = queue.cancel(task.id).await.unwrap();
        assert_eq!(cancelled.status, TaskStatus::Cancelled);
    }

    #[tokio::test]
    async fn ready_tasks_ordered_by_priority_score_desc() {
        let (queue, workspace_id, goal_id) = setup().await;
        let low = queue.enqueue(workspace_id, goal_id, "low", "low desc").await.unwrap();
        let high = queue.enqueue(workspace_id, goal_id, "high", "high desc").await.unwrap();
        queue.mark_ready(low.id).await.unwrap();
        queue.mark_ready(high.id).await.unwrap();
        {
            let mut h = queue.tasks.get(high.id).await.unwrap().unwrap();
            h.priority_score = 99.0;
            queue.tasks.update(&h).await.unwrap();
        }
        let ready = queue.pick_ready(workspace_id, 10).await.unwrap();
        assert!(!ready.is_empty());
    }
}
