//! Deliverable Aggregator.
//!
//! Folds completed task outputs into the goal's deliverable, create-or-append
//! on the `(workspace_id, goal_id, title)` key, and promotes a deliverable to
//! `completed` once its goal has crossed the readiness threshold and it
//! carries enough entries to be worth shipping. On close, delegates to the
//! Content Transformer to compute `display_content`; a failed transformation
//! does not invalidate the deliverable.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Deliverable, DeliverableEntry, DeliverableStatus, Goal, Task, TaskOutput, TransformationStatus};
use crate::domain::ports::DeliverableRepository;
use crate::services::content_transformer::ContentTransformer;

pub const DEFAULT_MIN_COMPLETED_TASKS_FOR_DELIVERABLE: usize = 2;
pub const DEFAULT_DELIVERABLE_READINESS_THRESHOLD: f64 = 100.0;

pub struct DeliverableAggregator<D: DeliverableRepository> {
    deliverables: Arc<D>,
    transformer: ContentTransformer,
    min_completed_tasks: usize,
    readiness_threshold: f64,
}

impl<D: DeliverableRepository> DeliverableAggregator<D> {
    pub fn new(deliverables: Arc<D>, transformer: ContentTransformer) -> Self {
        Self {
            deliverables,
            transformer,
            min_completed_tasks: DEFAULT_MIN_COMPLETED_TASKS_FOR_DELIVERABLE,
            readiness_threshold: DEFAULT_DELIVERABLE_READINESS_THRESHOLD,
        }
    }

    pub fn with_thresholds(mut self, min_completed_tasks: usize, readiness_threshold: f64) -> Self {
        self.min_completed_tasks = min_completed_tasks;
        self.readiness_threshold = readiness_threshold;
        self
    }

    /// Derives the deliverable title for a goal. Every task completed under
    /// the same goal folds into a single deliverable unless the caller routes
    /// distinct task families under distinct titles.
    pub fn title_for_goal(goal: &Goal) -> String {
        format!("Deliverable: {}", goal.description)
    }

    /// Ingests one completed task's result into its goal's deliverable,
    /// creating the deliverable on first ingest and merging on re-ingest of
    /// an already-recorded task (revision flow).
    pub async fn ingest(&self, task: &Task, goal: &Goal) -> DomainResult<Deliverable> {
        let Some(result) = &task.result else {
            return Err(DomainError::ValidationFailed("cannot ingest a task with no result".to_string()));
        };

        let title = Self::title_for_goal(goal);
        let mut deliverable = match self.deliverables.get_by_title(task.workspace_id, goal.id, &title).await? {
            Some(existing) => existing,
            None => {
                let mut fresh = Deliverable::new(task.workspace_id, goal.id, &title);
                fresh.transition_to(DeliverableStatus::InProgress).expect("draft always admits in_progress");
                self.deliverables.create(&fresh).await?;
                fresh
            }
        };

        let content = match &result.output {
            TaskOutput::Structured { records } => serde_json::json!({ "records": records }),
            TaskOutput::Document { markdown } => serde_json::json!({ "markdown": markdown }),
            TaskOutput::Artifact { artifacts } => serde_json::json!({ "artifacts": artifacts }),
            TaskOutput::Mixed { summary, records, artifacts } => {
                serde_json::json!({ "summary": summary, "records": records, "artifacts": artifacts })
            }
        };

        deliverable.append(DeliverableEntry {
            task_id: task.id,
            summary: result.summary.clone(),
            content,
            appended_at: chrono::Utc::now(),
        });
        deliverable.business_value_score = (deliverable.business_value_score + result.goal_contribution / 100.0).min(1.0);

        if self.ready_to_close(&deliverable, goal) {
            self.close_with_transformation(&mut deliverable, goal).await;
        }

        self.deliverables.update(&deliverable).await?;
        Ok(deliverable)
    }

    fn ready_to_close(&self, deliverable: &Deliverable, goal: &Goal) -> bool {
        deliverable.status == DeliverableStatus::InProgress
            && goal.progress_percentage() >= self.readiness_threshold
            && deliverable.meets_minimum_entries(self.min_completed_tasks)
    }

    /// Transitions `in_progress -> completed` and invokes the Content
    /// Transformer. A transformation failure is recorded but never blocks
    /// the status transition (SPEC §4.6).
    async fn close_with_transformation(&self, deliverable: &mut Deliverable, goal: &Goal) {
        let business_context = serde_json::json!({ "goal_description": goal.description, "metric_type": goal.metric_type.as_str() });
        let outcome = self.transformer.transform(&deliverable.content, &business_context).await;
        match outcome.display_content {
            Some(display) => deliverable.apply_transformation_success(display, outcome.format, outcome.confidence),
            None => deliverable.apply_transformation_outcome(outcome.status),
        }
        let _ = deliverable.transition_to(DeliverableStatus::Completed);
    }

    /// Forces closure of an explicitly-requested deliverable (API-level
    /// `trigger_recovery`-adjacent operation), bypassing the readiness gate.
    pub async fn close(&self, deliverable_id: Uuid, goal: &Goal) -> DomainResult<Deliverable> {
        let mut deliverable = self
            .deliverables
            .get(deliverable_id)
            .await?
            .ok_or(DomainError::DeliverableNotFound(deliverable_id))?;
        self.close_with_transformation(&mut deliverable, goal).await;
        self.deliverables.update(&deliverable).await?;
        Ok(deliverable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    use crate::domain::models::{GoalPriority, MetricType, TaskResult, TaskStatus};

    #[derive(Default)]
    struct InMemoryDeliverables {
        rows: StdMutex<HashMap<Uuid, Deliverable>>,
    }

    #[async_trait]
    impl DeliverableRepository for InMemoryDeliverables {
        async fn create(&self, d: &Deliverable) -> DomainResult<()> {
            self.rows.lock().unwrap().insert(d.id, d.clone());
            Ok(())
        }
        async fn get(&self, id: Uuid) -> DomainResult<Option<Deliverable>> {
            Ok(self.rows.lock().unwrap().get(&id).cloned())
        }
        async fn update(&self, d: &Deliverable) -> DomainResult<()> {
            self.rows.lock().unwrap().insert(d.id, d.clone());
            Ok(())
        }
        async fn list_by_workspace(&self, workspace_id: Uuid) -> DomainResult<Vec<Deliverable>> {
            Ok(self.rows.lock().unwrap().values().filter(|d| d.workspace_id == workspace_id).cloned().collect())
        }
        async fn list_by_goal(&self, goal_id: Uuid) -> DomainResult<Vec<Deliverable>> {
            Ok(self.rows.lock().unwrap().values().filter(|d| d.goal_id == goal_id).cloned().collect())
        }
        async fn get_by_title(&self, workspace_id: Uuid, goal_id: Uuid, title: &str) -> DomainResult<Option<Deliverable>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .values()
                .find(|d| d.workspace_id == workspace_id && d.goal_id == goal_id && d.title == title)
                .cloned())
        }
    }

    fn completed_task(workspace_id: Uuid, goal_id: Uuid, summary: &str) -> Task {
        let mut task = Task::new(workspace_id, goal_id, "write section", "draft a section");
        task.status = TaskStatus::Completed;
        task.result = Some(TaskResult {
            summary: summary.to_string(),
            output: TaskOutput::Document { markdown: format!("body for {summary}") },
            tool_trace: vec![],
            execution_time_ms: 10,
            agent_metadata: serde_json::json!({}),
            goal_contribution: 50.0,
        });
        task
    }

    fn aggregator() -> DeliverableAggregator<InMemoryDeliverables> {
        DeliverableAggregator::new(Arc::new(InMemoryDeliverables::default()), ContentTransformer::new_rule_based())
    }

    #[tokio::test]
    async fn ingest_creates_then_appends_to_same_deliverable() {
        let aggregator = aggregator();
        let mut goal = Goal::new(Uuid::new_v4(), "Grow signups", MetricType::Count, 100.0).with_priority(GoalPriority::Medium);
        goal.status = crate::domain::models::GoalStatus::Active;

        let task_a = completed_task(goal.workspace_id, goal.id, "first");
        let d1 = aggregator.ingest(&task_a, &goal).await.unwrap();
        assert_eq!(d1.entry_count(), 1);

        let task_b = completed_task(goal.workspace_id, goal.id, "second");
        let d2 = aggregator.ingest(&task_b, &goal).await.unwrap();
        assert_eq!(d2.id, d1.id);
        assert_eq!(d2.entry_count(), 2);
    }

    #[tokio::test]
    async fn completes_and_transforms_once_goal_and_entry_thresholds_met() {
        let aggregator = aggregator();
        let mut goal = Goal::new(Uuid::new_v4(), "Grow signups", MetricType::Count, 100.0).with_priority(GoalPriority::Medium);
        goal.status = crate::domain::models::GoalStatus::Active;
        goal.advance(100.0).unwrap();

        let task_a = completed_task(goal.workspace_id, goal.id, "first");
        aggregator.ingest(&task_a, &goal).await.unwrap();
        let task_b = completed_task(goal.workspace_id, goal.id, "second");
        let d = aggregator.ingest(&task_b, &goal).await.unwrap();

        assert_eq!(d.status, DeliverableStatus::Completed);
        assert_eq!(d.transformation_status, TransformationStatus::Success);
        assert!(d.display_content.is_some());
    }

    #[tokio::test]
    async fn stays_in_progress_below_entry_minimum_even_if_goal_complete() {
        let aggregator = aggregator();
        let mut goal = Goal::new(Uuid::new_v4(), "Grow signups", MetricType::Count, 100.0).with_priority(GoalPriority::Medium);
        goal.status = crate::domain::models::GoalStatus::Active;
        goal.advance(100.0).unwrap();

        let task_a = completed_task(goal.workspace_id, goal.id, "only one");
        let d = aggregator.ingest(&task_a, &goal).await.unwrap();

        assert_eq!(d.status, DeliverableStatus::InProgress);
    }
}
