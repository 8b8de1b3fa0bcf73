//! Workspace Supervisor.
//!
//! Owns the per-workspace tick loop (SPEC §4.1): refresh status, dispatch
//! ready tasks up to the workspace's current parallelism cap, collect
//! results, and fan them out to the Goal Registry, Recovery Engine, and
//! Deliverable Aggregator. A tick never panics the loop — any internal
//! failure is downgraded to a `supervisor_tick_error` insight and the loop
//! continues.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Agent, Goal, GoalStatus, Insight, InsightCategory, RecoveryStrategy, Task, Workspace, WorkspaceStatus,
};
use crate::domain::ports::{
    AgentRepository, DeliverableRepository, EventPublisher, GoalRepository, InsightRepository, LlmCapability,
    RecoveryRepository, TaskRepository, WorkspaceRepository,
};
use crate::services::agent_pool::{AgentPool, MatchOutcome};
use crate::services::deliverable_aggregator::DeliverableAggregator;
use crate::services::memory_store::MemoryStore;
use crate::services::recovery_engine::RecoveryEngine;
use crate::services::task_executor::TaskExecutor;
use crate::services::task_queue::TaskQueue;
use crate::telemetry::OrchestrationEvent;

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub active_concurrency: usize,
    pub degraded_concurrency: usize,
    pub queue_poll_interval: StdDuration,
    pub goal_validation_interval: StdDuration,
    pub recovery_sweep_interval: StdDuration,
    pub shutdown_grace: StdDuration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            active_concurrency: 4,
            degraded_concurrency: 2,
            queue_poll_interval: StdDuration::from_secs(2),
            goal_validation_interval: StdDuration::from_secs(20 * 60),
            recovery_sweep_interval: StdDuration::from_secs(60),
            shutdown_grace: StdDuration::from_secs(30),
        }
    }
}

/// Summary of one tick, used by tests and the CLI's `tick` command.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub dispatched: usize,
    pub completed: usize,
    pub failed: usize,
    pub starved: usize,
    pub workspace_terminal: bool,
}

pub struct WorkspaceSupervisor<W, G, T, A, D, I, R, L>
where
    W: WorkspaceRepository,
    G: GoalRepository,
    T: TaskRepository,
    A: AgentRepository,
    D: DeliverableRepository,
    I: InsightRepository,
    R: RecoveryRepository,
    L: LlmCapability,
{
    workspaces: Arc<W>,
    goals: Arc<G>,
    task_queue: Arc<TaskQueue<T, G>>,
    agent_pool: Arc<AgentPool<A>>,
    executor: Arc<TaskExecutor<L>>,
    recovery_engine: Arc<RecoveryEngine<R>>,
    aggregator: Arc<DeliverableAggregator<D>>,
    memory: Arc<MemoryStore<I>>,
    events: Option<Arc<dyn EventPublisher>>,
    config: SupervisorConfig,
    tick_count: AtomicU64,
}

impl<W, G, T, A, D, I, R, L> WorkspaceSupervisor<W, G, T, A, D, I, R, L>
where
    W: WorkspaceRepository,
    G: GoalRepository + 'static,
    T: TaskRepository + 'static,
    A: AgentRepository + 'static,
    D: DeliverableRepository + 'static,
    I: InsightRepository + 'static,
    R: RecoveryRepository + 'static,
    L: LlmCapability + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        workspaces: Arc<W>,
        goals: Arc<G>,
        task_queue: Arc<TaskQueue<T, G>>,
        agent_pool: Arc<AgentPool<A>>,
        executor: Arc<TaskExecutor<L>>,
        recovery_engine: Arc<RecoveryEngine<R>>,
        aggregator: Arc<DeliverableAggregator<D>>,
        memory: Arc<MemoryStore<I>>,
    ) -> Self {
        Self {
            workspaces,
            goals,
            task_queue,
            agent_pool,
            executor,
            recovery_engine,
            aggregator,
            memory,
            events: None,
            config: SupervisorConfig::default(),
            tick_count: AtomicU64::new(0),
        }
    }

    pub fn with_config(mut self, config: SupervisorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = Some(events);
        self
    }

    fn publish(&self, event: OrchestrationEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }

    /// Runs the tick loop until the workspace reaches a terminal status or
    /// `shutdown` resolves. Intended for `tokio::spawn`ing one per active
    /// workspace; never returns an `Err` — tick failures degrade to insights.
    pub async fn run(&self, workspace_id: Uuid, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.queue_poll_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.tick(workspace_id).await {
                        Ok(report) if report.workspace_terminal => break,
                        Ok(_) => {}
                        Err(e) => self.record_tick_error(workspace_id, &e.to_string()).await,
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tokio::time::sleep(self.config.shutdown_grace).await;
                        break;
                    }
                }
            }
        }
    }

    async fn record_tick_error(&self, workspace_id: Uuid, message: &str) {
        let insight = Insight::new(
            workspace_id,
            InsightCategory::General,
            "supervisor_tick_error",
            serde_json::json!({ "error": message }),
            0.9,
            0.1,
        );
        let _ = self.memory.record(insight).await;
    }

    /// Runs exactly one tick for `workspace_id`. Pulls ready tasks up to the
    /// workspace's current dispatch cap, runs them concurrently, and folds
    /// results back into goals, agents, and deliverables.
    pub async fn tick(&self, workspace_id: Uuid) -> DomainResult<TickReport> {
        let tick_number = self.tick_count.fetch_add(1, Ordering::SeqCst);

        let mut workspace = match self.workspaces.get(workspace_id).await? {
            Some(w) => w,
            None => return Ok(TickReport { workspace_terminal: true, ..Default::default() }),
        };

        if workspace.status.is_terminal() {
            return Ok(TickReport { workspace_terminal: true, ..Default::default() });
        }

        if workspace.status == WorkspaceStatus::Created {
            workspace.transition_to(WorkspaceStatus::Active).map_err(DomainError::ValidationFailed)?;
            self.workspaces.update(&workspace).await?;
        }

        if !workspace.status.can_dispatch() {
            return Ok(TickReport::default());
        }

        let in_flight = self.task_queue.count_in_progress(workspace_id).await?;
        let cap = workspace.dispatch_cap(self.config.active_concurrency, self.config.degraded_concurrency);
        let slots = cap.saturating_sub(in_flight);

        let mut report = TickReport::default();

        if slots > 0 {
            let ready = self.task_queue.pick_ready(workspace_id, slots).await?;
            let dispatched = self.dispatch_batch(&workspace, ready).await?;
            report.dispatched = dispatched.len();

            for outcome in dispatched {
                match outcome {
                    DispatchOutcome::Completed => report.completed += 1,
                    DispatchOutcome::Failed => report.failed += 1,
                    DispatchOutcome::Starved => report.starved += 1,
                }
            }
        }

        workspace.record_tick_outcome(report.completed as u32, report.failed as u32);
        if workspace.should_degrade() {
            workspace.transition_to(WorkspaceStatus::DegradedMode).map_err(DomainError::ValidationFailed)?;
            self.publish(OrchestrationEvent::workspace_state_changed(workspace_id, WorkspaceStatus::DegradedMode.as_str()));
        } else if workspace.should_recover_to_active() {
            workspace.transition_to(WorkspaceStatus::Active).map_err(DomainError::ValidationFailed)?;
            self.publish(OrchestrationEvent::workspace_state_changed(workspace_id, WorkspaceStatus::Active.as_str()));
        }
        self.workspaces.update(&workspace).await?;

        if self.due(tick_number, self.config.goal_validation_interval) {
            self.validate_goals(&workspace).await?;
        }

        Ok(report)
    }

    fn due(&self, tick_number: u64, interval: StdDuration) -> bool {
        let ticks_per_interval = (interval.as_secs_f64() / self.config.queue_poll_interval.as_secs_f64()).max(1.0) as u64;
        tick_number % ticks_per_interval == 0
    }

    async fn dispatch_batch(&self, workspace: &Workspace, ready: Vec<Task>) -> DomainResult<Vec<DispatchOutcome>> {
        let mut handles = Vec::with_capacity(ready.len());

        for task in ready {
            let goal = match self.goals.get(task.goal_id).await? {
                Some(g) => g,
                None => continue,
            };

            match self.agent_pool.match_agent(&task).await? {
                MatchOutcome::Starved { cooldown_seconds, insight_summary, insight_detail } => {
                    self.task_queue.requeue(task.id, Duration::seconds(cooldown_seconds)).await?;
                    let insight = Insight::new(workspace.id, InsightCategory::AgentStarvation, insight_summary, insight_detail, 0.8, 0.4);
                    self.memory.record(insight).await?;
                    handles.push(tokio::spawn(async move { DispatchOutcome::Starved }));
                }
                MatchOutcome::Matched(agent) => {
                    self.agent_pool.mark_executing(agent.id, task.id).await?;
                    let task = self.task_queue.mark_in_progress(task.id, agent.id).await?;
                    let insights = self.memory.query(workspace.id, None, Some(0.5)).await.unwrap_or_default();
                    let execution = self.run_one(task, goal, agent, insights);
                    handles.push(tokio::spawn(execution));
                }
            }
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            outcomes.push(handle.await.unwrap_or(DispatchOutcome::Failed));
        }
        Ok(outcomes)
    }

    /// Executes one task end to end: run, then fold the result into the
    /// goal/agent/deliverable/recovery subsystems. Bound to `'static` so it
    /// can be `tokio::spawn`ed — each invocation clones the `Arc`-backed
    /// services it needs.
    fn run_one(&self, task: Task, goal: Goal, agent: Agent, insights: Vec<Insight>) -> impl std::future::Future<Output = DispatchOutcome> + 'static {
        let executor = self.executor.clone();
        let task_queue = self.task_queue.clone();
        let agent_pool = self.agent_pool.clone();
        let aggregator = self.aggregator.clone();
        let recovery_engine = self.recovery_engine.clone();
        let goals = self.goals.clone();
        let memory = self.memory.clone();
        let events = self.events.clone();

        async move {
            let result =
                executor.execute(task.workspace_id, &task.name, &task.description, &goal.description, &agent, &insights).await;

            match result {
                Ok(task_result) => {
                    let contribution = task_result.goal_contribution;
                    let completed = match task_queue.mark_complete(task.id, task_result).await {
                        Ok(t) => t,
                        Err(_) => return DispatchOutcome::Failed,
                    };
                    let _ = agent_pool.mark_idle(agent.id).await;

                    let mut goal = goal;
                    if goal.advance(contribution.max(0.0)).is_ok() {
                        // Recomputed independently of `progress_percentage` so
                        // `check_transparency_gap` is a real structural check
                        // rather than comparing a value against itself.
                        let reported_percentage = if goal.target_value > 0.0 {
                            (100.0 * goal.current_value / goal.target_value).min(100.0)
                        } else {
                            0.0
                        };
                        if let Some(gap) = goal.check_transparency_gap(reported_percentage) {
                            if let Some(bus) = &events {
                                bus.publish(OrchestrationEvent::transparency_gap(goal.id, goal.progress_percentage(), reported_percentage, gap));
                            }
                        }

                        if goal.progress_percentage() >= 100.0 && goal.status == GoalStatus::Active {
                            let _ = goal.transition_to(GoalStatus::Completed);
                        }
                        let _ = goals.update(&goal).await;
                    }

                    let _ = aggregator.ingest(&completed, &goal).await;
                    DispatchOutcome::Completed
                }
                Err(error) => {
                    let _ = task_queue.mark_failed(task.id, error.kind).await;
                    let Ok(decision) = recovery_engine.handle_failure(&task, &error).await else {
                        let _ = agent_pool.mark_idle(agent.id).await;
                        return DispatchOutcome::Failed;
                    };

                    match decision.attempt.strategy {
                        RecoveryStrategy::RetryWithDelay | RecoveryStrategy::ContextReconstruction | RecoveryStrategy::AlternativeApproach => {
                            let delay = decision.retry_delay.unwrap_or_else(|| Duration::seconds(0));
                            let _ = task_queue.requeue(task.id, delay).await;
                            let _ = agent_pool.mark_idle(agent.id).await;
                        }
                        RecoveryStrategy::RetryWithDifferentAgent => {
                            let _ = agent_pool.cooldown(agent.id, Duration::seconds(30)).await;
                            let _ = task_queue.requeue(task.id, Duration::seconds(0)).await;
                        }
                        RecoveryStrategy::Decompose => {
                            let insight = Insight::new(
                                task.workspace_id,
                                InsightCategory::FailurePattern,
                                format!("task '{}' recurred enough to warrant decomposition", task.name),
                                serde_json::json!({ "task_id": task.id, "failure_signature": decision.attempt.failure_signature }),
                                decision.attempt.confidence,
                                0.5,
                            );
                            let _ = memory.record(insight).await;

                            for (name, description) in split_into_subtasks(&task) {
                                if let Ok(sub) = task_queue.enqueue(task.workspace_id, task.goal_id, &name, &description).await {
                                    let _ = task_queue.mark_ready(sub.id).await;
                                }
                            }
                            let _ = task_queue.cancel(task.id).await;
                            let _ = agent_pool.mark_idle(agent.id).await;
                        }
                        RecoveryStrategy::SkipWithFallback => {
                            let fallback = crate::domain::models::TaskResult {
                                summary: format!("skipped after exhausting automatic recovery: {}", error.message),
                                output: crate::domain::models::TaskOutput::Document {
                                    markdown: "_This task could not be completed automatically and was skipped._".to_string(),
                                },
                                tool_trace: Vec::new(),
                                execution_time_ms: 0,
                                agent_metadata: serde_json::json!({ "skipped": true }),
                                goal_contribution: 0.0,
                            };
                            if let Ok(skipped) = task_queue.mark_skipped_with_fallback(task.id, fallback).await {
                                let _ = aggregator.ingest(&skipped, &goal).await;
                            }
                            let _ = agent_pool.mark_idle(agent.id).await;
                        }
                    }
                    DispatchOutcome::Failed
                }
            }
        }
    }

    /// Periodic goal-validation sweep: promotes any goal that has silently
    /// crossed 100% without a task completion driving the transition (e.g.
    /// manual `current_value` adjustment via the API).
    async fn validate_goals(&self, workspace: &Workspace) -> DomainResult<()> {
        let goals = self.goals.list_by_status(workspace.id, GoalStatus::Active).await?;
        for mut goal in goals {
            if goal.progress_percentage() >= 100.0 {
                if goal.transition_to(GoalStatus::Completed).is_ok() {
                    self.goals.update(&goal).await?;
                    self.publish(OrchestrationEvent::goal_progress_updated(goal.id, goal.progress_percentage()));
                }
            }
        }
        Ok(())
    }
}

enum DispatchOutcome {
    Completed,
    Failed,
    Starved,
}

/// Rule-based decomposition fallback (no AI decomposer wired in): splits a
/// task that has failed enough to warrant decomposition into narrower-scope
/// duplicates of itself, matching the priority/affinity services' pattern of
/// a deterministic rule standing in for an AI-assisted step.
fn split_into_subtasks(task: &Task) -> Vec<(String, String)> {
    const SUBTASK_COUNT: usize = 2;
    (1..=SUBTASK_COUNT)
        .map(|part| {
            (
                format!("{} (part {} of {})", task.name, part, SUBTASK_COUNT),
                format!("{} — narrower scope, split {} of {} after repeated failure", task.description, part, SUBTASK_COUNT),
            )
        })
        .collect()
}
