//! Orchestrator facade.
//!
//! The transport-neutral surface named in SPEC §6: one call per API table
//! row. Wraps the lower-level services (`TaskQueue`, `AgentPool`,
//! `RecoveryEngine`, `DeliverableAggregator`, `MemoryStore`) that the
//! `WorkspaceSupervisor` drives in its own tick loop — this facade answers
//! requests, it does not run them.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Agent, Deliverable, ExecutionError, FailureKind, Goal, GoalPriority, Insight, InsightCategory, MetricType,
    Proposal, ProposalStatus, ProposedAgentSlot, RecoveryAttempt, Seniority, Task, Workspace, WorkspaceStatus,
    keywordize,
};
use crate::domain::ports::{
    AgentRepository, DeliverableRepository, EventPublisher, GoalRepository, InsightRepository, ProposalRepository,
    RecoveryRepository, TaskFilter, TaskRepository, WorkspaceRepository,
};
use crate::services::goal_decomposer::decompose;
use crate::services::memory_store::MemoryStore;
use crate::services::recovery_engine::RecoveryEngine;
use crate::telemetry::OrchestrationEvent;

/// Heuristic minutes-per-team-member used to estimate completion time on
/// proposal approval. A planning estimate, not a scheduling guarantee.
const ESTIMATED_MINUTES_PER_TEAM_MEMBER: i64 = 30;

#[derive(Debug, Clone)]
pub struct ApprovalOutcome {
    pub status: String,
    pub estimated_completion_seconds: i64,
    /// Every goal decomposed from the proposal's goal text (spec.md §1's
    /// "goal decomposition" — a free-text goal can carry more than one
    /// measurable sub-target, e.g. a lead count and a separate email count).
    pub goals: Vec<Goal>,
}

#[derive(Debug, Clone, Default)]
pub struct RecoverySummary {
    pub attempts: Vec<RecoveryAttempt>,
}

pub struct Orchestrator<W, G, T, A, D, I, R, P>
where
    W: WorkspaceRepository,
    G: GoalRepository,
    T: TaskRepository,
    A: AgentRepository,
    D: DeliverableRepository,
    I: InsightRepository,
    R: RecoveryRepository,
    P: ProposalRepository,
{
    workspaces: Arc<W>,
    goals: Arc<G>,
    tasks: Arc<T>,
    agents: Arc<A>,
    deliverables: Arc<D>,
    memory: MemoryStore<I>,
    recovery_engine: Arc<RecoveryEngine<R>>,
    proposals: Arc<P>,
    events: Option<Arc<dyn EventPublisher>>,
}

impl<W, G, T, A, D, I, R, P> Orchestrator<W, G, T, A, D, I, R, P>
where
    W: WorkspaceRepository,
    G: GoalRepository,
    T: TaskRepository,
    A: AgentRepository,
    D: DeliverableRepository,
    I: InsightRepository,
    R: RecoveryRepository,
    P: ProposalRepository,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        workspaces: Arc<W>,
        goals: Arc<G>,
        tasks: Arc<T>,
        agents: Arc<A>,
        deliverables: Arc<D>,
        memory: MemoryStore<I>,
        recovery_engine: Arc<RecoveryEngine<R>>,
        proposals: Arc<P>,
    ) -> Self {
        Self { workspaces, goals, tasks, agents, deliverables, memory, recovery_engine, proposals, events: None }
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

    /// `POST /workspaces`.
    pub async fn create_workspace(&self, name: &str, goal_text: &str) -> DomainResult<Workspace> {
        let workspace = Workspace::new(name, goal_text);
        workspace.validate().map_err(DomainError::ValidationFailed)?;
        self.workspaces.create(&workspace).await?;
        Ok(workspace)
    }

    /// `GET /workspaces/{id}`.
    pub async fn get_workspace(&self, workspace_id: Uuid) -> DomainResult<Workspace> {
        self.workspaces.get(workspace_id).await?.ok_or(DomainError::WorkspaceNotFound(workspace_id))
    }

    /// `POST /workspaces/{id}/proposal`. Builds a default staffing plan from
    /// the goal's vocabulary: one role per distinct keyword family, capped at
    /// three slots so a proposal never requires an unreviewable team.
    pub async fn submit_proposal(&self, workspace_id: Uuid, goal_text: &str, feedback: Option<String>) -> DomainResult<Proposal> {
        let workspace = self.get_workspace(workspace_id).await?;
        if workspace.status.is_terminal() {
            return Err(DomainError::WorkspaceInactive(workspace_id));
        }

        let team = propose_team(goal_text);
        let proposal = Proposal::new(workspace_id, goal_text, feedback, team);
        self.proposals.create(&proposal).await?;
        Ok(proposal)
    }

    /// `POST /workspaces/{id}/approve`. Materializes the proposal into a
    /// goal and its staffed agents, and activates the workspace if this is
    /// its first approval.
    pub async fn approve_proposal(&self, workspace_id: Uuid, proposal_id: Uuid, _feedback: Option<String>) -> DomainResult<ApprovalOutcome> {
        let mut proposal = self.proposals.get(proposal_id).await?.ok_or(DomainError::ProposalNotFound(proposal_id))?;
        if proposal.workspace_id != workspace_id {
            return Err(DomainError::ProposalNotFound(proposal_id));
        }

        proposal.transition_to(ProposalStatus::Approved).map_err(DomainError::ValidationFailed)?;
        self.proposals.update(&proposal).await?;

        let mut goals = Vec::new();
        for decomposed in decompose(&proposal.goal_text) {
            let goal = Goal::new(workspace_id, decomposed.description, decomposed.metric_type, decomposed.target_value)
                .with_priority(GoalPriority::High);
            goal.validate().map_err(DomainError::ValidationFailed)?;
            self.goals.create(&goal).await?;
            goals.push(goal);
        }

        for slot in &proposal.team {
            let mut agent = Agent::new(workspace_id, format!("{} agent", slot.role), &slot.role, slot.seniority);
            agent = agent.with_skills(slot.skills.clone());
            self.agents.create(&agent).await?;
        }

        let mut workspace = self.get_workspace(workspace_id).await?;
        if workspace.status == WorkspaceStatus::Created {
            workspace.transition_to(WorkspaceStatus::Active).map_err(DomainError::ValidationFailed)?;
            self.workspaces.update(&workspace).await?;
            self.publish(OrchestrationEvent::workspace_state_changed(workspace_id, WorkspaceStatus::Active.as_str()));
        }

        let estimated_completion_seconds = (proposal.team.len().max(1) as i64) * ESTIMATED_MINUTES_PER_TEAM_MEMBER * 60;

        Ok(ApprovalOutcome { status: "accepted".to_string(), estimated_completion_seconds, goals })
    }

    /// `GET /workspaces/{id}/goals`.
    pub async fn list_goals(&self, workspace_id: Uuid) -> DomainResult<Vec<Goal>> {
        self.goals.list_by_workspace(workspace_id).await
    }

    /// `GET /workspaces/{id}/tasks`.
    pub async fn list_tasks(&self, workspace_id: Uuid, filter: TaskFilter) -> DomainResult<Vec<Task>> {
        self.tasks.list(workspace_id, filter).await
    }

    /// `GET /workspaces/{id}/deliverables`.
    pub async fn list_deliverables(&self, workspace_id: Uuid) -> DomainResult<Vec<Deliverable>> {
        self.deliverables.list_by_workspace(workspace_id).await
    }

    /// `GET /workspaces/{id}/insights`.
    pub async fn list_insights(&self, workspace_id: Uuid, category: Option<InsightCategory>, min_confidence: Option<f64>) -> DomainResult<Vec<Insight>> {
        self.memory.query(workspace_id, category, min_confidence).await
    }

    /// `POST /workspaces/{id}/recovery`. Forces an out-of-band recovery pass
    /// over every currently-failed task — distinct from the Supervisor's own
    /// inline handling of a failure the instant it occurs.
    pub async fn trigger_recovery(&self, workspace_id: Uuid) -> DomainResult<RecoverySummary> {
        self.get_workspace(workspace_id).await?;

        let failed = self.tasks.list(workspace_id, TaskFilter { status: Some(crate::domain::models::TaskStatus::Failed), ..Default::default() }).await?;
        let mut attempts = Vec::with_capacity(failed.len());

        for task in failed {
            let kind = task.last_failure_type.unwrap_or(FailureKind::Unknown);
            let error = ExecutionError::new(kind, "recovery sweep triggered via API");
            let decision = self.recovery_engine.handle_failure(&task, &error).await?;
            self.publish(OrchestrationEvent::recovery_attempted(task.id, decision.attempt.strategy.as_str(), decision.attempt.confidence));
            attempts.push(decision.attempt);
        }

        Ok(RecoverySummary { attempts })
    }
}

/// Derives a small default team from a goal's keyword vocabulary. Every
/// workspace gets at least one generalist; additional slots are staffed at
/// `Senior` for the two most goal-specific keyword families, capped at three
/// total so an auto-generated proposal stays reviewable.
fn propose_team(goal_text: &str) -> Vec<ProposedAgentSlot> {
    let keywords = keywordize(goal_text);
    let mut team = vec![ProposedAgentSlot { role: "generalist".to_string(), seniority: Seniority::Senior, skills: keywords.iter().cloned().collect() }];

    for keyword in keywords.iter().take(2) {
        team.push(ProposedAgentSlot { role: keyword.clone(), seniority: Seniority::Senior, skills: vec![keyword.clone()] });
    }

    team
}
