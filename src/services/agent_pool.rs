//! Agent Pool.
//!
//! Matches ready tasks to idle agents by keyword affinity, with seniority and
//! least-recently-used as tie-breakers. Below the affinity threshold, the
//! task returns to the queue on cooldown and an `agent_starvation` insight is
//! recorded.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{keywordize, Agent, InsightCategory, Task};
use crate::domain::ports::AgentRepository;

/// Default minimum affinity for a match to be accepted (SPEC §4.3).
pub const DEFAULT_AFFINITY_THRESHOLD: f64 = 0.3;

/// Cooldown applied to a task returned to the queue for lack of a matching agent.
pub const STARVATION_COOLDOWN_SECONDS: i64 = 60;

pub struct AgentPool<A: AgentRepository> {
    agents: Arc<A>,
    affinity_threshold: f64,
}

/// Outcome of a match attempt: either a bound agent, or a signal that the
/// task should be requeued with a cooldown and an insight recorded.
pub enum MatchOutcome {
    Matched(Agent),
    Starved { cooldown_seconds: i64, insight_summary: String, insight_detail: serde_json::Value },
}

impl<A: AgentRepository> AgentPool<A> {
    pub fn new(agents: Arc<A>) -> Self {
        Self { agents, affinity_threshold: DEFAULT_AFFINITY_THRESHOLD }
    }

    pub fn with_affinity_threshold(mut self, threshold: f64) -> Self {
        self.affinity_threshold = threshold;
        self
    }

    pub async fn list_agents(&self, workspace_id: Uuid) -> DomainResult<Vec<Agent>> {
        self.agents.list_by_workspace(workspace_id).await
    }

    /// Find the best idle agent for `task`. Ties are broken by seniority
    /// (expert > senior > junior), then by least-recently-used.
    pub async fn match_agent(&self, task: &Task) -> DomainResult<MatchOutcome> {
        let now = Utc::now();
        let candidates = self.agents.list_available(task.workspace_id).await?;
        let keywords = keywordize(&format!("{} {}", task.name, task.description));

        let mut scored: Vec<(f64, &Agent)> = candidates
            .iter()
            .filter(|a| a.is_available(now))
            .map(|a| (a.keyword_affinity(&keywords), a))
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap()
                .then_with(|| b.1.seniority.cmp(&a.1.seniority))
                .then_with(|| a.1.last_used_at.unwrap_or(chrono::DateTime::<Utc>::MIN_UTC).cmp(
                    &b.1.last_used_at.unwrap_or(chrono::DateTime::<Utc>::MIN_UTC),
                ))
        });

        match scored.first() {
            Some((affinity, agent)) if *affinity >= self.affinity_threshold => Ok(MatchOutcome::Matched((*agent).clone())),
            _ => Ok(MatchOutcome::Starved {
                cooldown_seconds: STARVATION_COOLDOWN_SECONDS,
                insight_summary: format!("no agent met affinity threshold {:.2} for task '{}'", self.affinity_threshold, task.name),
                insight_detail: serde_json::json!({
                    "task_id": task.id,
                    "keywords": keywords,
                    "category": InsightCategory::AgentStarvation.as_str(),
                }),
            }),
        }
    }

    pub async fn mark_executing(&self, agent_id: Uuid, task_id: Uuid) -> DomainResult<()> {
        let mut agent = self.agents.get(agent_id).await?.ok_or(DomainError::AgentNotFound(agent_id))?;
        agent.mark_executing(task_id);
        self.agents.update(&agent).await
    }

    pub async fn mark_idle(&self, agent_id: Uuid) -> DomainResult<()> {
        let mut agent = self.agents.get(agent_id).await?.ok_or(DomainError::AgentNotFound(agent_id))?;
        agent.mark_idle();
        self.agents.update(&agent).await
    }

    pub async fn cooldown(&self, agent_id: Uuid, duration: chrono::Duration) -> DomainResult<()> {
        let mut agent = self.agents.get(agent_id).await?.ok_or(DomainError::AgentNotFound(agent_id))?;
        agent.cooldown(duration);
        self.agents.update(&agent).await
    }
}
