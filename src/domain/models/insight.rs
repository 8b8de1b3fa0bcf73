//! Insight domain model.
//!
//! Insights are durable learnings the orchestrator accumulates in workspace
//! memory: things worth remembering across ticks (agent starvation signals,
//! recurring failure patterns, content-transformation heuristics). Bounded to
//! 100 per workspace; eviction never removes an insight an active deliverable
//! still cites.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightCategory {
    AgentStarvation,
    FailurePattern,
    ContentHeuristic,
    GoalDrift,
    General,
}

impl InsightCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AgentStarvation => "agent_starvation",
            Self::FailurePattern => "failure_pattern",
            Self::ContentHeuristic => "content_heuristic",
            Self::GoalDrift => "goal_drift",
            Self::General => "general",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "agent_starvation" => Some(Self::AgentStarvation),
            "failure_pattern" => Some(Self::FailurePattern),
            "content_heuristic" => Some(Self::ContentHeuristic),
            "goal_drift" => Some(Self::GoalDrift),
            "general" => Some(Self::General),
            _ => None,
        }
    }
}

/// A durable learning recorded in workspace memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insight {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub category: InsightCategory,
    pub summary: String,
    pub detail: serde_json::Value,
    /// Confidence in [0,1] that this insight reflects reality.
    pub confidence: f64,
    /// Estimated business value in [0,1], used jointly with `confidence` as
    /// the eviction score (`confidence * business_value`, ascending evicted first).
    pub business_value: f64,
    /// Deliverable ids that currently cite this insight; non-empty pins it
    /// against eviction regardless of score.
    pub referenced_by: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub last_reinforced_at: DateTime<Utc>,
    pub reinforcement_count: u32,
}

impl Insight {
    pub fn new(
        workspace_id: Uuid,
        category: InsightCategory,
        summary: impl Into<String>,
        detail: serde_json::Value,
        confidence: f64,
        business_value: f64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            workspace_id,
            category,
            summary: summary.into(),
            detail,
            confidence: confidence.clamp(0.0, 1.0),
            business_value: business_value.clamp(0.0, 1.0),
            referenced_by: Vec::new(),
            created_at: now,
            last_reinforced_at: now,
            reinforcement_count: 0,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.summary.trim().is_empty() {
            return Err("insight summary cannot be empty".to_string());
        }
        Ok(())
    }

    /// Combined eviction priority score: lower evicts first.
    pub fn eviction_score(&self) -> f64 {
        self.confidence * self.business_value
    }

    pub fn is_pinned(&self) -> bool {
        !self.referenced_by.is_empty()
    }

    pub fn reinforce(&mut self, confidence_delta: f64) {
        self.confidence = (self.confidence + confidence_delta).clamp(0.0, 1.0);
        self.reinforcement_count += 1;
        self.last_reinforced_at = Utc::now();
    }

    pub fn link_deliverable(&mut self, deliverable_id: Uuid) {
        if !self.referenced_by.contains(&deliverable_id) {
            self.referenced_by.push(deliverable_id);
        }
    }

    pub fn unlink_deliverable(&mut self, deliverable_id: Uuid) {
        self.referenced_by.retain(|id| *id != deliverable_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Insight {
        Insight::new(
            Uuid::new_v4(),
            InsightCategory::AgentStarvation,
            "writer role has no idle agents for 3 ticks",
            serde_json::json!({ "role": "writer" }),
            0.8,
            0.5,
        )
    }

    #[test]
    fn eviction_score_is_product_of_confidence_and_value() {
        let i = sample();
        assert!((i.eviction_score() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn pinned_when_referenced() {
        let mut i = sample();
        assert!(!i.is_pinned());
        i.link_deliverable(Uuid::new_v4());
        assert!(i.is_pinned());
    }

    #[test]
    fn reinforce_clamps_to_one() {
        let mut i = sample();
        i.reinforce(0.5);
        assert!(i.confidence <= 1.0);
        assert_eq!(i.reinforcement_count, 1);
    }

    #[test]
    fn unlink_removes_pin() {
        let mut i = sample();
        let d = Uuid::new_v4();
        i.link_deliverable(d);
        i.unlink_deliverable(d);
        assert!(!i.is_pinned());
    }
}
