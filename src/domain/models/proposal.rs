//! Proposal domain model.
//!
//! A proposal is the staffing plan generated in response to a workspace's
//! free-text goal: a small team of agent slots and a cost estimate, surfaced
//! for approval before any task is enqueued. Approval is the one point in
//! the system where a human gate sits in front of otherwise-autonomous
//! execution (SPEC §1: "once approved").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::agent::Seniority;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        matches!((self, new_status), (Self::Pending, Self::Approved) | (Self::Pending, Self::Rejected))
    }
}

/// One staffing slot within a proposed team.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposedAgentSlot {
    pub role: String,
    pub seniority: Seniority,
    pub skills: Vec<String>,
}

/// Flat per-seniority hourly cost used to derive `estimated_cost`. Senior
/// staffing costs more per slot; this is a planning estimate, not billing.
const SENIORITY_COST_WEIGHT: f64 = 40.0;

impl ProposedAgentSlot {
    fn estimated_cost(&self) -> f64 {
        let multiplier = match self.seniority {
            Seniority::Junior => 1.0,
            Seniority::Senior => 2.0,
            Seniority::Expert => 3.5,
        };
        SENIORITY_COST_WEIGHT * multiplier
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub goal_text: String,
    pub feedback: Option<String>,
    pub team: Vec<ProposedAgentSlot>,
    pub estimated_cost: f64,
    pub status: ProposalStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Proposal {
    pub fn new(workspace_id: Uuid, goal_text: impl Into<String>, feedback: Option<String>, team: Vec<ProposedAgentSlot>) -> Self {
        let now = Utc::now();
        let estimated_cost = team.iter().map(ProposedAgentSlot::estimated_cost).sum();
        Self {
            id: Uuid::new_v4(),
            workspace_id,
            goal_text: goal_text.into(),
            feedback,
            team,
            estimated_cost,
            status: ProposalStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn transition_to(&mut self, new_status: ProposalStatus) -> Result<(), String> {
        if !self.status.can_transition_to(new_status) {
            return Err(format!("cannot transition proposal from {} to {}", self.status.as_str(), new_status.as_str()));
        }
        self.status = new_status;
        self.updated_at = Utc::now();
        Ok(())
    }
}
