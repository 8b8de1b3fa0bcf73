//! Agent domain model.
//!
//! Agents are workspace-owned specialist descriptors matched to tasks by the
//! Agent Pool. Unlike the teacher's global `AgentTemplate`/`AgentInstance`
//! split, one `Agent` here is both the descriptor and the live status —
//! workspaces are small enough that a pool of a few agents each keeps its own
//! idle/executing/cooling_down lifecycle directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Seniority {
    Junior,
    Senior,
    Expert,
}

impl Seniority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Junior => "junior",
            Self::Senior => "senior",
            Self::Expert => "expert",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "junior" => Some(Self::Junior),
            "senior" => Some(Self::Senior),
            "expert" => Some(Self::Expert),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Executing,
    CoolingDown,
    Disabled,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Executing => "executing",
            Self::CoolingDown => "cooling_down",
            Self::Disabled => "disabled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "idle" => Some(Self::Idle),
            "executing" => Some(Self::Executing),
            "cooling_down" => Some(Self::CoolingDown),
            "disabled" => Some(Self::Disabled),
            _ => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// A specialist descriptor owned by a workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub name: String,
    pub role: String,
    pub seniority: Seniority,
    pub skills: BTreeSet<String>,
    pub status: AgentStatus,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub current_task_id: Option<Uuid>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    pub fn new(workspace_id: Uuid, name: impl Into<String>, role: impl Into<String>, seniority: Seniority) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            workspace_id,
            name: name.into(),
            role: role.into(),
            seniority,
            skills: BTreeSet::new(),
            status: AgentStatus::Idle,
            cooldown_until: None,
            current_task_id: None,
            last_used_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_skill(mut self, skill: impl Into<String>) -> Self {
        self.skills.insert(skill.into());
        self
    }

    pub fn with_skills<I: IntoIterator<Item = S>, S: Into<String>>(mut self, skills: I) -> Self {
        for s in skills {
            self.skills.insert(s.into());
        }
        self
    }

    /// Whether the agent may be matched right now: idle, not disabled, and
    /// any cooldown has elapsed.
    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        self.status.is_available() && self.cooldown_until.map(|until| until <= now).unwrap_or(true)
    }

    pub fn mark_executing(&mut self, task_id: Uuid) {
        self.status = AgentStatus::Executing;
        self.current_task_id = Some(task_id);
        self.last_used_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    pub fn mark_idle(&mut self) {
        self.status = AgentStatus::Idle;
        self.current_task_id = None;
        self.cooldown_until = None;
        self.updated_at = Utc::now();
    }

    pub fn cooldown(&mut self, duration: chrono::Duration) {
        self.status = AgentStatus::CoolingDown;
        self.current_task_id = None;
        self.cooldown_until = Some(Utc::now() + duration);
        self.updated_at = Utc::now();
    }

    pub fn disable(&mut self) {
        self.status = AgentStatus::Disabled;
        self.updated_at = Utc::now();
    }

    /// Jaccard overlap between the task's keyword set and this agent's
    /// `{role} ∪ skills`. Deterministic fallback affinity score used when no
    /// AI-driven role classifier is configured.
    pub fn keyword_affinity(&self, task_keywords: &BTreeSet<String>) -> f64 {
        let mut agent_terms: BTreeSet<String> = self.skills.iter().map(|s| s.to_lowercase()).collect();
        agent_terms.insert(self.role.to_lowercase());

        if agent_terms.is_empty() || task_keywords.is_empty() {
            return 0.0;
        }

        let intersection = agent_terms.intersection(task_keywords).count();
        let union = agent_terms.union(task_keywords).count();
        if union == 0 {
            0.0
        } else {
            intersection as f64 / union as f64
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("agent name cannot be empty".to_string());
        }
        if self.role.trim().is_empty() {
            return Err("agent role cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Tokenizes free text into a lowercase keyword set for affinity scoring.
pub fn keywordize(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
        .map(|w| w.to_lowercase())
        .collect()
}
