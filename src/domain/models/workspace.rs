//! Workspace domain model.
//!
//! A workspace is the top-level, tenant-scoped unit of work: one free-text goal,
//! a team of agents, tasks, and deliverables. Recovery is always autonomous —
//! the deprecated `needs_intervention` status is not representable here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceStatus {
    Created,
    Active,
    AutoRecovering,
    DegradedMode,
    Completed,
    Archived,
}

impl WorkspaceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Active => "active",
            Self::AutoRecovering => "auto_recovering",
            Self::DegradedMode => "degraded_mode",
            Self::Completed => "completed",
            Self::Archived => "archived",
        }
    }

    /// Parse a persisted status string. Any legacy `needs_intervention` row is
    /// normalized to `auto_recovering` at this boundary — that status is
    /// deprecated and forbidden going forward, but old rows may still carry it.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "created" => Some(Self::Created),
            "active" => Some(Self::Active),
            "auto_recovering" => Some(Self::AutoRecovering),
            "needs_intervention" => Some(Self::AutoRecovering),
            "degraded_mode" => Some(Self::DegradedMode),
            "completed" => Some(Self::Completed),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }

    /// Only active workspaces dispatch tasks at full parallelism; degraded
    /// workspaces still dispatch, just at reduced capacity (see `Workspace::dispatch_cap`).
    pub fn can_dispatch(&self) -> bool {
        matches!(self, Self::Active | Self::DegradedMode)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Archived)
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        use WorkspaceStatus::*;
        matches!(
            (self, new_status),
            (Created, Active)
                | (Active, AutoRecovering)
                | (AutoRecovering, Active)
                | (Active, DegradedMode)
                | (DegradedMode, Active)
                | (Active, Completed)
                | (DegradedMode, Completed)
                | (Completed, Archived)
                | (Active, Archived)
                | (DegradedMode, Archived)
        )
    }
}

/// A tenant-scoped unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: Uuid,
    pub name: String,
    pub goal_text: String,
    pub status: WorkspaceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// 0-100, reflects quality/compliance signals accumulated from recovery and
    /// transparency-gap events; not a separate source of truth for progress.
    pub compliance_score: u8,
    pub recovery_count: u32,
    pub last_recovery_at: Option<DateTime<Utc>>,
    pub total_recovery_attempts: u64,
    pub successful_recoveries: u64,
    /// Consecutive ticks with zero completions, used by the degraded-mode
    /// escalation rule (three such ticks with >=1 recovery attempt trips it).
    pub consecutive_empty_ticks: u32,
    /// Consecutive successful completions while in degraded mode; two flips
    /// the workspace back to `active`.
    pub consecutive_successes_in_degraded: u32,
    pub version: u64,
}

impl Workspace {
    pub fn new(name: impl Into<String>, goal_text: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            goal_text: goal_text.into(),
            status: WorkspaceStatus::Created,
            created_at: now,
            updated_at: now,
            compliance_score: 100,
            recovery_count: 0,
            last_recovery_at: None,
            total_recovery_attempts: 0,
            successful_recoveries: 0,
            consecutive_empty_ticks: 0,
            consecutive_successes_in_degraded: 0,
            version: 1,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("workspace name cannot be empty".to_string());
        }
        if self.goal_text.trim().is_empty() {
            return Err("workspace goal_text cannot be empty".to_string());
        }
        if self.compliance_score > 100 {
            return Err("compliance_score must be in [0,100]".to_string());
        }
        Ok(())
    }

    pub fn can_transition_to(&self, new_status: WorkspaceStatus) -> bool {
        self.status.can_transition_to(new_status)
    }

    pub fn transition_to(&mut self, new_status: WorkspaceStatus) -> Result<(), String> {
        if !self.can_transition_to(new_status) {
            return Err(format!(
                "cannot transition workspace from {} to {}",
                self.status.as_str(),
                new_status.as_str()
            ));
        }
        self.status = new_status;
        self.updated_at = Utc::now();
        self.version += 1;
        Ok(())
    }

    /// Dispatch parallelism cap for the workspace's current status.
    pub fn dispatch_cap(&self, active_cap: usize, degraded_cap: usize) -> usize {
        match self.status {
            WorkspaceStatus::DegradedMode => degraded_cap,
            _ => active_cap,
        }
    }

    /// Record a tick's outcome for the degraded-mode escalation rule.
    /// Returns `true` if this record should trigger a transition check.
    pub fn record_tick_outcome(&mut self, completions: u32, recovery_attempts: u32) {
        if completions == 0 && recovery_attempts > 0 {
            self.consecutive_empty_ticks += 1;
        } else {
            self.consecutive_empty_ticks = 0;
        }

        if self.status == WorkspaceStatus::DegradedMode {
            if completions > 0 {
                self.consecutive_successes_in_degraded += 1;
            } else {
                self.consecutive_successes_in_degraded = 0;
            }
        }
        self.updated_at = Utc::now();
    }

    /// Whether the escalation rule (three empty ticks with recovery attempts)
    /// has fired.
    pub fn should_degrade(&self) -> bool {
        self.status == WorkspaceStatus::Active && self.consecutive_empty_ticks >= 3
    }

    /// Whether the recovery rule (two successful completions while degraded)
    /// has fired.
    pub fn should_recover_to_active(&self) -> bool {
        self.status == WorkspaceStatus::DegradedMode && self.consecutive_successes_in_degraded >= 2
    }

    pub fn record_recovery_attempt(&mut self, succeeded: bool) {
        self.recovery_count += 1;
        self.total_recovery_attempts += 1;
        if succeeded {
            self.successful_recoveries += 1;
        }
        self.last_recovery_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }
}
