//! Goal domain model.
//!
//! A goal is a measurable sub-target decomposed from a workspace's free-text
//! business goal. Unlike the teacher's convergent, never-completed goals,
//! these goals carry a `current_value`/`target_value` pair and do reach a
//! terminal `completed` status once satisfied.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a goal's progress is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Count,
    Ratio,
    TextQuality,
    Timeline,
    Custom,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Ratio => "ratio",
            Self::TextQuality => "text_quality",
            Self::Timeline => "timeline",
            Self::Custom => "custom",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "count" => Some(Self::Count),
            "ratio" => Some(Self::Ratio),
            "text_quality" => Some(Self::TextQuality),
            "timeline" => Some(Self::Timeline),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Pending,
    Active,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl GoalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "active" => Some(Self::Active),
            "paused" => Some(Self::Paused),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether tasks may be dispatched against this goal's queue.
    pub fn accepts_dispatch(&self) -> bool {
        matches!(self, Self::Pending | Self::Active)
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        use GoalStatus::*;
        matches!(
            (self, new_status),
            (Pending, Active)
                | (Pending, Cancelled)
                | (Active, Paused)
                | (Active, Completed)
                | (Active, Failed)
                | (Active, Cancelled)
                | (Paused, Active)
                | (Paused, Cancelled)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalPriority {
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
}

impl GoalPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }

    /// Additive weight contributed to task priority scoring (see services::priority_calculator).
    pub fn priority_weight(&self) -> f64 {
        match self {
            Self::Low => 0.0,
            Self::Medium => 1.0,
            Self::High => 2.5,
            Self::Critical => 5.0,
        }
    }
}

impl Default for GoalPriority {
    fn default() -> Self {
        Self::Medium
    }
}

/// A measurable sub-target of a workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub description: String,
    pub metric_type: MetricType,
    pub target_value: f64,
    pub current_value: f64,
    pub status: GoalStatus,
    pub priority: GoalPriority,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl Goal {
    pub fn new(
        workspace_id: Uuid,
        description: impl Into<String>,
        metric_type: MetricType,
        target_value: f64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            workspace_id,
            description: description.into(),
            metric_type,
            target_value,
            current_value: 0.0,
            status: GoalStatus::Pending,
            priority: GoalPriority::default(),
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    pub fn with_priority(mut self, priority: GoalPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.description.trim().is_empty() {
            return Err("goal description cannot be empty".to_string());
        }
        if self.target_value < 0.0 {
            return Err("goal target_value cannot be negative".to_string());
        }
        Ok(())
    }

    /// Derived progress percentage: `min(100, 100 * current / target)` when
    /// `target > 0`, else 0. This is the single source of truth — the
    /// "reported" progress a caller displays must always equal this value;
    /// any divergence is a bug in the caller; see `check_transparency_gap`.
    pub fn progress_percentage(&self) -> f64 {
        if self.target_value > 0.0 {
            (100.0 * self.current_value / self.target_value).min(100.0)
        } else {
            0.0
        }
    }

    /// Compares a separately-reported progress value (e.g. one cached on a
    /// DTO) against the derived value. Returns `Some(gap)` when they diverge
    /// beyond floating-point tolerance, signalling a `transparency_gap` event
    /// should be emitted.
    pub fn check_transparency_gap(&self, reported_percentage: f64) -> Option<f64> {
        let derived = self.progress_percentage();
        let gap = (derived - reported_percentage).abs();
        if gap > 1e-6 {
            Some(gap)
        } else {
            None
        }
    }

    pub fn can_transition_to(&self, new_status: GoalStatus) -> bool {
        self.status.can_transition_to(new_status)
    }

    pub fn transition_to(&mut self, new_status: GoalStatus) -> Result<(), String> {
        if new_status == GoalStatus::Completed && self.current_value < self.target_value {
            return Err("cannot complete goal: current_value has not reached target_value".to_string());
        }
        if !self.can_transition_to(new_status) {
            return Err(format!(
                "cannot transition goal from {} to {}",
                self.status.as_str(),
                new_status.as_str()
            ));
        }
        self.status = new_status;
        self.updated_at = Utc::now();
        self.version += 1;
        Ok(())
    }

    /// Monotonically advance `current_value`. Negative deltas are rejected —
    /// rollback must go through `rollback_to` so it is auditable.
    pub fn advance(&mut self, delta: f64) -> Result<(), String> {
        if delta < 0.0 {
            return Err("advance() cannot decrease current_value; use rollback_to".to_string());
        }
        self.current_value += delta;
        self.updated_at = Utc::now();
        self.version += 1;
        Ok(())
    }

    /// Explicit rollback, the only sanctioned way to decrease `current_value`.
    pub fn rollback_to(&mut self, value: f64) -> Result<(), String> {
        if value > self.current_value {
            return Err("rollback_to cannot increase current_value".to_string());
        }
        self.current_value = value;
        self.updated_at = Utc::now();
        self.version += 1;
        Ok(())
    }

    pub fn is_satisfied(&self) -> bool {
        self.current_value >= self.target_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Goal {
        Goal::new(Uuid::new_v4(), "100 B2B leads", MetricType::Count, 100.0)
    }

    #[test]
    fn progress_percentage_derivation() {
        let mut g = sample();
        g.advance(25.0).unwrap();
        assert_eq!(g.progress_percentage(), 25.0);
    }

    #[test]
    fn progress_percentage_caps_at_100() {
        let mut g = sample();
        g.advance(250.0).unwrap();
        assert_eq!(g.progress_percentage(), 100.0);
    }

    #[test]
    fn zero_target_is_zero_progress() {
        let g = Goal::new(Uuid::new_v4(), "qualitative", MetricType::TextQuality, 0.0);
        assert_eq!(g.progress_percentage(), 0.0);
    }

    #[test]
    fn transparency_gap_detected_on_divergence() {
        let mut g = sample();
        g.advance(50.0).unwrap();
        assert!(g.check_transparency_gap(50.0).is_none());
        assert!(g.check_transparency_gap(67.0).is_some());
    }

    #[test]
    fn cannot_complete_below_target() {
        let mut g = sample();
        g.transition_to(GoalStatus::Active).unwrap();
        g.advance(50.0).unwrap();
        assert!(g.transition_to(GoalStatus::Completed).is_err());
        g.advance(50.0).unwrap();
        assert!(g.transition_to(GoalStatus::Completed).is_ok());
    }

    #[test]
    fn advance_rejects_negative_delta() {
        let mut g = sample();
        assert!(g.advance(-1.0).is_err());
    }

    #[test]
    fn rollback_is_the_only_way_to_decrease() {
        let mut g = sample();
        g.advance(40.0).unwrap();
        g.rollback_to(10.0).unwrap();
        assert_eq!(g.current_value, 10.0);
        assert!(g.rollback_to(20.0).is_err());
    }

    #[test]
    fn paused_and_completed_reject_dispatch() {
        assert!(!GoalStatus::Paused.accepts_dispatch());
        assert!(!GoalStatus::Completed.accepts_dispatch());
        assert!(GoalStatus::Active.accepts_dispatch());
    }
}
