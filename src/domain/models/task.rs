//! Task domain model.
//!
//! A task is one unit of agent work, always linked to a goal. Semantic hashing
//! over `(name, description, goal_id)` backs the `(workspace_id, semantic_hash)`
//! uniqueness constraint that makes `enqueue` idempotent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Ready,
    InProgress,
    Completed,
    Failed,
    Cancelled,
    NeedsRevision,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::NeedsRevision => "needs_revision",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "ready" => Some(Self::Ready),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            "needs_revision" => Some(Self::NeedsRevision),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        use TaskStatus::*;
        matches!(
            (self, new_status),
            (Pending, Ready)
                | (Pending, Cancelled)
                | (Ready, InProgress)
                | (Ready, Cancelled)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (InProgress, Cancelled)
                | (InProgress, NeedsRevision)
                | (NeedsRevision, Ready)
                | (NeedsRevision, Cancelled)
                | (Failed, Pending) // requeued by recovery
                | (Failed, Completed) // skip_with_fallback degrades in place
                | (Failed, Cancelled) // decompose cancels the original
        )
    }

    /// An `agent_id` is required unless the task is cited as completed or
    /// cancelled (spec invariant on `Task.agent_id`).
    pub fn requires_agent(&self) -> bool {
        !matches!(self, Self::Completed | Self::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityFlag {
    Normal,
    Degraded,
}

impl QualityFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Degraded => "degraded",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "normal" => Some(Self::Normal),
            "degraded" => Some(Self::Degraded),
            _ => None,
        }
    }
}

/// Classification of why a task execution failed; the Recovery Engine
/// switches on this enum, never on an exception type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    ToolFailure,
    LlmRefusal,
    ParseError,
    QuotaExceeded,
    ContextOverflow,
    Unknown,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::ToolFailure => "tool_failure",
            Self::LlmRefusal => "llm_refusal",
            Self::ParseError => "parse_error",
            Self::QuotaExceeded => "quota_exceeded",
            Self::ContextOverflow => "context_overflow",
            Self::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "timeout" => Some(Self::Timeout),
            "tool_failure" => Some(Self::ToolFailure),
            "llm_refusal" => Some(Self::LlmRefusal),
            "parse_error" => Some(Self::ParseError),
            "quota_exceeded" => Some(Self::QuotaExceeded),
            "context_overflow" => Some(Self::ContextOverflow),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

/// Structured execution error returned by the Task Executor on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionError {
    pub kind: FailureKind,
    pub message: String,
    pub is_transient: bool,
    pub partial_output: Option<String>,
}

impl ExecutionError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        let is_transient = matches!(
            kind,
            FailureKind::Timeout | FailureKind::ToolFailure | FailureKind::QuotaExceeded
        );
        Self { kind, message: message.into(), is_transient, partial_output: None }
    }

    pub fn with_partial_output(mut self, output: impl Into<String>) -> Self {
        self.partial_output = Some(output.into());
        self
    }
}

/// One round of the tool-call trace captured during execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub tool_name: String,
    pub input: serde_json::Value,
    pub output: Option<serde_json::Value>,
    pub succeeded: bool,
    pub duration_ms: u64,
}

/// An artifact referenced by a completed task's output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskArtifact {
    pub uri: String,
    pub mime_type: String,
    pub byte_size: u64,
}

/// Tagged-variant task output (REDESIGN FLAGS: replaces free-form dict-like
/// structures with a variant downstream consumers pattern-match on).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskOutput {
    Structured { records: Vec<serde_json::Value> },
    Document { markdown: String },
    Artifact { artifacts: Vec<TaskArtifact> },
    Mixed { summary: String, records: Vec<serde_json::Value>, artifacts: Vec<TaskArtifact> },
}

/// Full successful execution result, per spec.md §4.4.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub summary: String,
    pub output: TaskOutput,
    pub tool_trace: Vec<ToolCallRecord>,
    pub execution_time_ms: u64,
    pub agent_metadata: serde_json::Value,
    /// Declared numeric contribution toward the owning goal's `target_value`,
    /// consumed by the Deliverable Aggregator / Goal Registry.
    pub goal_contribution: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl TaskPriority {
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

    /// Base numeric priority fed into the deterministic priority scorer.
    pub fn base_priority(&self) -> f64 {
        match self {
            Self::Low => 1.0,
            Self::Medium => 3.0,
            Self::High => 6.0,
            Self::Critical => 10.0,
        }
    }
}

/// A discrete unit of agent work, linked to exactly one goal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub goal_id: Uuid,
    pub agent_id: Option<Uuid>,
    pub name: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    /// Computed priority score used for ready-queue ordering; recalculated by
    /// the priority calculator, not hand-set.
    pub priority_score: f64,
    pub recovery_count: u32,
    pub last_failure_type: Option<FailureKind>,
    pub quality_flag: QualityFlag,
    pub semantic_hash: String,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub result: Option<TaskResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

/// Compute the SHA-256 semantic hash over `name + description + goal_id`.
pub fn semantic_hash(name: &str, description: &str, goal_id: Uuid) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update(b"\0");
    hasher.update(description.as_bytes());
    hasher.update(b"\0");
    hasher.update(goal_id.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl Task {
    pub fn new(workspace_id: Uuid, goal_id: Uuid, name: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        let name = name.into();
        let description = description.into();
        let hash = semantic_hash(&name, &description, goal_id);
        Self {
            id: Uuid::new_v4(),
            workspace_id,
            goal_id,
            agent_id: None,
            name,
            description,
            status: TaskStatus::Pending,
            priority: TaskPriority::Medium,
            priority_score: TaskPriority::Medium.base_priority(),
            recovery_count: 0,
            last_failure_type: None,
            quality_flag: QualityFlag::Normal,
            semantic_hash: hash,
            cooldown_until: None,
            result: None,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority_score = priority.base_priority();
        self.priority = priority;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("task name cannot be empty".to_string());
        }
        if self.description.trim().is_empty() {
            return Err("task description cannot be empty".to_string());
        }
        Ok(())
    }

    pub fn can_transition_to(&self, new_status: TaskStatus) -> bool {
        self.status.can_transition_to(new_status)
    }

    pub fn transition_to(&mut self, new_status: TaskStatus) -> Result<(), String> {
        if !self.can_transition_to(new_status) {
            return Err(format!(
                "cannot transition task from {} to {}",
                self.status.as_str(),
                new_status.as_str()
            ));
        }
        if new_status.requires_agent() && self.agent_id.is_none() && new_status != TaskStatus::Pending {
            return Err("task requires an assigned agent for this transition".to_string());
        }
        self.status = new_status;
        self.updated_at = Utc::now();
        self.version += 1;
        Ok(())
    }

    pub fn assign_agent(&mut self, agent_id: Uuid) {
        self.agent_id = Some(agent_id);
        self.updated_at = Utc::now();
        self.version += 1;
    }

    pub fn mark_in_progress(&mut self, agent_id: Uuid) -> Result<(), String> {
        self.assign_agent(agent_id);
        self.transition_to(TaskStatus::InProgress)
    }

    pub fn mark_completed(&mut self, result: TaskResult) -> Result<(), String> {
        self.result = Some(result);
        self.transition_to(TaskStatus::Completed)
    }

    pub fn mark_degraded_completed(&mut self, result: TaskResult) -> Result<(), String> {
        self.quality_flag = QualityFlag::Degraded;
        self.mark_completed(result)
    }

    pub fn record_failure(&mut self, kind: FailureKind) -> Result<(), String> {
        self.last_failure_type = Some(kind);
        self.recovery_count += 1;
        self.transition_to(TaskStatus::Failed)
    }

    /// Requeue for retry after a recovery decision. Clears the agent binding
    /// so the next dispatch can rebind (possibly to a different agent).
    pub fn requeue(&mut self, delay: chrono::Duration) -> Result<(), String> {
        self.agent_id = None;
        self.cooldown_until = Some(Utc::now() + delay);
        self.transition_to(TaskStatus::Pending)
    }

    pub fn is_cooled_down(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_until.map(|until| until <= now).unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Task {
        Task::new(Uuid::new_v4(), Uuid::new_v4(), "Draft email #1", "Write a cold outreach email")
    }

    #[test]
    fn semantic_hash_is_deterministic() {
        let goal_id = Uuid::new_v4();
        let a = semantic_hash("t", "d", goal_id);
        let b = semantic_hash("t", "d", goal_id);
        assert_eq!(a, b);
    }

    #[test]
    fn semantic_hash_differs_on_goal() {
        let a = semantic_hash("t", "d", Uuid::new_v4());
        let b = semantic_hash("t", "d", Uuid::new_v4());
        assert_ne!(a, b);
    }

    #[test]
    fn pending_to_in_progress_requires_ready_first() {
        let mut t = sample();
        assert!(t.transition_to(TaskStatus::InProgress).is_err());
        t.transition_to(TaskStatus::Ready).unwrap();
        assert!(t.mark_in_progress(Uuid::new_v4()).is_ok());
    }

    #[test]
    fn completed_task_may_have_no_agent_if_never_assigned_is_disallowed() {
        // completed/cancelled tasks MAY have agent_id=null; everything else requires it.
        let mut t = sample();
        t.transition_to(TaskStatus::Ready).unwrap();
        t.mark_in_progress(Uuid::new_v4()).unwrap();
        let result = TaskResult {
            summary: "done".into(),
            output: TaskOutput::Document { markdown: "# done".into() },
            tool_trace: vec![],
            execution_time_ms: 10,
            agent_metadata: serde_json::json!({}),
            goal_contribution: 1.0,
        };
        t.mark_completed(result).unwrap();
        assert_eq!(t.status, TaskStatus::Completed);
    }

    #[test]
    fn failed_then_requeued_clears_agent_and_sets_cooldown() {
        let mut t = sample();
        t.transition_to(TaskStatus::Ready).unwrap();
        t.mark_in_progress(Uuid::new_v4()).unwrap();
        t.record_failure(FailureKind::Timeout).unwrap();
        t.requeue(chrono::Duration::seconds(30)).unwrap();
        assert!(t.agent_id.is_none());
        assert!(!t.is_cooled_down(Utc::now()));
        assert!(t.is_cooled_down(Utc::now() + chrono::Duration::seconds(31)));
    }

    #[test]
    fn degraded_completion_sets_quality_flag() {
        let mut t = sample();
        t.transition_to(TaskStatus::Ready).unwrap();
        t.mark_in_progress(Uuid::new_v4()).unwrap();
        let result = TaskResult {
            summary: "best effort".into(),
            output: TaskOutput::Document { markdown: "partial".into() },
            tool_trace: vec![],
            execution_time_ms: 1,
            agent_metadata: serde_json::json!({}),
            goal_contribution: 0.8,
        };
        t.mark_degraded_completed(result).unwrap();
        assert_eq!(t.quality_flag, QualityFlag::Degraded);
        assert_eq!(t.status, TaskStatus::Completed);
    }
}
