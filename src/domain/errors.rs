//! Domain error types for the orchestration core.
//!
//! Mirrors the teacher's per-concern error split: each infrastructure boundary
//! gets its own enum, and the Recovery Engine switches on `FailureKind`, never
//! on an exception hierarchy.

use thiserror::Error;
use uuid::Uuid;

/// Domain-level errors surfaced by repositories and services.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("workspace not found: {0}")]
    WorkspaceNotFound(Uuid),

    #[error("goal not found: {0}")]
    GoalNotFound(Uuid),

    #[error("agent not found: {0}")]
    AgentNotFound(Uuid),

    #[error("task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("deliverable not found: {0}")]
    DeliverableNotFound(Uuid),

    #[error("insight not found: {0}")]
    InsightNotFound(Uuid),

    #[error("proposal not found: {0}")]
    ProposalNotFound(Uuid),

    #[error("duplicate task: semantic hash already exists in this workspace")]
    DuplicateTask,

    #[error("goal is not active: {0}")]
    GoalInactive(Uuid),

    #[error("task queue backpressure: {pending} pending tasks exceeds ceiling of {ceiling}")]
    QueueBackpressure { pending: usize, ceiling: usize },

    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("workspace is not active: {0}")]
    WorkspaceInactive(Uuid),

    #[error("concurrency conflict: {entity} {id} was modified concurrently")]
    ConcurrencyConflict { entity: String, id: String },

    #[error("transient store conflict on {entity} {id} after one retry")]
    TransientStoreConflict { entity: String, id: String },

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    /// Whether the caller may safely retry after correcting input (not-found/conflict).
    pub const fn is_retryable_by_caller(&self) -> bool {
        matches!(
            self,
            Self::TransientStoreConflict { .. } | Self::ConcurrencyConflict { .. }
        )
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}

/// Errors from the pluggable LLM capability port.
#[derive(Error, Debug, Clone)]
pub enum LlmError {
    #[error("llm request timed out after {0}ms")]
    Timeout(u64),

    #[error("llm provider refused the request: {0}")]
    Refusal(String),

    #[error("llm transport error: {0}")]
    Transport(String),

    #[error("llm quota exceeded")]
    QuotaExceeded,

    #[error("llm response could not be parsed: {0}")]
    ParseError(String),
}

impl LlmError {
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Transport(_) | Self::QuotaExceeded)
    }
}

/// Errors from tool invocation during task execution.
#[derive(Error, Debug, Clone)]
pub enum ToolError {
    #[error("tool '{0}' timed out")]
    Timeout(String),

    #[error("tool '{0}' circuit breaker is open")]
    CircuitOpen(String),

    #[error("tool '{name}' failed: {message}")]
    Failed { name: String, message: String },

    #[error("tool '{0}' not found")]
    NotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrency_conflict_is_caller_retryable() {
        let err = DomainError::ConcurrencyConflict { entity: "goal".into(), id: "x".into() };
        assert!(err.is_retryable_by_caller());
        let err = DomainError::TaskNotFound(Uuid::new_v4());
        assert!(!err.is_retryable_by_caller());
    }

    #[test]
    fn llm_error_transience() {
        assert!(LlmError::Timeout(30_000).is_transient());
        assert!(LlmError::QuotaExceeded.is_transient());
        assert!(!LlmError::Refusal("no".into()).is_transient());
    }
}
