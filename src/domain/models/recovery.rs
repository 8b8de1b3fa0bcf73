//! Recovery domain model.
//!
//! Captures one autonomous recovery decision made against a failed task: the
//! strategy chosen, the confidence behind it, and a human-readable explanation
//! generated without any extra LLM round trip.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::task::FailureKind;

/// The six ordered recovery strategies, tried in priority order by the
/// recovery engine's rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    RetryWithDelay,
    RetryWithDifferentAgent,
    Decompose,
    AlternativeApproach,
    SkipWithFallback,
    ContextReconstruction,
}

impl RecoveryStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RetryWithDelay => "retry_with_delay",
            Self::RetryWithDifferentAgent => "retry_with_different_agent",
            Self::Decompose => "decompose",
            Self::AlternativeApproach => "alternative_approach",
            Self::SkipWithFallback => "skip_with_fallback",
            Self::ContextReconstruction => "context_reconstruction",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "retry_with_delay" => Some(Self::RetryWithDelay),
            "retry_with_different_agent" => Some(Self::RetryWithDifferentAgent),
            "decompose" => Some(Self::Decompose),
            "alternative_approach" => Some(Self::AlternativeApproach),
            "skip_with_fallback" => Some(Self::SkipWithFallback),
            "context_reconstruction" => Some(Self::ContextReconstruction),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryOutcome {
    Pending,
    Succeeded,
    Failed,
}

impl RecoveryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// One autonomous recovery decision and its eventual outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryAttempt {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub task_id: Uuid,
    pub failure_kind: FailureKind,
    /// SHA-256 signature over `(task.semantic_hash, failure_kind)`, used to
    /// detect recurring failure patterns across tasks.
    pub failure_signature: String,
    pub strategy: RecoveryStrategy,
    /// Confidence in [0,1] the recovery engine had in this strategy choice;
    /// below 0.7 the engine falls back to `retry_with_delay`.
    pub confidence: f64,
    pub outcome: RecoveryOutcome,
    pub attempted_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Compute the failure-pattern signature used for recurrence detection.
pub fn failure_signature(task_semantic_hash: &str, kind: FailureKind) -> String {
    let mut hasher = Sha256::new();
    hasher.update(task_semantic_hash.as_bytes());
    hasher.update(b"\0");
    hasher.update(kind.as_str().as_bytes());
    format!("{:x}", hasher.finalize())
}

impl RecoveryAttempt {
    pub fn new(
        workspace_id: Uuid,
        task_id: Uuid,
        failure_kind: FailureKind,
        task_semantic_hash: &str,
        strategy: RecoveryStrategy,
        confidence: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            workspace_id,
            task_id,
            failure_kind,
            failure_signature: failure_signature(task_semantic_hash, failure_kind),
            strategy,
            confidence: confidence.clamp(0.0, 1.0),
            outcome: RecoveryOutcome::Pending,
            attempted_at: Utc::now(),
            resolved_at: None,
        }
    }

    pub fn resolve(&mut self, succeeded: bool) {
        self.outcome = if succeeded { RecoveryOutcome::Succeeded } else { RecoveryOutcome::Failed };
        self.resolved_at = Some(Utc::now());
    }

    /// Below this confidence the engine must not trust its own rule-table
    /// match and instead defaults to the safest strategy.
    pub const CONFIDENCE_FLOOR: f64 = 0.7;

    pub fn below_confidence_floor(&self) -> bool {
        self.confidence < Self::CONFIDENCE_FLOOR
    }
}

/// Human-readable explanation of a recovery decision, generated deterministically
/// from the attempt's fields (no LLM round trip required).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryExplanation {
    pub attempt_id: Uuid,
    pub headline: String,
    pub reasoning: String,
    pub generated_at: DateTime<Utc>,
}

impl RecoveryExplanation {
    pub fn generate(attempt: &RecoveryAttempt, failure_recurrence_count: u32) -> Self {
        let headline = format!(
            "Task failed with {}; applying {}",
            attempt.failure_kind.as_str(),
            attempt.strategy.as_str()
        );
        let mut reasoning = format!(
            "Failure kind '{}' was classified and matched against the recovery rule table with confidence {:.2}.",
            attempt.failure_kind.as_str(),
            attempt.confidence
        );
        if attempt.below_confidence_floor() {
            reasoning.push_str(&format!(
                " Confidence was below the {:.2} floor, so the engine fell back to retry_with_delay rather than trusting the rule match.",
                RecoveryAttempt::CONFIDENCE_FLOOR
            ));
        }
        if failure_recurrence_count > 1 {
            reasoning.push_str(&format!(
                " This failure signature has recurred {failure_recurrence_count} times, which factored into strategy selection."
            ));
        }
        Self { attempt_id: attempt.id, headline, reasoning, generated_at: Utc::now() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_signature_is_stable_per_hash_and_kind() {
        let a = failure_signature("abc", FailureKind::Timeout);
        let b = failure_signature("abc", FailureKind::Timeout);
        assert_eq!(a, b);
        let c = failure_signature("abc", FailureKind::ToolFailure);
        assert_ne!(a, c);
    }

    #[test]
    fn low_confidence_is_flagged() {
        let attempt = RecoveryAttempt::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            FailureKind::Unknown,
            "hash",
            RecoveryStrategy::RetryWithDelay,
            0.4,
        );
        assert!(attempt.below_confidence_floor());
    }

    #[test]
    fn explanation_mentions_floor_when_below_confidence() {
        let attempt = RecoveryAttempt::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            FailureKind::ParseError,
            "hash",
            RecoveryStrategy::RetryWithDelay,
            0.3,
        );
        let explanation = RecoveryExplanation::generate(&attempt, 1);
        assert!(explanation.reasoning.contains("floor"));
    }

    #[test]
    fn resolve_sets_outcome_and_timestamp() {
        let mut attempt = RecoveryAttempt::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            FailureKind::Timeout,
            "hash",
            RecoveryStrategy::RetryWithDelay,
            0.9,
        );
        attempt.resolve(true);
        assert_eq!(attempt.outcome, RecoveryOutcome::Succeeded);
        assert!(attempt.resolved_at.is_some());
    }
}
