//! Domain entities: the plain-data core of the orchestrator.

pub mod agent;
pub mod deliverable;
pub mod goal;
pub mod insight;
pub mod proposal;
pub mod recovery;
pub mod task;
pub mod workspace;

pub use agent::{keywordize, Agent, AgentStatus, Seniority};
pub use deliverable::{Deliverable, DeliverableEntry, DeliverableStatus, DisplayFormat, TransformationStatus};
pub use goal::{Goal, GoalPriority, GoalStatus, MetricType};
pub use insight::{Insight, InsightCategory};
pub use proposal::{Proposal, ProposalStatus, ProposedAgentSlot};
pub use recovery::{RecoveryAttempt, RecoveryExplanation, RecoveryOutcome, RecoveryStrategy};
pub use task::{
    ExecutionError, FailureKind, QualityFlag, Task, TaskArtifact, TaskOutput, TaskPriority, TaskResult, TaskStatus,
    ToolCallRecord,
};
pub use workspace::{Workspace, WorkspaceStatus};
