//! Port traits: the seams between domain logic and infrastructure.

pub mod agent_repository;
pub mod deliverable_repository;
pub mod event_bus;
pub mod goal_repository;
pub mod insight_repository;
pub mod llm_provider;
pub mod proposal_repository;
pub mod recovery_repository;
pub mod task_repository;
pub mod tool_provider;
pub mod workspace_repository;

pub use agent_repository::AgentRepository;
pub use deliverable_repository::DeliverableRepository;
pub use event_bus::EventPublisher;
pub use goal_repository::GoalRepository;
pub use insight_repository::{InsightQuery, InsightRepository};
pub use llm_provider::{LlmCapability, LlmRequest, LlmResponse};
pub use proposal_repository::ProposalRepository;
pub use recovery_repository::RecoveryRepository;
pub use task_repository::{TaskFilter, TaskRepository};
pub use tool_provider::Tool;
pub use workspace_repository::WorkspaceRepository;
