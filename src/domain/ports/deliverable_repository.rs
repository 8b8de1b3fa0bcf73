//! Deliverable repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::Deliverable;

#[async_trait]
pub trait DeliverableRepository: Send + Sync {
    async fn create(&self, deliverable: &Deliverable) -> DomainResult<()>;
    async fn get(&self, id: Uuid) -> DomainResult<Option<Deliverable>>;
    async fn update(&self, deliverable: &Deliverable) -> DomainResult<()>;
    async fn list_by_workspace(&self, workspace_id: Uuid) -> DomainResult<Vec<Deliverable>>;
    async fn list_by_goal(&self, goal_id: Uuid) -> DomainResult<Vec<Deliverable>>;
    /// Looks up the deliverable uniquely identified by `(workspace_id, goal_id, title)`.
    async fn get_by_title(&self, workspace_id: Uuid, goal_id: Uuid, title: &str) -> DomainResult<Option<Deliverable>>;
}
