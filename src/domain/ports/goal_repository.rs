//! Goal repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Goal, GoalStatus};

#[async_trait]
pub trait GoalRepository: Send + Sync {
    async fn create(&self, goal: &Goal) -> DomainResult<()>;
    async fn get(&self, id: Uuid) -> DomainResult<Option<Goal>>;
    async fn update(&self, goal: &Goal) -> DomainResult<()>;
    async fn delete(&self, id: Uuid) -> DomainResult<()>;
    async fn list_by_workspace(&self, workspace_id: Uuid) -> DomainResult<Vec<Goal>>;
    async fn list_by_status(&self, workspace_id: Uuid, status: GoalStatus) -> DomainResult<Vec<Goal>>;
}
