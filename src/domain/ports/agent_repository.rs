//! Agent repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::Agent;

#[async_trait]
pub trait AgentRepository: Send + Sync {
    async fn create(&self, agent: &Agent) -> DomainResult<()>;
    async fn get(&self, id: Uuid) -> DomainResult<Option<Agent>>;
    async fn update(&self, agent: &Agent) -> DomainResult<()>;
    async fn delete(&self, id: Uuid) -> DomainResult<()>;
    async fn list_by_workspace(&self, workspace_id: Uuid) -> DomainResult<Vec<Agent>>;
    async fn list_available(&self, workspace_id: Uuid) -> DomainResult<Vec<Agent>>;
}
