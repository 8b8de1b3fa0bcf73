//! Proposal repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::Proposal;

#[async_trait]
pub trait ProposalRepository: Send + Sync {
    async fn create(&self, proposal: &Proposal) -> DomainResult<()>;
    async fn get(&self, id: Uuid) -> DomainResult<Option<Proposal>>;
    async fn update(&self, proposal: &Proposal) -> DomainResult<()>;
    async fn list_by_workspace(&self, workspace_id: Uuid) -> DomainResult<Vec<Proposal>>;
}
