//! Workspace repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Workspace, WorkspaceStatus};

#[async_trait]
pub trait WorkspaceRepository: Send + Sync {
    async fn create(&self, workspace: &Workspace) -> DomainResult<()>;
    async fn get(&self, id: Uuid) -> DomainResult<Option<Workspace>>;

    /// Update with optimistic concurrency: fails with
    /// `DomainError::ConcurrencyConflict` if the stored `version` no longer
    /// matches `workspace.version - 1`.
    async fn update(&self, workspace: &Workspace) -> DomainResult<()>;

    async fn delete(&self, id: Uuid) -> DomainResult<()>;
    async fn list(&self) -> DomainResult<Vec<Workspace>>;
    async fn list_by_status(&self, status: WorkspaceStatus) -> DomainResult<Vec<Workspace>>;
}
