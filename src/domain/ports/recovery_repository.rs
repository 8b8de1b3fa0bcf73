//! Recovery attempt repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::RecoveryAttempt;

#[async_trait]
pub trait RecoveryRepository: Send + Sync {
    async fn record(&self, attempt: &RecoveryAttempt) -> DomainResult<()>;
    async fn update(&self, attempt: &RecoveryAttempt) -> DomainResult<()>;
    async fn list_by_task(&self, task_id: Uuid) -> DomainResult<Vec<RecoveryAttempt>>;
    async fn list_by_workspace(&self, workspace_id: Uuid) -> DomainResult<Vec<RecoveryAttempt>>;

    /// Count prior attempts that share a failure signature, used to detect
    /// recurring failure patterns for both strategy selection and explanations.
    async fn count_by_signature(&self, workspace_id: Uuid, signature: &str) -> DomainResult<u32>;
}
