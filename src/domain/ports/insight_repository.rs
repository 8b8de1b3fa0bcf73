//! Insight repository port (workspace memory store).

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Insight, InsightCategory};

/// Filter criteria for querying workspace memory.
#[derive(Debug, Clone, Default)]
pub struct InsightQuery {
    pub category: Option<InsightCategory>,
    pub min_confidence: Option<f64>,
}

#[async_trait]
pub trait InsightRepository: Send + Sync {
    async fn record(&self, insight: &Insight) -> DomainResult<()>;
    async fn get(&self, id: Uuid) -> DomainResult<Option<Insight>>;
    async fn update(&self, insight: &Insight) -> DomainResult<()>;
    async fn delete(&self, id: Uuid) -> DomainResult<()>;
    async fn query(&self, workspace_id: Uuid, query: InsightQuery) -> DomainResult<Vec<Insight>>;
    async fn count_for_workspace(&self, workspace_id: Uuid) -> DomainResult<usize>;

    /// All insights for a workspace ordered by eviction score ascending
    /// (lowest-value first), for the memory store's eviction pass.
    async fn list_eviction_candidates(&self, workspace_id: Uuid) -> DomainResult<Vec<Insight>>;
}
