//! Workspace Memory Store.
//!
//! Records and queries durable `Insight`s, capping each workspace at
//! `MEMORY_MAX_INSIGHTS_PER_WORKSPACE` entries. Eviction removes the
//! lowest `confidence * business_value` insights among those older than
//! the eviction grace period, and never touches a pinned (referenced)
//! insight.

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Insight, InsightCategory};
use crate::domain::ports::{InsightQuery, InsightRepository};

pub const DEFAULT_MAX_INSIGHTS_PER_WORKSPACE: usize = 100;
pub const DEFAULT_EVICTION_GRACE: Duration = Duration::hours(24);

pub struct MemoryStore<I: InsightRepository> {
    insights: Arc<I>,
    max_insights_per_workspace: usize,
    eviction_grace: Duration,
}

impl<I: InsightRepository> MemoryStore<I> {
    pub fn new(insights: Arc<I>) -> Self {
        Self {
            insights,
            max_insights_per_workspace: DEFAULT_MAX_INSIGHTS_PER_WORKSPACE,
            eviction_grace: DEFAULT_EVICTION_GRACE,
        }
    }

    pub fn with_capacity(mut self, max_insights_per_workspace: usize, eviction_grace: Duration) -> Self {
        self.max_insights_per_workspace = max_insights_per_workspace;
        self.eviction_grace = eviction_grace;
        self
    }

    /// Records a new insight, evicting the lowest-value unreferenced old
    /// insight first if the workspace is already at capacity.
    pub async fn record(&self, insight: Insight) -> DomainResult<Insight> {
        let count = self.insights.count_for_workspace(insight.workspace_id).await?;
        if count >= self.max_insights_per_workspace {
            self.evict_one(insight.workspace_id).await?;
        }
        self.insights.record(&insight).await?;
        Ok(insight)
    }

    /// Strengthens an existing insight instead of recording a duplicate,
    /// when the caller has already identified a matching insight id.
    pub async fn reinforce(&self, insight_id: Uuid, confidence_delta: f64) -> DomainResult<Option<Insight>> {
        let Some(mut insight) = self.insights.get(insight_id).await? else {
            return Ok(None);
        };
        insight.reinforce(confidence_delta);
        self.insights.update(&insight).await?;
        Ok(Some(insight))
    }

    pub async fn query(&self, workspace_id: Uuid, category: Option<InsightCategory>, min_confidence: Option<f64>) -> DomainResult<Vec<Insight>> {
        self.insights.query(workspace_id, InsightQuery { category, min_confidence }).await
    }

    pub async fn link_to_deliverable(&self, insight_id: Uuid, deliverable_id: Uuid) -> DomainResult<()> {
        if let Some(mut insight) = self.insights.get(insight_id).await? {
            insight.link_deliverable(deliverable_id);
            self.insights.update(&insight).await?;
        }
        Ok(())
    }

    /// Finds and removes the single lowest-eviction-score insight older than
    /// the grace period and not pinned by an active deliverable. A no-op if
    /// every candidate is pinned or too young — capacity is then allowed to
    /// exceed the soft cap rather than evicting something load-bearing.
    async fn evict_one(&self, workspace_id: Uuid) -> DomainResult<()> {
        let cutoff = Utc::now() - self.eviction_grace;
        let candidates = self.insights.list_eviction_candidates(workspace_id).await?;
        let victim = candidates
            .into_iter()
            .filter(|i| !i.is_pinned() && i.created_at < cutoff)
            .min_by(|a, b| a.eviction_score().partial_cmp(&b.eviction_score()).unwrap_or(std::cmp::Ordering::Equal));

        if let Some(victim) = victim {
            self.insights.delete(victim.id).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct InMemoryInsights {
        rows: StdMutex<HashMap<Uuid, Insight>>,
    }

    #[async_trait]
    impl InsightRepository for InMemoryInsights {
        async fn record(&self, insight: &Insight) -> DomainResult<()> {
            self.rows.lock().unwrap().insert(insight.id, insight.clone());
            Ok(())
        }
        async fn get(&self, id: Uuid) -> DomainResult<Option<Insight>> {
            Ok(self.rows.lock().unwrap().get(&id).cloned())
        }
        async fn update(&self, insight: &Insight) -> DomainResult<()> {
            self.rows.lock().unwrap().insert(insight.id, insight.clone());
            Ok(())
        }
        async fn delete(&self, id: Uuid) -> DomainResult<()> {
            self.rows.lock().unwrap().remove(&id);
            Ok(())
        }
        async fn query(&self, workspace_id: Uuid, query: InsightQuery) -> DomainResult<Vec<Insight>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .values()
                .filter(|i| i.workspace_id == workspace_id)
                .filter(|i| query.category.map_or(true, |c| i.category == c))
                .filter(|i| query.min_confidence.map_or(true, |m| i.confidence >= m))
                .cloned()
                .collect())
        }
        async fn count_for_workspace(&self, workspace_id: Uuid) -> DomainResult<usize> {
            Ok(self.rows.lock().unwrap().values().filter(|i| i.workspace_id == workspace_id).count())
        }
        async fn list_eviction_candidates(&self, workspace_id: Uuid) -> DomainResult<Vec<Insight>> {
            let mut rows: Vec<Insight> = self.rows.lock().unwrap().values().filter(|i| i.workspace_id == workspace_id).cloned().collect();
            rows.sort_by(|a, b| a.eviction_score().partial_cmp(&b.eviction_score()).unwrap());
            Ok(rows)
        }
    }

    fn aged_insight(workspace_id: Uuid, confidence: f64, business_value: f64) -> Insight {
        let mut insight = Insight::new(workspace_id, InsightCategory::General, "note", serde_json::json!({}), confidence, business_value);
        insight.created_at = Utc::now() - Duration::days(2);
        insight
    }

    #[tokio::test]
    async fn evicts_lowest_score_when_at_capacity() {
        let store = MemoryStore::new(Arc::new(InMemoryInsights::default())).with_capacity(2, Duration::hours(1));
        let workspace_id = Uuid::new_v4();

        let low = aged_insight(workspace_id, 0.2, 0.2);
        let high = aged_insight(workspace_id, 0.9, 0.9);
        store.record(low.clone()).await.unwrap();
        store.record(high.clone()).await.unwrap();

        let newest = aged_insight(workspace_id, 0.5, 0.5);
        store.record(newest).await.unwrap();

        let remaining = store.query(workspace_id, None, None).await.unwrap();
        assert_eq!(remaining.len(), 2);
        assert!(remaining.iter().all(|i| i.id != low.id));
    }

    #[tokio::test]
    async fn pinned_insight_survives_eviction_pressure() {
        let store = MemoryStore::new(Arc::new(InMemoryInsights::default())).with_capacity(1, Duration::hours(1));
        let workspace_id = Uuid::new_v4();

        let mut pinned = aged_insight(workspace_id, 0.1, 0.1);
        pinned.link_deliverable(Uuid::new_v4());
        store.record(pinned.clone()).await.unwrap();

        let newcomer = aged_insight(workspace_id, 0.9, 0.9);
        store.record(newcomer).await.unwrap();

        let remaining = store.query(workspace_id, None, None).await.unwrap();
        assert!(remaining.iter().any(|i| i.id == pinned.id));
    }

    #[tokio::test]
    async fn reinforce_updates_existing_insight() {
        let store = MemoryStore::new(Arc::new(InMemoryInsights::default()));
        let insight = Insight::new(Uuid::new_v4(), InsightCategory::General, "note", serde_json::json!({}), 0.5, 0.5);
        store.record(insight.clone()).await.unwrap();

        let updated = store.reinforce(insight.id, 0.2).await.unwrap().unwrap();
        assert!(updated.confidence > 0.5);
        assert_eq!(updated.reinforcement_count, 1);
    }
}
