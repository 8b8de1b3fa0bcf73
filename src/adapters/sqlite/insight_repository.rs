//! SQLite implementation of the InsightRepository (workspace memory store).

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Insight, InsightCategory};
use crate::domain::ports::{InsightQuery, InsightRepository};

#[derive(Clone)]
pub struct SqliteInsightRepository {
    pool: SqlitePool,
}

impl SqliteInsightRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InsightRepository for SqliteInsightRepository {
    async fn record(&self, insight: &Insight) -> DomainResult<()> {
        let referenced_by_json = serde_json::to_string(&insight.referenced_by)?;

        sqlx::query(
            r#"INSERT INTO insights (id, workspace_id, category, summary, detail, confidence, business_value,
               referenced_by, created_at, last_reinforced_at, reinforcement_count)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(insight.id.to_string())
        .bind(insight.workspace_id.to_string())
        .bind(insight.category.as_str())
        .bind(&insight.summary)
        .bind(&insight.detail)
        .bind(insight.confidence)
        .bind(insight.business_value)
        .bind(&referenced_by_json)
        .bind(insight.created_at.to_rfc3339())
        .bind(insight.last_reinforced_at.to_rfc3339())
        .bind(i64::from(insight.reinforcement_count))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Insight>> {
        let row: Option<InsightRow> = sqlx::query_as("SELECT * FROM insights WHERE id = ?").bind(id.to_string()).fetch_optional(&self.pool).await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update(&self, insight: &Insight) -> DomainResult<()> {
        let referenced_by_json = serde_json::to_string(&insight.referenced_by)?;

        let result = sqlx::query(
            r#"UPDATE insights SET summary = ?, detail = ?, confidence = ?, business_value = ?, referenced_by = ?,
               last_reinforced_at = ?, reinforcement_count = ? WHERE id = ?"#,
        )
        .bind(&insight.summary)
        .bind(&insight.detail)
        .bind(insight.confidence)
        .bind(insight.business_value)
        .bind(&referenced_by_json)
        .bind(insight.last_reinforced_at.to_rfc3339())
        .bind(i64::from(insight.reinforcement_count))
        .bind(insight.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::InsightNotFound(insight.id));
        }

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM insights WHERE id = ?").bind(id.to_string()).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(DomainError::InsightNotFound(id));
        }
        Ok(())
    }

    async fn query(&self, workspace_id: Uuid, query: InsightQuery) -> DomainResult<Vec<Insight>> {
        let mut sql = String::from("SELECT * FROM insights WHERE workspace_id = ?");
        if query.category.is_some() {
            sql.push_str(" AND category = ?");
        }
        if query.min_confidence.is_some() {
            sql.push_str(" AND confidence >= ?");
        }
        sql.push_str(" ORDER BY (confidence * business_value) DESC");

        let mut q = sqlx::query_as::<_, InsightRow>(&sql).bind(workspace_id.to_string());
        if let Some(category) = query.category {
            q = q.bind(category.as_str().to_string());
        }
        if let Some(min_confidence) = query.min_confidence {
            q = q.bind(min_confidence);
        }

        let rows: Vec<InsightRow> = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn count_for_workspace(&self, workspace_id: Uuid) -> DomainResult<usize> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM insights WHERE workspace_id = ?").bind(workspace_id.to_string()).fetch_one(&self.pool).await?;
        Ok(row.0 as usize)
    }

    async fn list_eviction_candidates(&self, workspace_id: Uuid) -> DomainResult<Vec<Insight>> {
        let rows: Vec<InsightRow> =
            sqlx::query_as("SELECT * FROM insights WHERE workspace_id = ? AND referenced_by = '[]' ORDER BY (confidence * business_value) ASC")
                .bind(workspace_id.to_string())
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct InsightRow {
    id: String,
    workspace_id: String,
    category: String,
    summary: String,
    detail: serde_json::Value,
    confidence: f64,
    business_value: f64,
    referenced_by: String,
    created_at: String,
    last_reinforced_at: String,
    reinforcement_count: i64,
}

impl TryFrom<InsightRow> for Insight {
    type Error = DomainError;

    fn try_from(row: InsightRow) -> Result<Self, Self::Error> {
        let category = InsightCategory::from_str(&row.category).ok_or_else(|| DomainError::Serialization(format!("invalid insight category: {}", row.category)))?;
        let referenced_by: Vec<Uuid> = serde_json::from_str(&row.referenced_by)?;

        Ok(Insight {
            id: super::parse_uuid(&row.id)?,
            workspace_id: super::parse_uuid(&row.workspace_id)?,
            category,
            summary: row.summary,
            detail: row.detail,
            confidence: row.confidence,
            business_value: row.business_value,
            referenced_by,
            created_at: super::parse_datetime(&row.created_at)?,
            last_reinforced_at: super::parse_datetime(&row.last_reinforced_at)?,
            reinforcement_count: row.reinforcement_count as u32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use crate::adapters::sqlite::workspace_repository::SqliteWorkspaceRepository;
    use crate::domain::models::Workspace;
    use crate::domain::ports::WorkspaceRepository;

    async fn setup() -> (SqliteInsightRepository, Uuid) {
        let pool = create_migrated_test_pool().await.unwrap();
        let workspaces = SqliteWorkspaceRepository::new(pool.clone());
        let insights = SqliteInsightRepository::new(pool);

        let workspace = Workspace::new("Outreach", "100 leads");
        workspaces.create(&workspace).await.unwrap();
        (insights, workspace.id)
    }

    #[tokio::test]
    async fn query_orders_by_eviction_score_descending() {
        let (insights, workspace_id) = setup().await;
        let low = Insight::new(workspace_id, InsightCategory::General, "low value", serde_json::json!({}), 0.3, 0.2);
        let high = Insight::new(workspace_id, InsightCategory::General, "high value", serde_json::json!({}), 0.9, 0.9);
        insights.record(&low).await.unwrap();
        insights.record(&high).await.unwrap();

        let results = insights.query(workspace_id, InsightQuery::default()).await.unwrap();
        assert_eq!(results[0].summary, "high value");
    }

    #[tokio::test]
    async fn eviction_candidates_excludes_referenced_insights() {
        let (insights, workspace_id) = setup().await;
        let mut referenced = Insight::new(workspace_id, InsightCategory::General, "pinned", serde_json::json!({}), 0.1, 0.1);
        referenced.referenced_by.push(Uuid::new_v4());
        insights.record(&referenced).await.unwrap();

        let candidates = insights.list_eviction_candidates(workspace_id).await.unwrap();
        assert!(candidates.is_empty());
    }
}
