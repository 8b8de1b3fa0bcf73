//! SQLite implementation of the ProposalRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Proposal, ProposalStatus, ProposedAgentSlot};
use crate::domain::ports::ProposalRepository;

#[derive(Clone)]
pub struct SqliteProposalRepository {
    pool: SqlitePool,
}

impl SqliteProposalRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProposalRepository for SqliteProposalRepository {
    async fn create(&self, proposal: &Proposal) -> DomainResult<()> {
        let team_json = serde_json::to_string(&proposal.team)?;

        sqlx::query(
            r#"INSERT INTO proposals (id, workspace_id, goal_text, feedback, team, estimated_cost, status, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(proposal.id.to_string())
        .bind(proposal.workspace_id.to_string())
        .bind(&proposal.goal_text)
        .bind(&proposal.feedback)
        .bind(&team_json)
        .bind(proposal.estimated_cost)
        .bind(proposal.status.as_str())
        .bind(proposal.created_at.to_rfc3339())
        .bind(proposal.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Proposal>> {
        let row: Option<ProposalRow> = sqlx::query_as("SELECT * FROM proposals WHERE id = ?").bind(id.to_string()).fetch_optional(&self.pool).await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update(&self, proposal: &Proposal) -> DomainResult<()> {
        let result = sqlx::query("UPDATE proposals SET status = ?, updated_at = ? WHERE id = ?")
            .bind(proposal.status.as_str())
            .bind(proposal.updated_at.to_rfc3339())
            .bind(proposal.id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::ProposalNotFound(proposal.id));
        }

        Ok(())
    }

    async fn list_by_workspace(&self, workspace_id: Uuid) -> DomainResult<Vec<Proposal>> {
        let rows: Vec<ProposalRow> = sqlx::query_as("SELECT * FROM proposals WHERE workspace_id = ? ORDER BY created_at DESC")
            .bind(workspace_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct ProposalRow {
    id: String,
    workspace_id: String,
    goal_text: String,
    feedback: Option<String>,
    team: String,
    estimated_cost: f64,
    status: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<ProposalRow> for Proposal {
    type Error = DomainError;

    fn try_from(row: ProposalRow) -> Result<Self, Self::Error> {
        let status = parse_proposal_status(&row.status)?;
        let team: Vec<ProposedAgentSlot> = serde_json::from_str(&row.team)?;

        Ok(Proposal {
            id: super::parse_uuid(&row.id)?,
            workspace_id: super::parse_uuid(&row.workspace_id)?,
            goal_text: row.goal_text,
            feedback: row.feedback,
            team,
            estimated_cost: row.estimated_cost,
            status,
            created_at: super::parse_datetime(&row.created_at)?,
            updated_at: super::parse_datetime(&row.updated_at)?,
        })
    }
}

fn parse_proposal_status(s: &str) -> DomainResult<ProposalStatus> {
    match s {
        "pending" => Ok(ProposalStatus::Pending),
        "approved" => Ok(ProposalStatus::Approved),
        "rejected" => Ok(ProposalStatus::Rejected),
        other => Err(DomainError::Serialization(format!("invalid proposal status: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use crate::adapters::sqlite::workspace_repository::SqliteWorkspaceRepository;
    use crate::domain::models::{Seniority, Workspace};
    use crate::domain::ports::WorkspaceRepository;

    #[tokio::test]
    async fn create_then_approve_round_trips() {
        let pool = create_migrated_test_pool().await.unwrap();
        let workspaces = SqliteWorkspaceRepository::new(pool.clone());
        let proposals = SqliteProposalRepository::new(pool);

        let workspace = Workspace::new("Outreach", "100 leads");
        workspaces.create(&workspace).await.unwrap();

        let team = vec![ProposedAgentSlot { role: "writer".into(), seniority: Seniority::Senior, skills: vec!["copy".into()] }];
        let mut proposal = Proposal::new(workspace.id, "write outreach copy", None, team);
        proposals.create(&proposal).await.unwrap();

        proposal.transition_to(ProposalStatus::Approved).unwrap();
        proposals.update(&proposal).await.unwrap();

        let fetched = proposals.get(proposal.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, ProposalStatus::Approved);
        assert_eq!(fetched.team.len(), 1);
    }
}
