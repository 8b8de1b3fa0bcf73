//! Command-line interface: one subcommand per `SPEC_FULL` §6 API operation,
//! plus a `tick` command that drives a single supervisor cycle directly
//! (useful for local development without a running background loop).

use clap::{Parser, Subcommand};
use comfy_table::{presets, Table};
use uuid::Uuid;

use crate::domain::ports::{
    AgentRepository, DeliverableRepository, GoalRepository, InsightRepository, LlmCapability, ProposalRepository,
    RecoveryRepository, TaskFilter, TaskRepository, WorkspaceRepository,
};
use crate::services::{Orchestrator, WorkspaceSupervisor};

#[derive(Parser)]
#[command(name = "autonomon")]
#[command(about = "Autonomous multi-agent task orchestration core", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new workspace
    CreateWorkspace {
        name: String,
        #[arg(long)]
        goal_text: String,
    },
    /// Show a workspace's current snapshot
    ShowWorkspace { id: Uuid },
    /// Submit a staffing proposal for a workspace's goal
    SubmitProposal {
        workspace_id: Uuid,
        goal_text: String,
        #[arg(long)]
        feedback: Option<String>,
    },
    /// Approve a previously submitted proposal
    ApproveProposal {
        workspace_id: Uuid,
        proposal_id: Uuid,
        #[arg(long)]
        feedback: Option<String>,
    },
    /// List a workspace's goals
    ListGoals { workspace_id: Uuid },
    /// List a workspace's tasks
    ListTasks { workspace_id: Uuid },
    /// List a workspace's deliverables
    ListDeliverables { workspace_id: Uuid },
    /// List a workspace's recorded insights
    ListInsights {
        workspace_id: Uuid,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        min_confidence: Option<f64>,
    },
    /// Force a recovery sweep over a workspace's failed tasks
    TriggerRecovery { workspace_id: Uuid },
    /// Run one supervisor tick for a workspace
    Tick { workspace_id: Uuid },
}

/// Holds a ready-to-dispatch orchestrator and supervisor pair. Built once in
/// `main` from the concrete SQLite/LLM adapters, then handed every parsed
/// command.
pub struct App<W, G, T, A, D, I, R, P, L>
where
    W: WorkspaceRepository,
    G: GoalRepository,
    T: TaskRepository,
    A: AgentRepository,
    D: DeliverableRepository,
    I: InsightRepository,
    R: RecoveryRepository,
    P: ProposalRepository,
    L: LlmCapability,
{
    pub orchestrator: Orchestrator<W, G, T, A, D, I, R, P>,
    pub supervisor: WorkspaceSupervisor<W, G, T, A, D, I, R, L>,
}

impl<W, G, T, A, D, I, R, P, L> App<W, G, T, A, D, I, R, P, L>
where
    W: WorkspaceRepository,
    G: GoalRepository + 'static,
    T: TaskRepository + 'static,
    A: AgentRepository + 'static,
    D: DeliverableRepository + 'static,
    I: InsightRepository + 'static,
    R: RecoveryRepository + 'static,
    P: ProposalRepository,
    L: LlmCapability + 'static,
{
    pub async fn dispatch(&self, command: Commands) -> anyhow::Result<()> {
        match command {
            Commands::CreateWorkspace { name, goal_text } => {
                let workspace = self.orchestrator.create_workspace(&name, &goal_text).await?;
                println!("created workspace {} ({})", workspace.id, workspace.name);
            }
            Commands::ShowWorkspace { id } => {
                let workspace = self.orchestrator.get_workspace(id).await?;
                println!("{workspace:#?}");
            }
            Commands::SubmitProposal { workspace_id, goal_text, feedback } => {
                let proposal = self.orchestrator.submit_proposal(workspace_id, &goal_text, feedback).await?;
                println!(
                    "proposal {} staffed with {} role(s), estimated cost {:.1}",
                    proposal.id,
                    proposal.team.len(),
                    proposal.estimated_cost
                );
            }
            Commands::ApproveProposal { workspace_id, proposal_id, feedback } => {
                let outcome = self.orchestrator.approve_proposal(workspace_id, proposal_id, feedback).await?;
                let goal_ids = outcome.goals.iter().map(|g| g.id.to_string()).collect::<Vec<_>>().join(", ");
                println!(
                    "proposal {status} — {count} goal(s) created [{goal_ids}], estimated completion in {secs}s",
                    status = outcome.status,
                    count = outcome.goals.len(),
                    secs = outcome.estimated_completion_seconds
                );
            }
            Commands::ListGoals { workspace_id } => {
                let goals = self.orchestrator.list_goals(workspace_id).await?;
                let mut table = Table::new();
                table.load_preset(presets::NOTHING).set_header(vec!["ID", "DESCRIPTION", "STATUS", "PRIORITY", "PROGRESS"]);
                for goal in &goals {
                    table.add_row(vec![
                        goal.id.to_string(),
                        goal.description.clone(),
                        goal.status.as_str().to_string(),
                        goal.priority.as_str().to_string(),
                        format!("{:.1}/{:.1}", goal.current_value, goal.target_value),
                    ]);
                }
                println!("{table}");
            }
            Commands::ListTasks { workspace_id } => {
                let tasks = self.orchestrator.list_tasks(workspace_id, TaskFilter::default()).await?;
                let mut table = Table::new();
                table.load_preset(presets::NOTHING).set_header(vec!["ID", "NAME", "STATUS", "PRIORITY"]);
                for task in &tasks {
                    table.add_row(vec![
                        task.id.to_string(),
                        task.name.clone(),
                        task.status.as_str().to_string(),
                        task.priority.as_str().to_string(),
                    ]);
                }
                println!("{table}");
            }
            Commands::ListDeliverables { workspace_id } => {
                let deliverables = self.orchestrator.list_deliverables(workspace_id).await?;
                let mut table = Table::new();
                table.load_preset(presets::NOTHING).set_header(vec!["ID", "TITLE", "STATUS", "VALUE"]);
                for deliverable in &deliverables {
                    table.add_row(vec![
                        deliverable.id.to_string(),
                        deliverable.title.clone(),
                        deliverable.status.as_str().to_string(),
                        format!("{:.2}", deliverable.business_value_score),
                    ]);
                }
                println!("{table}");
            }
            Commands::ListInsights { workspace_id, category, min_confidence } => {
                let category = category.as_deref().and_then(crate::domain::models::InsightCategory::from_str);
                let insights = self.orchestrator.list_insights(workspace_id, category, min_confidence).await?;
                let mut table = Table::new();
                table.load_preset(presets::NOTHING).set_header(vec!["ID", "CATEGORY", "SUMMARY", "CONFIDENCE", "VALUE"]);
                for insight in &insights {
                    table.add_row(vec![
                        insight.id.to_string(),
                        insight.category.as_str().to_string(),
                        insight.summary.clone(),
                        format!("{:.2}", insight.confidence),
                        format!("{:.2}", insight.business_value),
                    ]);
                }
                println!("{table}");
            }
            Commands::TriggerRecovery { workspace_id } => {
                let summary = self.orchestrator.trigger_recovery(workspace_id).await?;
                println!("recovery sweep attempted {} task(s)", summary.attempts.len());
            }
            Commands::Tick { workspace_id } => {
                let report = self.supervisor.tick(workspace_id).await?;
                println!(
                    "tick: dispatched={} completed={} failed={} starved={} terminal={}",
                    report.dispatched, report.completed, report.failed, report.starved, report.workspace_terminal
                );
            }
        }
        Ok(())
    }
}
