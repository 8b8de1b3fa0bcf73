use clap::Parser;
use uuid::Uuid;

use autonomon::cli::{Cli, Commands};

#[test]
fn help_causes_early_exit() {
    let result = Cli::try_parse_from(["autonomon", "--help"]);
    assert!(result.is_err());
}

#[test]
fn version_causes_early_exit() {
    let result = Cli::try_parse_from(["autonomon", "--version"]);
    assert!(result.is_err());
}

#[test]
fn create_workspace_parses_name_and_goal() {
    let cli = Cli::try_parse_from(["autonomon", "create-workspace", "Outreach", "--goal-text", "100 leads"]).unwrap();
    match cli.command {
        Commands::CreateWorkspace { name, goal_text } => {
            assert_eq!(name, "Outreach");
            assert_eq!(goal_text, "100 leads");
        }
        _ => panic!("expected CreateWorkspace"),
    }
}

#[test]
fn show_workspace_requires_a_uuid() {
    let result = Cli::try_parse_from(["autonomon", "show-workspace", "not-a-uuid"]);
    assert!(result.is_err());
}

#[test]
fn show_workspace_parses_valid_uuid() {
    let id = Uuid::new_v4();
    let cli = Cli::try_parse_from(["autonomon", "show-workspace", &id.to_string()]).unwrap();
    match cli.command {
        Commands::ShowWorkspace { id: parsed } => assert_eq!(parsed, id),
        _ => panic!("expected ShowWorkspace"),
    }
}

#[test]
fn approve_proposal_parses_optional_feedback() {
    let workspace_id = Uuid::new_v4();
    let proposal_id = Uuid::new_v4();
    let cli = Cli::try_parse_from([
        "autonomon",
        "approve-proposal",
        &workspace_id.to_string(),
        &proposal_id.to_string(),
        "--feedback",
        "looks good",
    ])
    .unwrap();

    match cli.command {
        Commands::ApproveProposal { workspace_id: w, proposal_id: p, feedback } => {
            assert_eq!(w, workspace_id);
            assert_eq!(p, proposal_id);
            assert_eq!(feedback.as_deref(), Some("looks good"));
        }
        _ => panic!("expected ApproveProposal"),
    }
}

#[test]
fn tick_requires_a_workspace_id() {
    let result = Cli::try_parse_from(["autonomon", "tick"]);
    assert!(result.is_err());
}
