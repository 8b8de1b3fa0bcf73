//! Binary entry point: load configuration, open the database, wire the
//! concrete adapters into the orchestrator and supervisor, then dispatch one
//! CLI command.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use autonomon::adapters::llm::MockLlmCapability;
use autonomon::adapters::sqlite::{
    initialize_database, SqliteAgentRepository, SqliteDeliverableRepository, SqliteGoalRepository,
    SqliteInsightRepository, SqliteProposalRepository, SqliteRecoveryRepository, SqliteTaskRepository,
    SqliteWorkspaceRepository,
};
use autonomon::cli::{App, Cli};
use autonomon::config::{ConfigError, ConfigLoader, OrchestratorConfig};
use autonomon::services::{AgentPool, ContentTransformer, DeliverableAggregator, MemoryStore, Orchestrator, RecoveryEngine, TaskExecutor, TaskQueue, WorkspaceRateLimiter, WorkspaceSupervisor};
use autonomon::services::workspace_supervisor::SupervisorConfig;

/// Installs the global tracing subscriber. Returns the file appender's
/// [`tracing_appender::non_blocking::WorkerGuard`] when file logging is
/// configured — the caller must hold it for the process lifetime, since
/// dropping it stops the background flush thread.
fn init_tracing(config: &OrchestratorConfig) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let level: tracing::Level = config.logging.level.parse().context("invalid log level")?;
    let stdout_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let stdout_layer = if config.logging.format == "json" {
        tracing_subscriber::fmt::layer().json().with_filter(stdout_filter).boxed()
    } else {
        tracing_subscriber::fmt::layer().pretty().with_filter(stdout_filter).boxed()
    };

    let (file_layer, guard) = match &config.logging.file_directory {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "autonomon.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let file_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();
            let layer = tracing_subscriber::fmt::layer().json().with_writer(non_blocking).with_filter(file_filter).boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;
    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match ConfigLoader::load() {
        Ok(config) => config,
        Err(ConfigError::Extract(_)) => OrchestratorConfig::default(),
        Err(other) => return Err(other.into()),
    };
    let _log_guard = init_tracing(&config)?;

    let pool = initialize_database(&config.database.path).await.context("failed to open orchestration database")?;

    let workspaces = Arc::new(SqliteWorkspaceRepository::new(pool.clone()));
    let goals = Arc::new(SqliteGoalRepository::new(pool.clone()));
    let tasks = Arc::new(SqliteTaskRepository::new(pool.clone()));
    let agents = Arc::new(SqliteAgentRepository::new(pool.clone()));
    let deliverables = Arc::new(SqliteDeliverableRepository::new(pool.clone()));
    let insights = Arc::new(SqliteInsightRepository::new(pool.clone()));
    let recoveries = Arc::new(SqliteRecoveryRepository::new(pool.clone()));
    let proposals = Arc::new(SqliteProposalRepository::new(pool.clone()));
    let llm = Arc::new(MockLlmCapability::new());

    let memory = MemoryStore::new(insights.clone())
        .with_capacity(config.memory.max_insights_per_workspace, chrono::Duration::hours(24));
    let recovery_engine = Arc::new(RecoveryEngine::new(recoveries.clone()).with_limits(
        config.recovery.max_auto_recovery_attempts,
        config.recovery.recovery_delay_base_seconds as i64,
        config.recovery.recovery_delay_cap_seconds as i64,
    ));

    let orchestrator = Orchestrator::new(
        workspaces.clone(),
        goals.clone(),
        tasks.clone(),
        agents.clone(),
        deliverables.clone(),
        memory,
        recovery_engine.clone(),
        proposals.clone(),
    );

    let task_queue = Arc::new(TaskQueue::new(tasks.clone(), goals.clone()));
    let agent_pool = Arc::new(AgentPool::new(agents.clone()));
    let circuit_breaker = Arc::new(autonomon::services::circuit_breaker::ToolCircuitBreaker::new(
        autonomon::services::circuit_breaker::CircuitBreakerConfig {
            failure_threshold: config.execution.circuit_breaker_failure_threshold,
            open_timeout: chrono::Duration::seconds(config.execution.circuit_breaker_half_open_after_secs as i64),
            success_threshold: 1,
            failure_window: chrono::Duration::seconds(config.execution.circuit_breaker_window_secs as i64),
        },
    ));
    let rate_limiter = Arc::new(WorkspaceRateLimiter::from_rate(config.rate_limit.requests_per_second, config.rate_limit.burst_size));
    let executor = Arc::new(TaskExecutor::new(llm.clone(), Vec::new(), circuit_breaker).with_rate_limiter(rate_limiter));
    let aggregator = Arc::new(DeliverableAggregator::new(deliverables.clone(), ContentTransformer::new_rule_based()));
    let memory_for_supervisor = Arc::new(MemoryStore::new(insights.clone()));

    let supervisor = WorkspaceSupervisor::new(
        workspaces,
        goals,
        task_queue,
        agent_pool,
        executor,
        recovery_engine,
        aggregator,
        memory_for_supervisor,
    )
    .with_config(SupervisorConfig {
        active_concurrency: config.concurrency.max_concurrent_tasks_per_workspace as usize,
        degraded_concurrency: config.concurrency.degraded_concurrency as usize,
        ..SupervisorConfig::default()
    });

    let app = App { orchestrator, supervisor };
    app.dispatch(cli.command).await
}
