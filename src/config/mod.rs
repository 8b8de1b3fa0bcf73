//! Layered configuration for the orchestration engine.
//!
//! Every knob externalized in SPEC_FULL §6 lives on [`OrchestratorConfig`].
//! Defaults are programmatic, overridden by `orchestrator.yaml`, then
//! `orchestrator.local.yaml`, then `AUTONOMON_*` environment variables —
//! the same hierarchical-merge order the teacher's `ConfigLoader` uses.

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to extract configuration: {0}")]
    Extract(#[from] figment::Error),

    #[error("invalid global_concurrency: {0}. must be at least max_concurrent_tasks_per_workspace")]
    InvalidGlobalConcurrency(u32),

    #[error("invalid degraded_concurrency: {0}. must be less than or equal to max_concurrent_tasks_per_workspace")]
    InvalidDegradedConcurrency(u32),

    #[error("invalid task_timeout_ms: {0}. must be positive")]
    InvalidTaskTimeout(u64),

    #[error("invalid recovery delay bounds: base ({0}) must be less than cap ({1})")]
    InvalidRecoveryDelayBounds(u64, u64),

    #[error("invalid recovery confidence threshold: {0}. must be within [0, 1]")]
    InvalidRecoveryConfidenceThreshold(f64),

    #[error("database path cannot be empty")]
    EmptyDatabasePath,

    #[error("invalid log level: {0}. must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub recovery: RecoveryConfig,
    #[serde(default)]
    pub deliverable: DeliverableConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub content_transformer: ContentTransformerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            concurrency: ConcurrencyConfig::default(),
            execution: ExecutionConfig::default(),
            recovery: RecoveryConfig::default(),
            deliverable: DeliverableConfig::default(),
            memory: MemoryConfig::default(),
            content_transformer: ContentTransformerConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            rate_limit: RateLimitConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ConcurrencyConfig {
    #[serde(default = "default_max_concurrent_tasks_per_workspace")]
    pub max_concurrent_tasks_per_workspace: u32,
    #[serde(default = "default_degraded_concurrency")]
    pub degraded_concurrency: u32,
    #[serde(default = "default_global_concurrency")]
    pub global_concurrency: u32,
    #[serde(default = "default_queue_backpressure_ceiling")]
    pub queue_backpressure_ceiling: u32,
}

const fn default_max_concurrent_tasks_per_workspace() -> u32 {
    4
}
const fn default_degraded_concurrency() -> u32 {
    2
}
const fn default_global_concurrency() -> u32 {
    32
}
const fn default_queue_backpressure_ceiling() -> u32 {
    200
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks_per_workspace: default_max_concurrent_tasks_per_workspace(),
            degraded_concurrency: default_degraded_concurrency(),
            global_concurrency: default_global_concurrency(),
            queue_backpressure_ceiling: default_queue_backpressure_ceiling(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExecutionConfig {
    #[serde(default = "default_task_timeout_ms")]
    pub task_timeout_ms: u64,
    #[serde(default = "default_tool_timeout_ms")]
    pub tool_timeout_ms: u64,
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
    #[serde(default = "default_circuit_breaker_failure_threshold")]
    pub circuit_breaker_failure_threshold: u32,
    #[serde(default = "default_circuit_breaker_window_secs")]
    pub circuit_breaker_window_secs: u64,
    #[serde(default = "default_circuit_breaker_half_open_after_secs")]
    pub circuit_breaker_half_open_after_secs: u64,
}

const fn default_task_timeout_ms() -> u64 {
    180_000
}
const fn default_tool_timeout_ms() -> u64 {
    30_000
}
const fn default_max_tool_rounds() -> u32 {
    8
}
const fn default_max_output_bytes() -> usize {
    64 * 1024
}
const fn default_circuit_breaker_failure_threshold() -> u32 {
    5
}
const fn default_circuit_breaker_window_secs() -> u64 {
    60
}
const fn default_circuit_breaker_half_open_after_secs() -> u64 {
    30
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            task_timeout_ms: default_task_timeout_ms(),
            tool_timeout_ms: default_tool_timeout_ms(),
            max_tool_rounds: default_max_tool_rounds(),
            max_output_bytes: default_max_output_bytes(),
            circuit_breaker_failure_threshold: default_circuit_breaker_failure_threshold(),
            circuit_breaker_window_secs: default_circuit_breaker_window_secs(),
            circuit_breaker_half_open_after_secs: default_circuit_breaker_half_open_after_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RecoveryConfig {
    #[serde(default = "default_max_auto_recovery_attempts")]
    pub max_auto_recovery_attempts: u32,
    #[serde(default = "default_recovery_delay_base_seconds")]
    pub recovery_delay_base_seconds: u64,
    #[serde(default = "default_recovery_delay_cap_seconds")]
    pub recovery_delay_cap_seconds: u64,
    #[serde(default = "default_recovery_confidence_threshold")]
    pub recovery_confidence_threshold: f64,
}

const fn default_max_auto_recovery_attempts() -> u32 {
    5
}
const fn default_recovery_delay_base_seconds() -> u64 {
    30
}
const fn default_recovery_delay_cap_seconds() -> u64 {
    600
}
const fn default_recovery_confidence_threshold() -> f64 {
    0.7
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_auto_recovery_attempts: default_max_auto_recovery_attempts(),
            recovery_delay_base_seconds: default_recovery_delay_base_seconds(),
            recovery_delay_cap_seconds: default_recovery_delay_cap_seconds(),
            recovery_confidence_threshold: default_recovery_confidence_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DeliverableConfig {
    #[serde(default = "default_readiness_threshold")]
    pub readiness_threshold: f64,
    #[serde(default = "default_min_completed_tasks")]
    pub min_completed_tasks_for_deliverable: u32,
}

const fn default_readiness_threshold() -> f64 {
    100.0
}
const fn default_min_completed_tasks() -> u32 {
    2
}

impl Default for DeliverableConfig {
    fn default() -> Self {
        Self { readiness_threshold: default_readiness_threshold(), min_completed_tasks_for_deliverable: default_min_completed_tasks() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MemoryConfig {
    #[serde(default = "default_max_insights_per_workspace")]
    pub max_insights_per_workspace: usize,
}

const fn default_max_insights_per_workspace() -> usize {
    100
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self { max_insights_per_workspace: default_max_insights_per_workspace() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ContentTransformerConfig {
    #[serde(default = "default_content_transformation_timeout_ms")]
    pub transformation_timeout_ms: u64,
    #[serde(default)]
    pub cache_ttl_seconds: Option<u64>,
}

const fn default_content_transformation_timeout_ms() -> u64 {
    30_000
}

impl Default for ContentTransformerConfig {
    fn default() -> Self {
        Self { transformation_timeout_ms: default_content_transformation_timeout_ms(), cache_ttl_seconds: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".autonomon/autonomon.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: default_database_path(), max_connections: default_max_connections() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Directory for a daily-rolling log file, in addition to stdout. `None`
    /// disables file logging.
    #[serde(default)]
    pub file_directory: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), format: default_log_format(), file_directory: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RateLimitConfig {
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: f64,
    #[serde(default = "default_burst_size")]
    pub burst_size: u32,
}

const fn default_requests_per_second() -> f64 {
    10.0
}
const fn default_burst_size() -> u32 {
    20
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { requests_per_second: default_requests_per_second(), burst_size: default_burst_size() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LlmConfig {
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_llm_max_retries")]
    pub max_retries: u32,
}

fn default_llm_endpoint() -> String {
    "http://localhost:8080/v1/complete".to_string()
}

fn default_llm_model() -> String {
    "default".to_string()
}

const fn default_llm_timeout_secs() -> u64 {
    120
}
const fn default_llm_max_retries() -> u32 {
    3
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
            timeout_secs: default_llm_timeout_secs(),
            max_retries: default_llm_max_retries(),
        }
    }
}

/// Hierarchical configuration loader: defaults, project file, local
/// overrides, environment — each layer wins over the last.
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load() -> Result<OrchestratorConfig, ConfigError> {
        let config: OrchestratorConfig = Figment::new()
            .merge(Serialized::defaults(OrchestratorConfig::default()))
            .merge(Yaml::file(".autonomon/orchestrator.yaml"))
            .merge(Yaml::file(".autonomon/local.yaml"))
            .merge(Env::prefixed("AUTONOMON_").split("__"))
            .extract()?;

        Self::validate(&config)?;
        Ok(config)
    }

    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<OrchestratorConfig, ConfigError> {
        let config: OrchestratorConfig =
            Figment::new().merge(Serialized::defaults(OrchestratorConfig::default())).merge(Yaml::file(path.as_ref())).extract()?;

        Self::validate(&config)?;
        Ok(config)
    }

    pub fn validate(config: &OrchestratorConfig) -> Result<(), ConfigError> {
        if config.concurrency.global_concurrency < config.concurrency.max_concurrent_tasks_per_workspace {
            return Err(ConfigError::InvalidGlobalConcurrency(config.concurrency.global_concurrency));
        }
        if config.concurrency.degraded_concurrency > config.concurrency.max_concurrent_tasks_per_workspace {
            return Err(ConfigError::InvalidDegradedConcurrency(config.concurrency.degraded_concurrency));
        }
        if config.execution.task_timeout_ms == 0 {
            return Err(ConfigError::InvalidTaskTimeout(config.execution.task_timeout_ms));
        }
        if config.recovery.recovery_delay_base_seconds >= config.recovery.recovery_delay_cap_seconds {
            return Err(ConfigError::InvalidRecoveryDelayBounds(
                config.recovery.recovery_delay_base_seconds,
                config.recovery.recovery_delay_cap_seconds,
            ));
        }
        if !(0.0..=1.0).contains(&config.recovery.recovery_confidence_threshold) {
            return Err(ConfigError::InvalidRecoveryConfidenceThreshold(config.recovery.recovery_confidence_threshold));
        }
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = OrchestratorConfig::default();
        ConfigLoader::validate(&config).expect("default config should validate");
    }

    #[test]
    fn rejects_degraded_concurrency_above_workspace_ceiling() {
        let mut config = OrchestratorConfig::default();
        config.concurrency.degraded_concurrency = config.concurrency.max_concurrent_tasks_per_workspace + 1;
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidDegradedConcurrency(_))));
    }

    #[test]
    fn rejects_recovery_delay_base_at_or_above_cap() {
        let mut config = OrchestratorConfig::default();
        config.recovery.recovery_delay_base_seconds = config.recovery.recovery_delay_cap_seconds;
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidRecoveryDelayBounds(_, _))));
    }

    #[test]
    fn rejects_invalid_log_level() {
        let mut config = OrchestratorConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidLogLevel(_))));
    }

    #[test]
    fn yaml_overrides_merge_over_defaults() {
        let yaml = r"
concurrency:
  max_concurrent_tasks_per_workspace: 8
logging:
  level: debug
";
        let config: OrchestratorConfig = serde_yaml::from_str(yaml).expect("yaml should parse");
        assert_eq!(config.concurrency.max_concurrent_tasks_per_workspace, 8);
        assert_eq!(config.logging.level, "debug");
        ConfigLoader::validate(&config).expect("parsed config should validate");
    }
}
