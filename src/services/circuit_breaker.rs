//! Per-tool circuit breaker.
//!
//! Opens after 5 consecutive failures within a 60 s window; half-open probes
//! resume after 30 s (SPEC §4.4). Scoped by tool name so one failing tool
//! cannot block others within the same task.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub open_timeout: Duration,
    pub success_threshold: u32,
    pub failure_window: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::seconds(30),
            success_threshold: 1,
            failure_window: Duration::seconds(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

struct Circuit {
    state: CircuitState,
    failure_times: Vec<DateTime<Utc>>,
    half_open_successes: u32,
    opened_at: Option<DateTime<Utc>>,
}

impl Circuit {
    fn new() -> Self {
        Self { state: CircuitState::Closed, failure_times: Vec::new(), half_open_successes: 0, opened_at: None }
    }

    fn record_failure(&mut self, config: &CircuitBreakerConfig) {
        let now = Utc::now();
        self.failure_times.push(now);
        let cutoff = now - config.failure_window;
        self.failure_times.retain(|t| *t > cutoff);

        if self.state != CircuitState::Open && self.failure_times.len() as u32 >= config.failure_threshold {
            self.state = CircuitState::Open;
            self.opened_at = Some(now);
            self.half_open_successes = 0;
        } else if self.state == CircuitState::HalfOpen {
            self.state = CircuitState::Open;
            self.opened_at = Some(now);
            self.half_open_successes = 0;
        }
    }

    fn record_success(&mut self, config: &CircuitBreakerConfig) {
        if self.state == CircuitState::HalfOpen {
            self.half_open_successes += 1;
            if self.half_open_successes >= config.success_threshold {
                self.state = CircuitState::Closed;
                self.opened_at = None;
                self.failure_times.clear();
            }
        }
    }

    fn allows(&mut self, config: &CircuitBreakerConfig) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let opened_at = self.opened_at.unwrap_or_else(Utc::now);
                if Utc::now() > opened_at + config.open_timeout {
                    self.state = CircuitState::HalfOpen;
                    self.half_open_successes = 0;
                    true
                } else {
                    false
                }
            }
        }
    }
}

/// Tracks one circuit per tool name.
pub struct ToolCircuitBreaker {
    config: CircuitBreakerConfig,
    circuits: RwLock<HashMap<String, Circuit>>,
}

impl ToolCircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self { config, circuits: RwLock::new(HashMap::new()) }
    }

    pub async fn allows(&self, tool_name: &str) -> bool {
        let mut circuits = self.circuits.write().await;
        circuits.entry(tool_name.to_string()).or_insert_with(Circuit::new).allows(&self.config)
    }

    pub async fn record_failure(&self, tool_name: &str) {
        let mut circuits = self.circuits.write().await;
        circuits.entry(tool_name.to_string()).or_insert_with(Circuit::new).record_failure(&self.config);
    }

    pub async fn record_success(&self, tool_name: &str) {
        let mut circuits = self.circuits.write().await;
        if let Some(circuit) = circuits.get_mut(tool_name) {
            circuit.record_success(&self.config);
        }
    }

    pub async fn state(&self, tool_name: &str) -> CircuitState {
        let circuits = self.circuits.read().await;
        circuits.get(tool_name).map_or(CircuitState::Closed, |c| c.state)
    }
}

pub type SharedCircuitBreaker = Arc<ToolCircuitBreaker>;
