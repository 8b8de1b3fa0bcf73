//! Task Executor.
//!
//! `execute(task, agent) -> TaskResult | ExecutionError`. Assembles a prompt
//! from task description, relevant insights, and goal context; invokes the
//! LLM capability; dispatches any tool calls serially, each under its own
//! sub-timeout and circuit breaker; captures the final structured output.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use serde::{Deserialize, Serialize};
use tokio::time::timeout;

use uuid::Uuid;

use crate::domain::models::{Agent, ExecutionError, FailureKind, Insight, TaskOutput, TaskResult, ToolCallRecord};
use crate::domain::ports::{LlmCapability, LlmRequest, Tool};
use crate::services::circuit_breaker::ToolCircuitBreaker;
use crate::services::rate_limiter::WorkspaceRateLimiter;

pub const DEFAULT_TASK_TIMEOUT_MS: u64 = 180_000;
pub const DEFAULT_TOOL_TIMEOUT_MS: u64 = 30_000;
pub const MAX_TOOL_ROUNDS: u32 = 8;
pub const MAX_OUTPUT_BYTES: usize = 64 * 1024;

/// A single turn of model output, parsed from the raw completion text. The
/// model is expected to emit one of these as its entire response per round.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ModelTurn {
    ToolCall { tool: String, input: serde_json::Value },
    Final { summary: String, output: TaskOutput, goal_contribution: f64 },
}

pub struct TaskExecutor<L: LlmCapability> {
    llm: Arc<L>,
    tools: HashMap<String, Arc<dyn Tool>>,
    circuit_breaker: Arc<ToolCircuitBreaker>,
    rate_limiter: Option<Arc<WorkspaceRateLimiter>>,
    task_timeout_ms: u64,
    tool_timeout_ms: u64,
}

impl<L: LlmCapability> TaskExecutor<L> {
    pub fn new(llm: Arc<L>, tools: Vec<Arc<dyn Tool>>, circuit_breaker: Arc<ToolCircuitBreaker>) -> Self {
        let tools = tools.into_iter().map(|t| (t.name().to_string(), t)).collect();
        Self {
            llm,
            tools,
            circuit_breaker,
            rate_limiter: None,
            task_timeout_ms: DEFAULT_TASK_TIMEOUT_MS,
            tool_timeout_ms: DEFAULT_TOOL_TIMEOUT_MS,
        }
    }

    pub fn with_timeouts(mut self, task_timeout_ms: u64, tool_timeout_ms: u64) -> Self {
        self.task_timeout_ms = task_timeout_ms;
        self.tool_timeout_ms = tool_timeout_ms;
        self
    }

    /// Caps the LLM calls this executor issues on behalf of one workspace,
    /// so one workspace's burst can't starve another's share of the provider.
    pub fn with_rate_limiter(mut self, rate_limiter: Arc<WorkspaceRateLimiter>) -> Self {
        self.rate_limiter = Some(rate_limiter);
        self
    }

    fn assemble_prompt(
        task_name: &str,
        task_description: &str,
        goal_description: &str,
        insights: &[Insight],
        prior_trace: &[ToolCallRecord],
    ) -> String {
        let mut prompt = format!("Task: {task_name}\nDescription: {task_description}\nGoal: {goal_description}\n");
        if !insights.is_empty() {
            prompt.push_str("Relevant insights:\n");
            for insight in insights {
                prompt.push_str(&format!("- {}\n", insight.summary));
            }
        }
        if !prior_trace.is_empty() {
            prompt.push_str(&format!("Tool calls so far this task: {}\n", prior_trace.len()));
        }
        prompt
    }

    /// Run the task to completion or failure.
    pub async fn execute(
        &self,
        workspace_id: Uuid,
        task_name: &str,
        task_description: &str,
        goal_description: &str,
        _agent: &Agent,
        insights: &[Insight],
    ) -> Result<TaskResult, ExecutionError> {
        let run = self.run_rounds(workspace_id, task_name, task_description, goal_description, insights);
        match timeout(StdDuration::from_millis(self.task_timeout_ms), run).await {
            Ok(result) => result,
            Err(_) => Err(ExecutionError::new(FailureKind::Timeout, format!("task exceeded {}ms", self.task_timeout_ms))),
        }
    }

    async fn run_rounds(
        &self,
        workspace_id: Uuid,
        task_name: &str,
        task_description: &str,
        goal_description: &str,
        insights: &[Insight],
    ) -> Result<TaskResult, ExecutionError> {
        let started = std::time::Instant::now();
        let mut trace: Vec<ToolCallRecord> = Vec::new();

        for _round in 0..MAX_TOOL_ROUNDS {
            let prompt = Self::assemble_prompt(task_name, task_description, goal_description, insights, &trace);
            let request = LlmRequest::new(prompt);
            if let Some(limiter) = &self.rate_limiter {
                limiter.acquire(workspace_id).await;
            }
            let response = self.llm.complete(request).await.map_err(|e| {
                ExecutionError::new(FailureKind::LlmRefusal, e.to_string()).with_partial_output(
                    trace.iter().map(|t| t.tool_name.clone()).collect::<Vec<_>>().join(","),
                )
            })?;

            if response.text.len() > MAX_OUTPUT_BYTES {
                return Err(ExecutionError::new(FailureKind::ContextOverflow, "model output exceeded 64KB cap"));
            }

            let turn: ModelTurn = serde_json::from_str(&response.text)
                .map_err(|e| ExecutionError::new(FailureKind::ParseError, e.to_string()))?;

            match turn {
                ModelTurn::Final { summary, output, goal_contribution } => {
                    return Ok(TaskResult {
                        summary,
                        output,
                        tool_trace: trace,
                        execution_time_ms: started.elapsed().as_millis() as u64,
                        agent_metadata: serde_json::json!({ "tokens_used": response.tokens_used }),
                        goal_contribution,
                    });
                }
                ModelTurn::ToolCall { tool, input } => {
                    let record = self.invoke_tool(&tool, input).await?;
                    trace.push(record);
                }
            }
        }

        Err(ExecutionError::new(FailureKind::Unknown, format!("exceeded {MAX_TOOL_ROUNDS} tool-call rounds")))
    }

    async fn invoke_tool(&self, tool_name: &str, input: serde_json::Value) -> Result<ToolCallRecord, ExecutionError> {
        if !self.circuit_breaker.allows(tool_name).await {
            return Err(ExecutionError::new(FailureKind::ToolFailure, format!("circuit open for tool '{tool_name}'")));
        }

        let tool = self
            .tools
            .get(tool_name)
            .ok_or_else(|| ExecutionError::new(FailureKind::ToolFailure, format!("unknown tool '{tool_name}'")))?;

        let started = std::time::Instant::now();
        let result = timeout(StdDuration::from_millis(self.tool_timeout_ms), tool.invoke(input.clone())).await;

        match result {
            Ok(Ok(output)) => {
                self.circuit_breaker.record_success(tool_name).await;
                Ok(ToolCallRecord {
                    tool_name: tool_name.to_string(),
                    input,
                    output: Some(output),
                    succeeded: true,
                    duration_ms: started.elapsed().as_millis() as u64,
                })
            }
            Ok(Err(err)) => {
                self.circuit_breaker.record_failure(tool_name).await;
                Err(ExecutionError::new(FailureKind::ToolFailure, err.to_string()))
            }
            Err(_) => {
                self.circuit_breaker.record_failure(tool_name).await;
                Err(ExecutionError::new(FailureKind::Timeout, format!("tool '{tool_name}' exceeded {}ms", self.tool_timeout_ms)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::LlmError;
    use crate::domain::models::Seniority;
    use crate::domain::ports::LlmResponse;
    use async_trait::async_trait;
    use uuid::Uuid;

    struct ScriptedLlm {
        responses: tokio::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmCapability for ScriptedLlm {
        async fn complete(&self, _request: LlmRequest) -> Result<LlmResponse, LlmError> {
            let mut responses = self.responses.lock().await;
            let text = responses.remove(0);
            Ok(LlmResponse { text, tokens_used: 10, latency_ms: 1 })
        }
    }

    fn final_turn(summary: &str) -> String {
        serde_json::json!({
            "type": "final",
            "summary": summary,
            "output": { "kind": "document", "markdown": "# done" },
            "goal_contribution": 1.0,
        })
        .to_string()
    }

    #[tokio::test]
    async fn single_round_completes_successfully() {
        let llm = Arc::new(ScriptedLlm { responses: tokio::sync::Mutex::new(vec![final_turn("ok")]) });
        let executor = TaskExecutor::new(llm, vec![], Arc::new(ToolCircuitBreaker::new(Default::default())));
        let agent = Agent::new(Uuid::new_v4(), "a", "writer", Seniority::Senior);
        let result = executor.execute(Uuid::new_v4(), "t", "d", "goal", &agent, &[]).await.unwrap();
        assert_eq!(result.summary, "ok");
    }

    #[tokio::test]
    async fn unparseable_response_is_parse_error() {
        let llm = Arc::new(ScriptedLlm { responses: tokio::sync::Mutex::new(vec!["not json".to_string()]) });
        let executor = TaskExecutor::new(llm, vec![], Arc::new(ToolCircuitBreaker::new(Default::default())));
        let agent = Agent::new(Uuid::new_v4(), "a", "writer", Seniority::Senior);
        let err = executor.execute(Uuid::new_v4(), "t", "d", "goal", &agent, &[]).await.unwrap_err();
        assert_eq!(err.kind, FailureKind::ParseError);
    }

    #[tokio::test]
    async fn oversized_output_is_context_overflow() {
        let huge = "x".repeat(MAX_OUTPUT_BYTES + 1);
        let llm = Arc::new(ScriptedLlm { responses: tokio::sync::Mutex::new(vec![huge]) });
        let executor = TaskExecutor::new(llm, vec![], Arc::new(ToolCircuitBreaker::new(Default::default())));
        let agent = Agent::new(Uuid::new_v4(), "a", "writer", Seniority::Senior);
        let err = executor.execute(Uuid::new_v4(), "t", "d", "goal", &agent, &[]).await.unwrap_err();
        assert_eq!(err.kind, FailureKind::ContextOverflow);
    }
}
