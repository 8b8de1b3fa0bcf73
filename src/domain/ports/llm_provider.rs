//! LLM capability port (SPEC_FULL §4.9).
//!
//! The orchestration core treats language-model access as a pluggable
//! capability, never a concrete vendor SDK. `HttpLlmCapability` in
//! `adapters::llm` talks to any provider exposing a generic completion
//! endpoint; `MockLlmCapability` backs tests and the content-transformer's
//! rule-based fallback path.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::LlmError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub metadata: serde_json::Value,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self { prompt: prompt.into(), max_tokens: 1024, temperature: 0.2, metadata: serde_json::json!({}) }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    pub tokens_used: u32,
    pub latency_ms: u64,
}

#[async_trait]
pub trait LlmCapability: Send + Sync {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, LlmError>;
}
