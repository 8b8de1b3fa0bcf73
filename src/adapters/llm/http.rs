//! HTTP-backed LLM capability.
//!
//! Talks to any provider that exposes a generic completion endpoint taking a
//! prompt and returning generated text, rather than baking in a single
//! vendor's request schema. Retries transient failures with exponential
//! backoff via `backoff`, matching the retry shape used elsewhere in this
//! crate for tool calls.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoffBuilder;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};

use crate::domain::errors::LlmError;
use crate::domain::ports::llm_provider::{LlmCapability, LlmRequest, LlmResponse};

#[derive(Debug, Clone)]
pub struct HttpLlmConfig {
    /// Base URL of the completion endpoint, e.g. `https://api.example.com/v1/complete`.
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for HttpLlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080/v1/complete".to_string(),
            api_key: None,
            model: "default".to_string(),
            timeout_secs: 120,
            max_retries: 3,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
        }
    }
}

impl HttpLlmConfig {
    pub fn get_api_key(&self) -> Option<String> {
        self.api_key.clone().or_else(|| std::env::var("LLM_API_KEY").ok())
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    text: String,
    #[serde(default)]
    tokens_used: u32,
}

pub struct HttpLlmCapability {
    http_client: Client,
    config: HttpLlmConfig,
}

impl HttpLlmCapability {
    pub fn new(config: HttpLlmConfig) -> Result<Self, LlmError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        Ok(Self { http_client, config })
    }

    fn backoff_policy(&self) -> backoff::ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.config.initial_backoff_ms))
            .with_max_interval(Duration::from_millis(self.config.max_backoff_ms))
            .with_max_elapsed_time(Some(Duration::from_millis(
                self.config.max_backoff_ms * u64::from(self.config.max_retries + 1),
            )))
            .build()
    }

    async fn send_once(&self, request: &LlmRequest) -> Result<LlmResponse, backoff::Error<LlmError>> {
        let started = Instant::now();
        let body = CompletionRequest {
            model: &self.config.model,
            prompt: &request.prompt,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let mut builder = self.http_client.post(&self.config.endpoint).json(&body);
        if let Some(key) = self.config.get_api_key() {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {key}"));
        }

        let response = builder.send().await.map_err(|e| self.classify_transport_error(e))?;
        let status = response.status();

        if status.is_success() {
            let parsed: CompletionResponse = response.json().await.map_err(|e| {
                backoff::Error::permanent(LlmError::ParseError(e.to_string()))
            })?;
            return Ok(LlmResponse {
                text: parsed.text,
                tokens_used: parsed.tokens_used,
                latency_ms: started.elapsed().as_millis() as u64,
            });
        }

        let body_text = response.text().await.unwrap_or_default();
        if status.as_u16() == 429 {
            return Err(backoff::Error::transient(LlmError::QuotaExceeded));
        }
        if status.is_server_error() {
            return Err(backoff::Error::transient(LlmError::Transport(format!("{status}: {body_text}"))));
        }
        Err(backoff::Error::permanent(LlmError::Refusal(format!("{status}: {body_text}"))))
    }

    fn classify_transport_error(&self, error: reqwest::Error) -> backoff::Error<LlmError> {
        if error.is_timeout() || error.is_connect() {
            backoff::Error::transient(LlmError::Timeout(self.config.timeout_secs * 1_000))
        } else {
            backoff::Error::permanent(LlmError::Transport(error.to_string()))
        }
    }
}

#[async_trait]
impl LlmCapability for HttpLlmCapability {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        retry(self.backoff_policy(), || async { self.send_once(&request).await }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_targets_a_generic_local_endpoint() {
        let config = HttpLlmConfig::default();
        assert!(config.endpoint.contains("/v1/complete"));
        assert_eq!(config.model, "default");
    }

    #[test]
    fn api_key_falls_back_to_environment_variable() {
        std::env::set_var("LLM_API_KEY", "test-key-123");
        let config = HttpLlmConfig::default();
        assert_eq!(config.get_api_key(), Some("test-key-123".to_string()));
        std::env::remove_var("LLM_API_KEY");
    }
}
