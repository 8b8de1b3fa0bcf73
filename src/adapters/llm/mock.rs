//! Mock LLM capability for tests and the content transformer's fallback path.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::errors::LlmError;
use crate::domain::ports::llm_provider::{LlmCapability, LlmRequest, LlmResponse};

/// Canned response configuration for a single `complete` call.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub text: String,
    pub fail: bool,
    pub error: Option<LlmError>,
    pub tokens_used: u32,
    pub latency_ms: u64,
}

impl Default for MockResponse {
    fn default() -> Self {
        Self { text: "mock completion".to_string(), fail: false, error: None, tokens_used: 64, latency_ms: 5 }
    }
}

impl MockResponse {
    pub fn success(text: impl Into<String>) -> Self {
        Self { text: text.into(), ..Default::default() }
    }

    pub fn failure(error: LlmError) -> Self {
        Self { fail: true, error: Some(error), ..Default::default() }
    }
}

/// Mock `LlmCapability`. Keys overrides by a caller-chosen string (usually a
/// task id or prompt prefix) rather than a session id, since this port has no
/// session concept.
pub struct MockLlmCapability {
    default_response: MockResponse,
    overrides: Arc<RwLock<HashMap<String, MockResponse>>>,
}

impl MockLlmCapability {
    pub fn new() -> Self {
        Self { default_response: MockResponse::default(), overrides: Arc::new(RwLock::new(HashMap::new())) }
    }

    pub fn with_default_response(response: MockResponse) -> Self {
        Self { default_response: response, overrides: Arc::new(RwLock::new(HashMap::new())) }
    }

    pub async fn set_response_for_key(&self, key: impl Into<String>, response: MockResponse) {
        self.overrides.write().await.insert(key.into(), response);
    }

    async fn response_for(&self, key: Option<&str>) -> MockResponse {
        if let Some(key) = key {
            let overrides = self.overrides.read().await;
            if let Some(response) = overrides.get(key) {
                return response.clone();
            }
        }
        self.default_response.clone()
    }
}

impl Default for MockLlmCapability {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmCapability for MockLlmCapability {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let key = request.metadata.get("mock_key").and_then(|v| v.as_str());
        let response = self.response_for(key).await;

        if response.fail {
            return Err(response.error.unwrap_or(LlmError::Refusal("mock failure".to_string())));
        }

        Ok(LlmResponse { text: response.text, tokens_used: response.tokens_used, latency_ms: response.latency_ms })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_response_used_when_no_override_matches() {
        let mock = MockLlmCapability::with_default_response(MockResponse::success("fallback"));
        let response = mock.complete(LlmRequest::new("draft an email")).await.unwrap();
        assert_eq!(response.text, "fallback");
    }

    #[tokio::test]
    async fn override_is_keyed_by_mock_key_metadata() {
        let mock = MockLlmCapability::new();
        mock.set_response_for_key("task-1", MockResponse::success("specific answer")).await;

        let mut request = LlmRequest::new("draft an email");
        request.metadata = serde_json::json!({"mock_key": "task-1"});
        let response = mock.complete(request).await.unwrap();
        assert_eq!(response.text, "specific answer");
    }

    #[tokio::test]
    async fn failure_response_surfaces_configured_error() {
        let mock = MockLlmCapability::with_default_response(MockResponse::failure(LlmError::QuotaExceeded));
        let err = mock.complete(LlmRequest::new("draft an email")).await.unwrap_err();
        assert!(matches!(err, LlmError::QuotaExceeded));
    }
}
