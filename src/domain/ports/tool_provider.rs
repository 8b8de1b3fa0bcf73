//! Tool dispatch contract.
//!
//! Only the dispatch contract is specified; concrete tools (web search, file
//! search, etc.) are external collaborators plugged in by the embedder.

use async_trait::async_trait;

use crate::domain::errors::ToolError;

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    async fn invoke(&self, input: serde_json::Value) -> Result<serde_json::Value, ToolError>;
}
