//! LLM capability adapters.

pub mod http;
pub mod mock;

pub use http::{HttpLlmCapability, HttpLlmConfig};
pub use mock::{MockLlmCapability, MockResponse};
