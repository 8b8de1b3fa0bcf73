//! Content Transformer.
//!
//! `transform(content, business_context) -> {display_content, format, confidence,
//! processing_time_ms}`. Cacheable by construction: cache key is a SHA-256 of
//! `normalized(content) + business_context_fingerprint`. A cache hit returns
//! the persisted result and never invokes the LLM — this is the one
//! correctness property the whole component exists to uphold.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use crate::domain::models::{DisplayFormat, TransformationStatus};
use crate::domain::ports::{LlmCapability, LlmRequest};

#[derive(Debug, Clone)]
struct CacheEntry {
    display_content: String,
    format: DisplayFormat,
    confidence: f64,
}

#[derive(Debug, Clone)]
pub struct TransformOutcome {
    pub display_content: Option<String>,
    pub format: DisplayFormat,
    pub confidence: f64,
    pub status: TransformationStatus,
    pub processing_time_ms: u64,
    pub cache_hit: bool,
}

/// Computes the cache key: SHA-256 over normalized content JSON and the
/// business context fingerprint.
pub fn cache_key(content: &Value, business_context: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize(content).as_bytes());
    hasher.update(b"\0");
    hasher.update(normalize(business_context).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Canonical string form of a JSON value. `serde_json::Value::Object` is
/// backed by a `BTreeMap` by default, so field order is already stable;
/// this just pins down the contract so callers don't rely on incidental
/// serializer behavior.
fn normalize(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

fn is_empty_content(content: &Value) -> bool {
    match content {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(arr) => arr.is_empty(),
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Transforms structured execution-format content into a user-facing
/// rendering. When constructed without an LLM capability, falls back to
/// deterministic rule-based rendering only (`new_rule_based`); this is also
/// the path taken whenever the LLM call itself fails.
pub struct ContentTransformer {
    llm: Option<Arc<dyn LlmCapability>>,
    cache: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl ContentTransformer {
    pub fn new(llm: Arc<dyn LlmCapability>) -> Self {
        Self { llm: Some(llm), cache: Arc::new(RwLock::new(HashMap::new())) }
    }

    pub fn new_rule_based() -> Self {
        Self { llm: None, cache: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// Invalidates the cache entry for a given content/context pair — called
    /// when the underlying content is rewritten.
    pub async fn invalidate(&self, content: &Value, business_context: &Value) {
        self.cache.write().await.remove(&cache_key(content, business_context));
    }

    pub async fn transform(&self, content: &Value, business_context: &Value) -> TransformOutcome {
        let started = Instant::now();

        if is_empty_content(content) {
            return TransformOutcome {
                display_content: None,
                format: DisplayFormat::Markdown,
                confidence: 0.0,
                status: TransformationStatus::Skipped,
                processing_time_ms: started.elapsed().as_millis() as u64,
                cache_hit: false,
            };
        }

        let key = cache_key(content, business_context);
        if let Some(cached) = self.cache.read().await.get(&key).cloned() {
            return TransformOutcome {
                display_content: Some(cached.display_content),
                format: cached.format,
                confidence: cached.confidence,
                status: TransformationStatus::Success,
                processing_time_ms: started.elapsed().as_millis() as u64,
                cache_hit: true,
            };
        }

        let (display_content, format, confidence, status) = match &self.llm {
            Some(llm) => match self.render_with_llm(llm.as_ref(), content, business_context).await {
                Some((rendered, confidence)) => (rendered, DisplayFormat::Markdown, confidence, TransformationStatus::Success),
                None => (render_rule_based(content), DisplayFormat::Markdown, 0.4, TransformationStatus::Failed),
            },
            None => (render_rule_based(content), DisplayFormat::Markdown, 0.6, TransformationStatus::Success),
        };

        if status == TransformationStatus::Success {
            self.cache.write().await.insert(
                key,
                CacheEntry { display_content: display_content.clone(), format, confidence },
            );
        }

        TransformOutcome {
            display_content: if status == TransformationStatus::Failed { None } else { Some(display_content) },
            format,
            confidence,
            status,
            processing_time_ms: started.elapsed().as_millis() as u64,
            cache_hit: false,
        }
    }

    async fn render_with_llm(&self, llm: &dyn LlmCapability, content: &Value, business_context: &Value) -> Option<(String, f64)> {
        let prompt = format!(
            "Render this content for a business audience as markdown.\nContent: {content}\nContext: {business_context}"
        );
        let response = llm.complete(LlmRequest::new(prompt)).await.ok()?;
        Some((response.text, 0.85))
    }
}

/// Deterministic, no-LLM rendering used both as the sole path for a
/// rule-based transformer and as the failure fallback for an LLM-backed one.
fn render_rule_based(content: &Value) -> String {
    if let Some(records) = content.get("records").and_then(|v| v.as_array()) {
        return render_records_as_table(records);
    }
    if let Some(steps) = content.get("steps").and_then(|v| v.as_array()) {
        return render_steps_as_numbered_list(steps);
    }
    if let (Some(subject), Some(body)) = (content.get("subject").and_then(|v| v.as_str()), content.get("body").and_then(|v| v.as_str())) {
        return format!("# {subject}\n\n{body}\n");
    }
    if let Some(markdown) = content.get("markdown").and_then(|v| v.as_str()) {
        return markdown.to_string();
    }
    if let Some(entries) = content.get("entries").and_then(|v| v.as_array()) {
        return render_entries_fallback(entries);
    }
    format!("```json\n{}\n```\n", serde_json::to_string_pretty(content).unwrap_or_default())
}

fn render_records_as_table(records: &[Value]) -> String {
    if records.is_empty() {
        return "_no records_\n".to_string();
    }
    let columns: Vec<String> = match &records[0] {
        Value::Object(map) => map.keys().cloned().collect(),
        _ => vec!["value".to_string()],
    };
    let mut out = format!("| {} |\n", columns.join(" | "));
    out.push_str(&format!("|{}|\n", columns.iter().map(|_| "---").collect::<Vec<_>>().join("|")));
    for record in records {
        let row: Vec<String> = columns
            .iter()
            .map(|col| record.get(col).map(|v| render_cell(v)).unwrap_or_default())
            .collect();
        out.push_str(&format!("| {} |\n", row.join(" | ")));
    }
    out
}

fn render_cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn render_steps_as_numbered_list(steps: &[Value]) -> String {
    steps
        .iter()
        .enumerate()
        .map(|(i, step)| format!("{}. {}", i + 1, step.as_str().map(str::to_string).unwrap_or_else(|| step.to_string())))
        .collect::<Vec<_>>()
        .join("\n")
        + "\n"
}

fn render_entries_fallback(entries: &[Value]) -> String {
    entries
        .iter()
        .map(|entry| {
            let summary = entry.get("summary").and_then(|v| v.as_str()).unwrap_or("entry");
            format!("## {summary}\n")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::LlmError;
    use crate::domain::ports::LlmResponse;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLlm {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmCapability for CountingLlm {
        async fn complete(&self, _request: LlmRequest) -> Result<LlmResponse, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(LlmResponse { text: "# Rendered\n".to_string(), tokens_used: 5, latency_ms: 1 })
        }
    }

    #[tokio::test]
    async fn cache_hit_never_calls_llm() {
        let llm = Arc::new(CountingLlm { calls: AtomicUsize::new(0) });
        let transformer = ContentTransformer::new(llm.clone());
        let content = serde_json::json!({ "markdown": "hello" });
        let ctx = serde_json::json!({ "goal": "g" });

        let first = transformer.transform(&content, &ctx).await;
        assert_eq!(first.status, TransformationStatus::Success);
        assert!(!first.cache_hit);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);

        let second = transformer.transform(&content, &ctx).await;
        assert!(second.cache_hit);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1, "second call must not hit the LLM");
        assert_eq!(second.display_content, first.display_content);
    }

    #[tokio::test]
    async fn empty_content_is_skipped_without_llm_call() {
        let llm = Arc::new(CountingLlm { calls: AtomicUsize::new(0) });
        let transformer = ContentTransformer::new(llm.clone());
        let outcome = transformer.transform(&serde_json::json!({}), &serde_json::json!({})).await;
        assert_eq!(outcome.status, TransformationStatus::Skipped);
        assert!(outcome.display_content.is_none());
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rule_based_transformer_renders_records_as_table() {
        let transformer = ContentTransformer::new_rule_based();
        let content = serde_json::json!({ "records": [{"name": "Acme"}, {"name": "Globex"}] });
        let outcome = transformer.transform(&content, &serde_json::json!({})).await;
        assert_eq!(outcome.status, TransformationStatus::Success);
        let rendered = outcome.display_content.unwrap();
        assert!(rendered.contains("Acme"));
        assert!(rendered.contains("| name |"));
    }

    #[tokio::test]
    async fn distinct_business_context_misses_cache() {
        let llm = Arc::new(CountingLlm { calls: AtomicUsize::new(0) });
        let transformer = ContentTransformer::new(llm.clone());
        let content = serde_json::json!({ "markdown": "hello" });
        transformer.transform(&content, &serde_json::json!({ "goal": "a" })).await;
        transformer.transform(&content, &serde_json::json!({ "goal": "b" })).await;
        assert_eq!(llm.calls.load(Ordering::SeqCst), 2);
    }
}
