//! Deliverable domain model.
//!
//! A deliverable aggregates completed task outputs for a goal into a single
//! artifact the business consumes, carried in dual form: `content` (the
//! structured execution-format payload) and `display_content` (the
//! user-facing rendering produced by the Content Transformer).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliverableStatus {
    Draft,
    InProgress,
    Completed,
    Failed,
}

impl DeliverableStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        use DeliverableStatus::*;
        matches!(
            (self, new_status),
            (Draft, InProgress) | (InProgress, Completed) | (InProgress, Failed) | (Failed, InProgress)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayFormat {
    Html,
    Markdown,
    Text,
}

impl DisplayFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Markdown => "markdown",
            Self::Text => "text",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "html" => Some(Self::Html),
            "markdown" => Some(Self::Markdown),
            "text" => Some(Self::Text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformationStatus {
    Pending,
    Success,
    Failed,
    Skipped,
}

impl TransformationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }
}

/// One task's contribution folded into a deliverable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverableEntry {
    pub task_id: Uuid,
    pub summary: String,
    pub content: serde_json::Value,
    pub appended_at: DateTime<Utc>,
}

/// A goal-scoped aggregate of completed task outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deliverable {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub goal_id: Uuid,
    pub title: String,
    pub status: DeliverableStatus,
    pub entries: Vec<DeliverableEntry>,
    /// Structured execution-format payload, regenerated on every append.
    pub content: serde_json::Value,
    /// User-facing rendering produced by the Content Transformer. Absent
    /// unless `transformation_status` is `success`.
    pub display_content: Option<String>,
    pub display_format: DisplayFormat,
    pub display_quality_score: f64,
    pub transformation_status: TransformationStatus,
    pub transformation_timestamp: Option<DateTime<Utc>>,
    pub business_value_score: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl Deliverable {
    pub fn new(workspace_id: Uuid, goal_id: Uuid, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            workspace_id,
            goal_id,
            title: title.into(),
            status: DeliverableStatus::Draft,
            entries: Vec::new(),
            content: serde_json::json!({ "entries": [] }),
            display_content: None,
            display_format: DisplayFormat::Markdown,
            display_quality_score: 0.0,
            transformation_status: TransformationStatus::Pending,
            transformation_timestamp: None,
            business_value_score: 0.0,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("deliverable title cannot be empty".to_string());
        }
        if self.display_content.is_none() && self.transformation_status == TransformationStatus::Success {
            return Err("display_content must be present when transformation_status is success".to_string());
        }
        Ok(())
    }

    /// Append a task's contribution. If an entry for the same `task_id`
    /// already exists (a task re-completed after revision), it is replaced
    /// in place rather than duplicated — the merge-on-collision rule.
    pub fn append(&mut self, entry: DeliverableEntry) {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.task_id == entry.task_id) {
            *existing = entry;
        } else {
            self.entries.push(entry);
        }
        self.content = serde_json::json!({
            "entries": self.entries.iter().map(|e| serde_json::json!({
                "task_id": e.task_id, "summary": e.summary, "content": e.content,
            })).collect::<Vec<_>>()
        });
        self.updated_at = Utc::now();
        self.version += 1;
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn can_transition_to(&self, new_status: DeliverableStatus) -> bool {
        self.status.can_transition_to(new_status)
    }

    pub fn transition_to(&mut self, new_status: DeliverableStatus) -> Result<(), String> {
        if !self.can_transition_to(new_status) {
            return Err(format!(
                "cannot transition deliverable from {} to {}",
                self.status.as_str(),
                new_status.as_str()
            ));
        }
        self.status = new_status;
        self.updated_at = Utc::now();
        self.version += 1;
        Ok(())
    }

    /// Whether the deliverable has enough entries to be considered for
    /// completion (the aggregator still requires goal satisfaction on top).
    pub fn meets_minimum_entries(&self, minimum: usize) -> bool {
        self.entries.len() >= minimum
    }

    /// Records a successful Content Transformer result. Leaves `content`
    /// untouched — transformation never mutates the execution-format payload.
    pub fn apply_transformation_success(&mut self, display_content: String, format: DisplayFormat, quality_score: f64) {
        self.display_content = Some(display_content);
        self.display_format = format;
        self.display_quality_score = quality_score.clamp(0.0, 1.0);
        self.transformation_status = TransformationStatus::Success;
        self.transformation_timestamp = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    /// Records a failed or skipped transformation. The deliverable remains
    /// valid; display falls back to a structured rendering of `content`.
    pub fn apply_transformation_outcome(&mut self, status: TransformationStatus) {
        self.transformation_status = status;
        self.transformation_timestamp = Some(Utc::now());
        self.updated_at = Utc::now();
    }
}
