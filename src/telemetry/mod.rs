//! Telemetry: the orchestration event envelope and its broadcast bus.
//!
//! Every service-level state change (task status, goal progress, deliverable
//! readiness, recovery attempts, workspace state) is published here as an
//! `OrchestrationEvent`. Subscriber absence or lag is never an error —
//! publishing is fire-and-forget, matching the `EventPublisher` port.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::ports::EventPublisher;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// The event-specific payload. `entity_id` on the envelope always points at
/// the primary subject named in the variant (task id, goal id, and so on).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    TaskStatusChanged { task_id: Uuid, from: String, to: String },
    GoalProgressUpdated { goal_id: Uuid, progress_percentage: f64 },
    DeliverableReady { deliverable_id: Uuid },
    RecoveryAttempted { task_id: Uuid, strategy: String, confidence: f64 },
    WorkspaceStateChanged { workspace_id: Uuid, status: String },
    TransparencyGap { goal_id: Uuid, derived_percentage: f64, reported_percentage: f64, gap: f64 },
}

/// Envelope wrapping every published event with a trace id for cross-service
/// correlation and a timestamp for ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationEvent {
    pub trace_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub entity_id: Uuid,
    pub payload: EventPayload,
}

impl OrchestrationEvent {
    fn new(entity_id: Uuid, payload: EventPayload) -> Self {
        Self { trace_id: Uuid::new_v4(), timestamp: Utc::now(), entity_id, payload }
    }

    pub fn task_status_changed(task_id: Uuid, from: &str, to: &str) -> Self {
        Self::new(task_id, EventPayload::TaskStatusChanged { task_id, from: from.to_string(), to: to.to_string() })
    }

    pub fn goal_progress_updated(goal_id: Uuid, progress_percentage: f64) -> Self {
        Self::new(goal_id, EventPayload::GoalProgressUpdated { goal_id, progress_percentage })
    }

    pub fn deliverable_ready(deliverable_id: Uuid) -> Self {
        Self::new(deliverable_id, EventPayload::DeliverableReady { deliverable_id })
    }

    pub fn recovery_attempted(task_id: Uuid, strategy: &str, confidence: f64) -> Self {
        Self::new(task_id, EventPayload::RecoveryAttempted { task_id, strategy: strategy.to_string(), confidence })
    }

    pub fn workspace_state_changed(workspace_id: Uuid, status: &str) -> Self {
        Self::new(workspace_id, EventPayload::WorkspaceStateChanged { workspace_id, status: status.to_string() })
    }

    pub fn transparency_gap(goal_id: Uuid, derived_percentage: f64, reported_percentage: f64, gap: f64) -> Self {
        Self::new(goal_id, EventPayload::TransparencyGap { goal_id, derived_percentage, reported_percentage, gap })
    }
}

/// Broadcast-backed implementation of `EventPublisher`. Subscribers that lag
/// behind the channel capacity simply miss old events on their next recv —
/// telemetry is observability, not an audit log.
pub struct EventBus {
    sender: broadcast::Sender<OrchestrationEvent>,
    published: AtomicU64,
}

impl EventBus {
    pub fn new(channel_capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(channel_capacity);
        Self { sender, published: AtomicU64::new(0) }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrchestrationEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::SeqCst)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl EventPublisher for EventBus {
    fn publish(&self, event: OrchestrationEvent) {
        self.published.fetch_add(1, Ordering::SeqCst);
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.publish(OrchestrationEvent::goal_progress_updated(Uuid::new_v4(), 42.0));
        let received = rx.recv().await.unwrap();
        assert!(matches!(received.payload, EventPayload::GoalProgressUpdated { progress_percentage, .. } if progress_percentage == 42.0));
        assert_eq!(bus.published_count(), 1);
    }

    #[tokio::test]
    async fn transparency_gap_event_carries_both_percentages() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let goal_id = Uuid::new_v4();
        bus.publish(OrchestrationEvent::transparency_gap(goal_id, 50.0, 67.0, 17.0));
        let received = rx.recv().await.unwrap();
        match received.payload {
            EventPayload::TransparencyGap { goal_id: id, derived_percentage, reported_percentage, gap } => {
                assert_eq!(id, goal_id);
                assert_eq!(derived_percentage, 50.0);
                assert_eq!(reported_percentage, 67.0);
                assert_eq!(gap, 17.0);
            }
            other => panic!("expected TransparencyGap, got {other:?}"),
        }
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(OrchestrationEvent::workspace_state_changed(Uuid::new_v4(), "active"));
        assert_eq!(bus.published_count(), 1);
    }
}
