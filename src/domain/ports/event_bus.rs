//! Telemetry event bus port.
//!
//! Services depend on this trait, not on `tokio::sync::broadcast` directly,
//! so the concrete bus in `telemetry` can be swapped in tests for a
//! recording stub.

use crate::telemetry::OrchestrationEvent;

pub trait EventPublisher: Send + Sync {
    /// Publish an event. Subscriber lag or absence is never an error here —
    /// telemetry is best-effort and must not block task execution.
    fn publish(&self, event: OrchestrationEvent);
}
