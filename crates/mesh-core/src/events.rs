//! Lifecycle notifications emitted by the bridges and coordinator
//!
//! Fan-out is explicit message passing over a broadcast channel: consumers
//! subscribe and pull typed notifications rather than registering
//! callbacks, keeping ownership and shutdown explicit.

use crate::types::{AgentProfile, HandoffRecord, WorkflowMetricsRecord};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Typed lifecycle notification carrying the relevant record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    WorkflowCompleted(WorkflowMetricsRecord),
    WorkflowFailed(WorkflowMetricsRecord),
    HandoffRecorded(HandoffRecord),
    ToolExecuted {
        tool_name: String,
        execution_time_ms: u64,
    },
    ToolFailed {
        tool_name: String,
        error: String,
    },
    ResourceAccessed {
        uri: String,
        from_cache: bool,
    },
    ResourceFailed {
        uri: String,
        error: String,
    },
    AgentDiscovered(AgentProfile),
    AgentLost {
        agent_id: String,
    },
    TopologyChanged {
        agent_count: usize,
    },
}

/// Broadcast bus for lifecycle notifications.
///
/// Emission never blocks; notifications sent with no subscribers are
/// dropped, and slow subscribers observe lag rather than stalling emitters.
#[derive(Debug, Clone)]
pub struct NotificationBus {
    tx: broadcast::Sender<Notification>,
}

impl NotificationBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all notifications from this bus
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    /// Emit a notification to all current subscribers
    pub fn emit(&self, notification: Notification) {
        let _ = self.tx.send(notification);
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribe_and_emit() {
        let bus = NotificationBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(Notification::TopologyChanged { agent_count: 3 });

        match rx.recv().await.unwrap() {
            Notification::TopologyChanged { agent_count } => assert_eq!(agent_count, 3),
            other => panic!("unexpected notification: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_is_dropped() {
        let bus = NotificationBus::new(16);
        // No receiver; emission must not error or block.
        bus.emit(Notification::AgentLost {
            agent_id: "a".into(),
        });
        assert_eq!(bus.subscriber_count(), 0);
    }
}
