//! Lifecycle event definitions and bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Lifecycle event types.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    /// Container created on the engine.
    Created {
        name: String,
        id: String,
        timestamp: DateTime<Utc>,
    },
    /// Container started, readiness pending.
    Started {
        name: String,
        id: String,
        timestamp: DateTime<Utc>,
    },
    /// Readiness observed.
    Ready {
        name: String,
        id: String,
        timestamp: DateTime<Utc>,
    },
    /// Stop requested.
    Stopped {
        name: String,
        id: String,
        timestamp: DateTime<Utc>,
    },
    /// The container process exited.
    Exited {
        name: String,
        id: String,
        code: i64,
        timestamp: DateTime<Utc>,
    },
}

impl LifecycleEvent {
    /// Name of the container the event concerns.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Created { name, .. }
            | Self::Started { name, .. }
            | Self::Ready { name, .. }
            | Self::Stopped { name, .. }
            | Self::Exited { name, .. } => name,
        }
    }
}

/// Event bus for lifecycle events.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LifecycleEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(1024);
        Self { sender }
    }
}

impl EventBus {
    /// Create a new event bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }

    /// Publish an event.
    pub fn publish(&self, event: LifecycleEvent) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(LifecycleEvent::Ready {
            name: "redis".to_string(),
            id: "abc".to_string(),
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.name(), "redis");
        assert!(matches!(event, LifecycleEvent::Ready { .. }));
    }

    #[test]
    fn publish_without_subscribers() {
        let bus = EventBus::new();
        bus.publish(LifecycleEvent::Stopped {
            name: "redis".to_string(),
            id: "abc".to_string(),
            timestamp: Utc::now(),
        });
    }
}
