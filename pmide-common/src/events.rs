//! Event types and broadcast bus
//!
//! Store handlers emit a [`PmEvent`] after each successful mutation so open
//! UI windows can refresh without polling. The bus is a tokio broadcast
//! channel; slow subscribers lose the oldest events rather than blocking
//! writers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// Kind of project item an [`PmEvent::ItemsChanged`] refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Document,
    Output,
    Folder,
}

/// What happened to an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

/// Events broadcast by the store service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PmEvent {
    ProjectChanged {
        project_id: String,
        change: ChangeKind,
        timestamp: DateTime<Utc>,
    },
    ConversationUpdated {
        project_id: String,
        conversation_id: String,
        change: ChangeKind,
        timestamp: DateTime<Utc>,
    },
    MessageAdded {
        conversation_id: String,
        message_id: String,
        role: String,
        timestamp: DateTime<Utc>,
    },
    TokenUsageRecorded {
        conversation_id: Option<String>,
        model: String,
        input_tokens: i64,
        output_tokens: i64,
        cost: f64,
        timestamp: DateTime<Utc>,
    },
    SettingsChanged {
        timestamp: DateTime<Utc>,
    },
    FrameworksChanged {
        framework_id: Option<String>,
        timestamp: DateTime<Utc>,
    },
    PromptsChanged {
        prompt_id: Option<String>,
        timestamp: DateTime<Utc>,
    },
    ItemsChanged {
        project_id: String,
        kind: ItemKind,
        item_id: String,
        change: ChangeKind,
        timestamp: DateTime<Utc>,
    },
}

impl PmEvent {
    /// SSE `event:` name for this event
    pub fn event_type(&self) -> &'static str {
        match self {
            PmEvent::ProjectChanged { .. } => "ProjectChanged",
            PmEvent::ConversationUpdated { .. } => "ConversationUpdated",
            PmEvent::MessageAdded { .. } => "MessageAdded",
            PmEvent::TokenUsageRecorded { .. } => "TokenUsageRecorded",
            PmEvent::SettingsChanged { .. } => "SettingsChanged",
            PmEvent::FrameworksChanged { .. } => "FrameworksChanged",
            PmEvent::PromptsChanged { .. } => "PromptsChanged",
            PmEvent::ItemsChanged { .. } => "ItemsChanged",
        }
    }
}

/// Broadcast bus for [`PmEvent`]s
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PmEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<PmEvent> {
        self.tx.subscribe()
    }

    /// Emit an event; `Err` when nobody is listening
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: PmEvent) -> Result<usize, broadcast::error::SendError<PmEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the no-subscriber case
    pub fn emit_lossy(&self, event: PmEvent) {
        let event_type = event.event_type();
        if self.tx.send(event).is_err() {
            debug!("No subscribers for {}", event_type);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        bus.emit(PmEvent::SettingsChanged { timestamp: Utc::now() }).unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "SettingsChanged");
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(4);
        assert!(bus.emit(PmEvent::SettingsChanged { timestamp: Utc::now() }).is_err());
        // lossy variant must not panic
        bus.emit_lossy(PmEvent::SettingsChanged { timestamp: Utc::now() });
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.capacity(), 4);
    }

    #[test]
    fn test_serialized_tag() {
        let event = PmEvent::ItemsChanged {
            project_id: "p".into(),
            kind: ItemKind::Output,
            item_id: "i".into(),
            change: ChangeKind::Deleted,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ItemsChanged");
        assert_eq!(json["kind"], "output");
        assert_eq!(json["change"], "deleted");
    }
}
