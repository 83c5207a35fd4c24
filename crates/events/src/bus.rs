//! Broadcast event bus shared as `Arc<EventBus>` across the application.

use chrono::Utc;
use serde::Serialize;
use skillforge_core::types::{DbId, Timestamp};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// PlatformEvent
// ---------------------------------------------------------------------------

/// The entity an event is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EntityRef {
    pub kind: &'static str,
    pub id: DbId,
}

/// Something that happened on the platform.
///
/// Built with [`PlatformEvent::new`] and the `about` / `by` / `with_data`
/// builders.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformEvent {
    /// Dot-separated name from [`crate::names`].
    pub name: &'static str,
    pub subject: Option<EntityRef>,
    /// User whose request caused the event.
    pub actor_id: Option<DbId>,
    pub data: serde_json::Value,
    pub occurred_at: Timestamp,
}

impl PlatformEvent {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            subject: None,
            actor_id: None,
            data: serde_json::Value::Object(Default::default()),
            occurred_at: Utc::now(),
        }
    }

    pub fn about(mut self, kind: &'static str, id: DbId) -> Self {
        self.subject = Some(EntityRef { kind, id });
        self
    }

    pub fn by(mut self, user_id: DbId) -> Self {
        self.actor_id = Some(user_id);
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

const DEFAULT_CAPACITY: usize = 256;

/// Fan-out bus: every subscriber sees every event published after it
/// subscribed. A full buffer drops the oldest events and slow receivers
/// observe `RecvError::Lagged`.
pub struct EventBus {
    sender: broadcast::Sender<PlatformEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to all current subscribers. Returns how many received it;
    /// with no subscribers the event is dropped.
    pub fn publish(&self, event: PlatformEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
