//! Event broadcaster for realtime entity notifications.
//!
//! The `EventBroadcaster` fans every published event out to all subscribers
//! over a tokio broadcast channel. Publishing never blocks and never fails:
//! with no subscribers the event is simply dropped. Subscribers only see
//! events published after they subscribed.

use std::sync::Arc;

use dashmap::DashMap;
use time::OffsetDateTime;
use tokio::sync::broadcast;
use tracing::debug;

use super::session::{EventStream, Session};
use super::types::{EntityKind, RealtimeEvent, Topic, TopicFilter};

/// Default buffer size for the broadcast channel.
/// Receivers that fall further behind than this are told how many events they missed.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Registry entry for a connected session.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub id: String,
    pub filter: TopicFilter,
    pub connected_at: OffsetDateTime,
}

pub(crate) type SessionRegistry = Arc<DashMap<String, SessionInfo>>;

/// Broadcaster for realtime events. Cheap to clone; clones share the channel
/// and the session registry.
#[derive(Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<Arc<RealtimeEvent>>,
    sessions: SessionRegistry,
}

impl EventBroadcaster {
    /// Create a new broadcaster with default buffer size.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE)
    }

    /// Create a new broadcaster with custom buffer size.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            sessions: Arc::new(DashMap::new()),
        }
    }

    /// Create a new broadcaster wrapped in an Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Publish `data` under `topic`.
    ///
    /// Returns the number of receivers the event was queued for, 0 when no
    /// one is listening.
    pub fn publish(&self, topic: Topic, data: serde_json::Value) -> usize {
        let event = Arc::new(RealtimeEvent::new(topic, data));
        let reached = self.sender.send(event).unwrap_or_default();
        debug!(event = %topic, receivers = reached, "realtime event published");
        reached
    }

    pub fn publish_created(&self, kind: EntityKind, data: serde_json::Value) -> usize {
        self.publish(Topic::created(kind), data)
    }

    pub fn publish_updated(&self, kind: EntityKind, data: serde_json::Value) -> usize {
        self.publish(Topic::updated(kind), data)
    }

    /// Deletions carry only the id of the removed document.
    pub fn publish_deleted(&self, kind: EntityKind, id: &str) -> usize {
        self.publish(Topic::deleted(kind), serde_json::json!({ "id": id }))
    }

    pub fn publish_alert(&self, data: serde_json::Value) -> usize {
        self.publish(Topic::EmergencyAlert, data)
    }

    /// Subscribe to events matching `filter`, without registering a session.
    pub fn subscribe(&self, filter: TopicFilter) -> EventStream {
        EventStream::new(self.sender.subscribe(), filter)
    }

    /// Open a tracked session. The session stays in the registry until the
    /// returned handle is dropped.
    pub fn open_session(&self, filter: TopicFilter) -> Session {
        let id = crate::id::generate_id();
        let info = SessionInfo {
            id: id.clone(),
            filter: filter.clone(),
            connected_at: OffsetDateTime::now_utc(),
        };
        self.sessions.insert(id.clone(), info);
        debug!(session_id = %id, sessions = self.sessions.len(), "realtime session opened");
        Session::new(id, self.subscribe(filter), Arc::clone(&self.sessions))
    }

    /// Number of open sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Snapshot of the open sessions.
    pub fn sessions(&self) -> Vec<SessionInfo> {
        self.sessions.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Number of live receivers, including untracked subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBroadcaster")
            .field("subscriber_count", &self.subscriber_count())
            .field("session_count", &self.session_count())
            .finish()
    }
}
