//! Subscriber side of the broadcaster.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::debug;

use super::broadcaster::SessionRegistry;
use super::types::{RealtimeEvent, StreamItem, TopicFilter};

/// Stream of events matching a topic filter.
///
/// Non-matching events are skipped. A receiver that overflows the channel
/// yields [`StreamItem::Lagged`] once and then resumes with the oldest event
/// still buffered.
pub struct EventStream {
    inner: BroadcastStream<Arc<RealtimeEvent>>,
    filter: TopicFilter,
}

impl EventStream {
    pub(crate) fn new(receiver: broadcast::Receiver<Arc<RealtimeEvent>>, filter: TopicFilter) -> Self {
        Self {
            inner: BroadcastStream::new(receiver),
            filter,
        }
    }

    pub fn filter(&self) -> &TopicFilter {
        &self.filter
    }
}

impl Stream for EventStream {
    type Item = StreamItem;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => {
                    if this.filter.matches(&event.topic) {
                        return Poll::Ready(Some(StreamItem::Event(event)));
                    }
                }
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(missed)))) => {
                    return Poll::Ready(Some(StreamItem::Lagged(missed)));
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// A registered realtime session. Deregisters itself when dropped.
pub struct Session {
    id: String,
    stream: EventStream,
    registry: SessionRegistry,
}

impl Session {
    pub(crate) fn new(id: String, stream: EventStream, registry: SessionRegistry) -> Self {
        Self {
            id,
            stream,
            registry,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn filter(&self) -> &TopicFilter {
        self.stream.filter()
    }
}

impl Stream for Session {
    type Item = StreamItem;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().stream).poll_next(cx)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.registry.remove(&self.id);
        debug!(session_id = %self.id, sessions = self.registry.len(), "realtime session closed");
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("filter", self.filter())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EntityKind, EventBroadcaster};
    use serde_json::json;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn filtered_stream_skips_other_topics_without_waking() {
        let events = EventBroadcaster::new();
        let mut stream = task::spawn(
            events.subscribe(TopicFilter::Entities(vec![EntityKind::Operation])),
        );
        assert_pending!(stream.poll_next());

        events.publish_created(EntityKind::Patient, json!({"id": "p1"}));
        assert_pending!(stream.poll_next());

        events.publish_created(EntityKind::Operation, json!({"id": "o1"}));
        assert!(stream.is_woken());
        match assert_ready!(stream.poll_next()) {
            Some(StreamItem::Event(event)) => {
                assert_eq!(event.event, "operation-created");
                assert_eq!(event.data["id"], "o1");
            }
            other => panic!("unexpected stream item: {other:?}"),
        }
    }

    #[test]
    fn alerts_bypass_the_filter() {
        let events = EventBroadcaster::new();
        let mut session =
            task::spawn(events.open_session(TopicFilter::Entities(vec![EntityKind::Medication])));
        events.publish_alert(json!({"room": "ER-2"}));
        assert!(matches!(
            assert_ready!(session.poll_next()),
            Some(StreamItem::Event(event)) if event.event == "emergency-alert"
        ));
    }
}
