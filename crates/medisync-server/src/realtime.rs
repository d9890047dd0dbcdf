//! Realtime entity events over WebSocket.
//!
//! `GET /api/realtime?token=<jwt>&topics=patient,operation` upgrades to a
//! WebSocket bound to one broadcaster [`Session`]. The first frame is
//! `{"event":"connected","sessionId":...}`; after that every matching event is
//! sent as `{"event","data","timestamp"}`. A client falling behind receives
//! `{"event":"lagged","missed":n}` and should refetch.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use medisync_api::ApiError;
use medisync_auth::{Action, AuthUser, Resource};
use medisync_core::events::{EventBroadcaster, Session, StreamItem, TopicFilter};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::server::AppState;

/// Query parameters of the realtime endpoint. `token` is read by the
/// [`AuthUser`] extractor.
#[derive(Debug, Default, Deserialize)]
pub struct RealtimeParams {
    pub topics: Option<String>,
}

pub async fn realtime_handler(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<RealtimeParams>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    user.require(Resource::Realtime, Action::Read)?;
    let filter = TopicFilter::parse(params.topics.as_deref().unwrap_or_default())
        .map_err(ApiError::bad_request)?;

    // Registered before the handshake completes, so nothing published after
    // the 101 response is missed.
    let session = state.events.open_session(filter);
    info!(
        session_id = %session.id(),
        user_id = %user.id,
        sessions = state.events.session_count(),
        "realtime session opened"
    );

    let events = state.events.clone();
    Ok(ws.on_upgrade(move |socket| handle_session(socket, session, events)))
}

async fn handle_session(socket: WebSocket, mut session: Session, events: EventBroadcaster) {
    let (mut sink, mut incoming) = socket.split();

    let hello = json!({"event": "connected", "sessionId": session.id()});
    if sink.send(Message::Text(hello.to_string().into())).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            item = session.next() => {
                let frame = match item {
                    Some(StreamItem::Event(event)) => match serde_json::to_string(&*event) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!(error = %e, "failed to serialize realtime event");
                            continue;
                        }
                    },
                    Some(StreamItem::Lagged(missed)) => {
                        warn!(session_id = %session.id(), missed, "realtime session lagged");
                        json!({"event": "lagged", "missed": missed}).to_string()
                    }
                    None => break,
                };
                if let Err(e) = sink.send(Message::Text(frame.into())).await {
                    debug!(session_id = %session.id(), error = %e, "realtime write failed");
                    break;
                }
            }
            message = incoming.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    if let Some(alert) = client_alert(text.as_str()) {
                        info!(session_id = %session.id(), "emergency alert relayed");
                        events.publish_alert(alert);
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(session_id = %session.id(), error = %e, "realtime read failed");
                    break;
                }
            }
        }
    }

    info!(session_id = %session.id(), "realtime client disconnected");
}

/// Payload of an `emergency-alert` message sent by a client. Anything else is
/// ignored.
fn client_alert(text: &str) -> Option<Value> {
    let message: Value = serde_json::from_str(text).ok()?;
    match message.get("event").and_then(Value::as_str) {
        Some("emergency-alert" | "emergencyAlert") => {
            Some(message.get("data").cloned().unwrap_or(Value::Null))
        }
        _ => None,
    }
}
