//! Realtime event bus.
//!
//! Controllers publish entity changes through the [`EventBroadcaster`]; each
//! connected WebSocket client holds a [`Session`] that streams the events its
//! topic filter selects.
//!
//! ```text
//!  controller ──publish──▶ EventBroadcaster (tokio broadcast) ──▶ Session ──▶ socket
//!                                                             └─▶ Session ──▶ socket
//! ```

pub mod broadcaster;
pub mod session;
pub mod types;

pub use broadcaster::{DEFAULT_BUFFER_SIZE, EventBroadcaster, SessionInfo};
pub use session::{EventStream, Session};
pub use types::{ChangeKind, EntityKind, RealtimeEvent, StreamItem, Topic, TopicFilter};
