//! Real-time notification layer.
//!
//! ```text
//! domain triggers ──► EventBroadcaster ──► ConnectionRegistry ──► N sessions
//! ```
//!
//! One publisher, any number of anonymous subscribers. No persistence,
//! replay, acknowledgment or topic routing: clients re-fetch authoritative
//! state over HTTP.

mod broadcaster;
mod registry;
mod types;

pub use broadcaster::EventBroadcaster;
pub use registry::{
    ConnectionId, ConnectionRegistry, DEFAULT_CONNECTION_BUFFER, Frame, Subscription,
};
pub use types::{EVENT_NAME, EventFrame, RealtimeEvent};
