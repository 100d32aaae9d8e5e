//! Registry of currently open real-time connections.
//!
//! Connections are anonymous: no authentication, no grouping by role or
//! patient. Each connection owns a bounded outbound buffer; the broadcaster
//! writes into it with `try_send`, so a stalled client only loses its own
//! frames.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Default number of frames buffered per connection.
pub const DEFAULT_CONNECTION_BUFFER: usize = 64;

/// Identifier of a real-time connection.
pub type ConnectionId = Uuid;

/// Serialized frame shared between all connections of one publish.
pub type Frame = Arc<str>;

/// Receiving half handed to the connection task on `register`.
#[derive(Debug)]
pub struct Subscription {
    id: ConnectionId,
    receiver: mpsc::Receiver<Frame>,
}

impl Subscription {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Waits for the next frame. Returns `None` once the connection was unregistered.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.receiver.recv().await
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.receiver.try_recv().ok()
    }
}

/// Set of open connections, keyed by connection id.
#[derive(Debug)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, mpsc::Sender<Frame>>,
    buffer: usize,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::with_buffer(DEFAULT_CONNECTION_BUFFER)
    }

    /// Creates a registry whose connections buffer up to `buffer` frames.
    pub fn with_buffer(buffer: usize) -> Self {
        Self {
            connections: DashMap::new(),
            buffer: buffer.max(1),
        }
    }

    /// Registers a connection. Re-registering an id replaces the old entry,
    /// which closes the previous subscription.
    pub fn register(&self, id: ConnectionId) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.buffer);
        if self.connections.insert(id, sender).is_some() {
            tracing::debug!(connection_id = %id, "Connection re-registered");
        }
        tracing::debug!(connection_id = %id, open = self.connections.len(), "Connection registered");
        Subscription { id, receiver }
    }

    /// Removes a connection. Returns `false` if it was not registered.
    pub fn unregister(&self, id: ConnectionId) -> bool {
        let removed = self.connections.remove(&id).is_some();
        if removed {
            tracing::debug!(connection_id = %id, open = self.connections.len(), "Connection unregistered");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Snapshot of the current senders. Taken before delivery so the map is
    /// never locked while frames are queued.
    pub(crate) fn senders(&self) -> Vec<(ConnectionId, mpsc::Sender<Frame>)> {
        self.connections
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
