//! `GET /ws`: anonymous WebSocket sessions fed by the event broadcaster.

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use carehub_core::events::{ConnectionId, ConnectionRegistry};
use futures_util::{SinkExt, StreamExt};
use uuid::Uuid;

use crate::server::AppState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let registry = state.broadcaster.registry().clone();
    ws.on_upgrade(move |socket| session(socket, registry))
}

/// Unregisters the connection however the session ends.
struct RegistrationGuard {
    id: ConnectionId,
    registry: Arc<ConnectionRegistry>,
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        self.registry.unregister(self.id);
        tracing::debug!(connection_id = %self.id, remaining = self.registry.len(), "Realtime client disconnected");
    }
}

async fn session(socket: WebSocket, registry: Arc<ConnectionRegistry>) {
    let id = Uuid::new_v4();
    let mut subscription = registry.register(id);
    let _guard = RegistrationGuard {
        id,
        registry: registry.clone(),
    };
    tracing::debug!(connection_id = %id, connections = registry.len(), "Realtime client connected");

    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            frame = subscription.recv() => {
                let Some(frame) = frame else { break };
                if let Err(e) = sink.send(Message::Text(frame.as_ref().into())).await {
                    tracing::debug!(connection_id = %id, error = %e, "Realtime send failed");
                    break;
                }
            }
            inbound = stream.next() => {
                match inbound {
                    // Pings are answered by axum; other client frames carry nothing.
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}
