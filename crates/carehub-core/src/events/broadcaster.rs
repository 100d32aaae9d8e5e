//! Event broadcaster for the real-time notification channel.
//!
//! Publishing is fire-and-forget: the event is serialized once and queued
//! with `try_send` on every registered connection. A full buffer drops the
//! frame for that connection only; a closed connection is unregistered.

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;

use super::registry::{ConnectionRegistry, Frame};
use super::types::{EventFrame, RealtimeEvent};

/// Fan-out publisher over a [`ConnectionRegistry`].
///
/// Cheap to clone; all clones share the same registry.
///
/// # Example
///
/// ```
/// use carehub_core::events::{EventBroadcaster, ConnectionRegistry};
/// use std::sync::Arc;
///
/// let registry = Arc::new(ConnectionRegistry::new());
/// let broadcaster = EventBroadcaster::new(registry);
///
/// // No clients connected: nothing is delivered, nothing fails.
/// assert_eq!(broadcaster.publish_status("Appointment #1 is now confirmed"), 0);
/// ```
#[derive(Clone)]
pub struct EventBroadcaster {
    registry: Arc<ConnectionRegistry>,
}

impl EventBroadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Broadcaster with its own fresh registry.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new(Arc::new(ConnectionRegistry::new())))
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Publishes an event to every open connection.
    ///
    /// Returns the number of connections the frame was queued for.
    pub fn publish(&self, event: RealtimeEvent) -> usize {
        let kind = event.kind();
        let frame: Frame = match serde_json::to_string(&EventFrame::from(event)) {
            Ok(json) => Arc::from(json),
            Err(e) => {
                tracing::warn!(error = %e, kind, "Failed to serialize realtime event");
                return 0;
            }
        };

        let mut delivered = 0;
        let mut closed = Vec::new();
        for (id, sender) in self.registry.senders() {
            match sender.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::debug!(connection_id = %id, kind, "Connection buffer full, frame dropped");
                }
                Err(TrySendError::Closed(_)) => closed.push(id),
            }
        }

        for id in closed {
            self.registry.unregister(id);
        }

        tracing::debug!(kind, delivered, "Realtime event published");
        delivered
    }

    /// Publishes a human-readable status message.
    pub fn publish_status(&self, message: impl Into<String>) -> usize {
        self.publish(RealtimeEvent::status(message))
    }

    /// Publishes the structured record of a newly persisted appointment.
    pub fn publish_new_appointment(
        &self,
        id: i64,
        doctor_id: Option<i64>,
        time: chrono::NaiveTime,
        patient_id: i64,
    ) -> usize {
        self.publish(RealtimeEvent::new_appointment(id, doctor_id, time, patient_id))
    }
}

impl std::fmt::Debug for EventBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBroadcaster")
            .field("connections", &self.registry.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EVENT_NAME;
    use uuid::Uuid;

    fn broadcaster_with_buffer(buffer: usize) -> EventBroadcaster {
        EventBroadcaster::new(Arc::new(ConnectionRegistry::with_buffer(buffer)))
    }

    #[test]
    fn publish_without_connections_returns_zero() {
        let broadcaster = EventBroadcaster::new_shared();
        assert_eq!(broadcaster.publish_status("nobody listening"), 0);
    }

    #[tokio::test]
    async fn every_connection_receives_the_frame_once() {
        let broadcaster = broadcaster_with_buffer(8);
        let mut a = broadcaster.registry().register(Uuid::new_v4());
        let mut b = broadcaster.registry().register(Uuid::new_v4());

        assert_eq!(broadcaster.publish_status("Prescription #2 is now ready"), 2);

        for sub in [&mut a, &mut b] {
            let frame = sub.recv().await.unwrap();
            let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
            assert_eq!(value["event"], EVENT_NAME);
            assert_eq!(value["data"]["message"], "Prescription #2 is now ready");
            assert!(sub.try_recv().is_none());
        }
    }

    #[tokio::test]
    async fn late_subscriber_misses_earlier_events() {
        let broadcaster = broadcaster_with_buffer(8);
        broadcaster.publish_status("before");
        let mut late = broadcaster.registry().register(Uuid::new_v4());
        assert!(late.try_recv().is_none());

        broadcaster.publish_status("after");
        let frame = late.recv().await.unwrap();
        assert!(frame.contains("after"));
    }

    #[test]
    fn full_buffer_drops_frames_without_blocking() {
        let broadcaster = broadcaster_with_buffer(1);
        let mut sub = broadcaster.registry().register(Uuid::new_v4());

        assert_eq!(broadcaster.publish_status("first"), 1);
        assert_eq!(broadcaster.publish_status("second"), 0);
        assert_eq!(broadcaster.registry().len(), 1);

        let frame = sub.try_recv().unwrap();
        assert!(frame.contains("first"));
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn closed_connections_are_pruned() {
        let broadcaster = broadcaster_with_buffer(4);
        let sub = broadcaster.registry().register(Uuid::new_v4());
        drop(sub);

        assert_eq!(broadcaster.publish_status("x"), 0);
        assert!(broadcaster.registry().is_empty());
    }

    #[tokio::test]
    async fn new_appointment_payload_is_structured() {
        let broadcaster = broadcaster_with_buffer(4);
        let mut sub = broadcaster.registry().register(Uuid::new_v4());
        let time = chrono::NaiveTime::from_hms_opt(14, 0, 0).unwrap();

        broadcaster.publish_new_appointment(11, Some(3), time, 42);

        let frame = sub.recv().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["data"]["id"], 11);
        assert_eq!(value["data"]["doctor_id"], 3);
        assert_eq!(value["data"]["time"], "14:00");
        assert_eq!(value["data"]["patient_id"], 42);
    }
}
