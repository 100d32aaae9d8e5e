//! Real-time event types.
//!
//! All events travel under a single event name so that clients subscribe
//! once and receive everything:
//!
//! ```json
//! {"event": "new_appointment", "data": {"message": "Appointment #4 is now confirmed"}}
//! {"event": "new_appointment", "data": {"id": 5, "doctor_id": 2, "time": "09:30", "patient_id": 7}}
//! ```

use serde::{Deserialize, Serialize};

/// Event name carried by every frame on the real-time channel.
pub const EVENT_NAME: &str = "new_appointment";

/// A notification fanned out to every connected client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RealtimeEvent {
    /// Structured record of a freshly persisted appointment.
    NewAppointment {
        id: i64,
        doctor_id: Option<i64>,
        time: String,
        patient_id: i64,
    },
    /// Human-readable status change.
    Status { message: String },
}

impl RealtimeEvent {
    /// Wraps a plain string in the generic status envelope.
    pub fn status(message: impl Into<String>) -> Self {
        Self::Status {
            message: message.into(),
        }
    }

    /// Builds a new-appointment event; `time` is rendered as `HH:MM`.
    pub fn new_appointment(
        id: i64,
        doctor_id: Option<i64>,
        time: chrono::NaiveTime,
        patient_id: i64,
    ) -> Self {
        Self::NewAppointment {
            id,
            doctor_id,
            time: time.format("%H:%M").to_string(),
            patient_id,
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NewAppointment { .. } => "new_appointment",
            Self::Status { .. } => "status",
        }
    }
}

/// Wire envelope sent as a WebSocket text frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventFrame {
    pub event: String,
    pub data: RealtimeEvent,
}

impl From<RealtimeEvent> for EventFrame {
    fn from(data: RealtimeEvent) -> Self {
        Self {
            event: EVENT_NAME.to_string(),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_frame_shape() {
        let frame = EventFrame::from(RealtimeEvent::status("Prescription #3 is now ready"));
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            value,
            json!({"event": "new_appointment", "data": {"message": "Prescription #3 is now ready"}})
        );
    }

    #[test]
    fn appointment_frame_shape() {
        let time = chrono::NaiveTime::from_hms_opt(9, 30, 0).unwrap();
        let frame = EventFrame::from(RealtimeEvent::new_appointment(5, Some(2), time, 7));
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            value["data"],
            json!({"id": 5, "doctor_id": 2, "time": "09:30", "patient_id": 7})
        );
    }

    #[test]
    fn frames_parse_back_into_the_right_variant() {
        let status: EventFrame =
            serde_json::from_value(json!({"event": "new_appointment", "data": {"message": "x"}}))
                .unwrap();
        assert_eq!(status.data.kind(), "status");

        let appt: EventFrame = serde_json::from_value(json!({
            "event": "new_appointment",
            "data": {"id": 1, "doctor_id": null, "time": "10:00", "patient_id": 3}
        }))
        .unwrap();
        assert_eq!(appt.data.kind(), "new_appointment");
    }
}
