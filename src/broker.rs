//! Live push of alert events to connected clients.
//!
//! A [`ConnectionRegistry`] owns every open [`StreamSession`], keyed by user.
//! Clients hold the receiving half as a [`SessionStream`]; dropping it closes
//! the session and unregisters it.

use std::sync::Arc;

use crate::types::alert::Alert;

mod heartbeat;
mod registry;
mod session;

pub use heartbeat::{HeartbeatMonitor, SweepReport};
pub use registry::{ConnectionRegistry, ConnectionStatus};
pub use session::{
    CloseReason, DeliveryError, SessionId, SessionState, SessionStream, StreamSession,
};

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Connect,
    UnreadCount(u64),
    Notification(Arc<Alert>),
    Heartbeat,
}

impl StreamEvent {
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::Connect => "connect",
            StreamEvent::UnreadCount(_) => "unread-count",
            StreamEvent::Notification(_) => "notification",
            StreamEvent::Heartbeat => "heartbeat",
        }
    }

    pub fn data(&self) -> Result<String, serde_json::Error> {
        match self {
            StreamEvent::Connect => Ok("connected".to_string()),
            StreamEvent::UnreadCount(count) => Ok(count.to_string()),
            StreamEvent::Notification(alert) => serde_json::to_string(alert.as_ref()),
            StreamEvent::Heartbeat => Ok("ping".to_string()),
        }
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use crate::types::alert::{AlertKind, UserId};
    use time::macros::datetime;

    #[test]
    fn stream_event__should_encode_alert_payload_as_json() {
        // Given
        let event = StreamEvent::Notification(Arc::new(Alert {
            id: 1,
            user_id: UserId(42),
            subject_id: Some(7),
            kind: AlertKind::ExpireIn1,
            title: "Expiry soon".to_string(),
            message: "[Milk] tomorrow is the expiry date".to_string(),
            read: false,
            created_at: datetime!(2026-10-16 09:00 UTC),
            read_at: None,
        }));

        // When
        let data = event.data().expect("encode event");
        let decoded: serde_json::Value = serde_json::from_str(&data).expect("decode event");

        // Then
        assert_eq!(event.name(), "notification");
        assert_eq!(decoded["user_id"], 42);
        assert_eq!(decoded["kind"], "EXPIRE_IN_1");
        assert_eq!(decoded["created_at"], "2026-10-16T09:00:00Z");
    }

    #[test]
    fn stream_event__should_encode_counts_as_plain_integers() {
        assert_eq!(StreamEvent::UnreadCount(3).data().expect("encode"), "3");
        assert_eq!(StreamEvent::UnreadCount(3).name(), "unread-count");
    }
}
