use axum::extract::ws::Utf8Bytes;
use serde::{Deserialize, Serialize};

use super::error::HubError;

/// Event discriminants observed by WebSocket clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "Post_Created")]
    PostCreated,
    #[serde(rename = "Post_Updated")]
    PostUpdated,
    #[serde(rename = "Post_Deleted")]
    PostDeleted,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PostCreated => "Post_Created",
            EventKind::PostUpdated => "Post_Updated",
            EventKind::PostDeleted => "Post_Deleted",
        }
    }
}

/// Envelope pushed to every connected client: `{"type": ..., "payload": ...}`.
///
/// Fields are private so a message cannot change after it has been handed to
/// the hub; the same value is encoded once and shared by every recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSocketMessage {
    #[serde(rename = "type")]
    kind: EventKind,
    payload: serde_json::Value,
}

impl WebSocketMessage {
    pub fn new<T: Serialize>(kind: EventKind, payload: &T) -> Result<Self, HubError> {
        let payload = serde_json::to_value(payload).map_err(HubError::Encode)?;
        Ok(Self { kind, payload })
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    /// Encode into a text frame. `Utf8Bytes` is reference counted, so cloning
    /// the frame per session does not copy the body.
    pub fn to_frame(&self) -> Result<Utf8Bytes, HubError> {
        let text = serde_json::to_string(self).map_err(HubError::Encode)?;
        Ok(Utf8Bytes::from(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_shape() {
        let msg = WebSocketMessage::new(
            EventKind::PostCreated,
            &json!({ "id": "p1", "post_content": "hello" }),
        )
        .unwrap();
        assert_eq!(msg.kind(), EventKind::PostCreated);
        assert_eq!(msg.payload()["id"], "p1");

        let frame = msg.to_frame().unwrap();
        let value: serde_json::Value = serde_json::from_str(frame.as_str()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "Post_Created",
                "payload": { "id": "p1", "post_content": "hello" }
            })
        );
    }

    #[test]
    fn test_kind_names_match_wire_tags() {
        for kind in [
            EventKind::PostCreated,
            EventKind::PostUpdated,
            EventKind::PostDeleted,
        ] {
            let encoded = serde_json::to_value(kind).unwrap();
            assert_eq!(encoded, json!(kind.as_str()));
        }
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let parsed = serde_json::from_value::<WebSocketMessage>(json!({
            "type": "Post_Liked",
            "payload": {}
        }));
        assert!(parsed.is_err());
    }
}
