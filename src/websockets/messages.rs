use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::session::SessionId;

/// Frame types with built-in handling; anything else is a domain event
pub mod frame_types {
    // Client -> Server
    pub const JOIN_ROOM: &str = "join_room";
    pub const LEAVE_ROOM: &str = "leave_room";
    pub const MESSAGE: &str = "message";

    // Server -> Client
    pub const CONNECT: &str = "connect";
    pub const USER_JOINED: &str = "user_joined";
    pub const USER_LEFT: &str = "user_left";
    pub const ERROR: &str = "error";
}

/// `from` used for frames the server originates on behalf of the CRUD layer
pub const SERVER_ORIGIN: &str = "server";

/// Envelope for every realtime frame, inbound and outbound
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(rename = "type")]
    pub frame_type: String,
    #[serde(default)]
    pub payload: Map<String, Value>,
}

/// Current time as an ISO-8601 string
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl Frame {
    pub fn new(frame_type: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            frame_type: frame_type.into(),
            payload,
        }
    }

    /// Decodes an inbound text frame
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Copy of this frame with `from` and `timestamp` overwritten by the server
    pub fn stamped(&self, from: &str) -> Self {
        let mut payload = self.payload.clone();
        payload.insert("from".to_string(), Value::String(from.to_string()));
        payload.insert("timestamp".to_string(), Value::String(timestamp_now()));
        Self::new(self.frame_type.clone(), payload)
    }

    /// Connection confirmation carrying the assigned session id
    pub fn connect(session_id: &SessionId, room: Option<&str>) -> Self {
        let mut payload = object(json!({
            "sessionId": session_id,
            "timestamp": timestamp_now(),
        }));
        if let Some(room) = room {
            payload.insert("room".to_string(), Value::String(room.to_string()));
        }
        Self::new(frame_types::CONNECT, payload)
    }

    /// Reply to a join/leave request, echoing the request type
    pub fn room_ack(request_type: &str, room: &str, success: bool) -> Self {
        Self::new(
            request_type,
            object(json!({
                "room": room,
                "success": success,
                "timestamp": timestamp_now(),
            })),
        )
    }

    /// Tells other members that a session joined or left a room
    pub fn membership(frame_type: &str, room: &str, session_id: &SessionId, user_id: &str) -> Self {
        Self::new(
            frame_type,
            object(json!({
                "room": room,
                "sessionId": session_id,
                "userId": user_id,
            })),
        )
        .stamped(session_id.as_str())
    }

    /// Error reported only to the offending sender
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(
            frame_types::ERROR,
            object(json!({
                "error": message.into(),
                "timestamp": timestamp_now(),
            })),
        )
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
