//! WebSocket Message Types
//!
//! Frames are JSON objects `{op, d, s, t}`. Only dispatches (op 0) carry
//! an event name `t` and a per-connection sequence `s`.

use serde::{Deserialize, Serialize};

use crate::domain::UserSummary;

/// Longest room message accepted, in characters.
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// Hub opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    /// Event dispatch (server -> client)
    Dispatch = 0,
    /// Heartbeat (client -> server)
    Heartbeat = 1,
    /// Identify with an access token (client -> server)
    Identify = 2,
    /// Join a room (client -> server)
    JoinRoom = 3,
    /// Leave a room (client -> server)
    LeaveRoom = 4,
    /// Send a message to a joined room (client -> server)
    SendMessage = 5,
    /// Session rejected (server -> client)
    InvalidSession = 9,
    /// Hello (server -> client)
    Hello = 10,
    /// Heartbeat ACK (server -> client)
    HeartbeatAck = 11,
}

impl OpCode {
    pub fn from_u8(op: u8) -> Option<Self> {
        Some(match op {
            0 => Self::Dispatch,
            1 => Self::Heartbeat,
            2 => Self::Identify,
            3 => Self::JoinRoom,
            4 => Self::LeaveRoom,
            5 => Self::SendMessage,
            9 => Self::InvalidSession,
            10 => Self::Hello,
            11 => Self::HeartbeatAck,
            _ => return None,
        })
    }
}

/// Incoming frame
#[derive(Debug, Deserialize)]
pub struct GatewayReceive {
    pub op: u8,
    pub d: Option<serde_json::Value>,
    pub s: Option<u64>,
    pub t: Option<String>,
}

/// Outgoing control frame
#[derive(Debug, Clone, Serialize)]
pub struct GatewaySend {
    pub op: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl GatewaySend {
    fn control(op: OpCode, d: Option<serde_json::Value>) -> Self {
        Self {
            op: op as u8,
            d,
            s: None,
            t: None,
        }
    }

    pub fn hello(heartbeat_interval: u64) -> Self {
        Self::control(
            OpCode::Hello,
            Some(serde_json::json!(HelloPayload { heartbeat_interval })),
        )
    }

    pub fn heartbeat_ack() -> Self {
        Self::control(OpCode::HeartbeatAck, None)
    }

    pub fn invalid_session() -> Self {
        Self::control(OpCode::InvalidSession, Some(serde_json::Value::Bool(false)))
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Text of a dispatch frame around an already-encoded payload.
pub fn dispatch_frame(event_name: &str, sequence: u64, payload_json: &str) -> String {
    format!(
        r#"{{"op":{},"t":"{}","s":{},"d":{}}}"#,
        OpCode::Dispatch as u8,
        event_name,
        sequence,
        payload_json
    )
}

/// Hello payload (op 10)
#[derive(Debug, Serialize)]
pub struct HelloPayload {
    pub heartbeat_interval: u64,
}

/// Ready payload (dispatch `Ready`)
#[derive(Debug, Serialize)]
pub struct ReadyPayload {
    pub user: UserSummary,
    pub session_id: String,
}

/// Identify payload (op 2)
#[derive(Debug, Deserialize)]
pub struct IdentifyPayload {
    pub token: String,
}

/// JoinRoom / LeaveRoom payload (ops 3, 4)
#[derive(Debug, Deserialize)]
pub struct RoomPayload {
    pub room: String,
}

/// SendMessage payload (op 5)
#[derive(Debug, Deserialize)]
pub struct SendMessagePayload {
    pub room: String,
    pub content: String,
}
