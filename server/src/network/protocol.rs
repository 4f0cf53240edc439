// polypong/server/src/network/protocol.rs
//! JSON envelopes exchanged over the WebSocket: `{"event": <name>, "data": <payload>}`.

use crate::core::error::{ServerError, ServerResult};
use crate::core::types::{EdgeIndex, GameState, Vec2};
use serde::{Deserialize, Serialize};

// --- Client -> Server ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    JoinRoom(JoinRoomPayload),
    Input(InputPayload),
    ToggleReady(ToggleReadyPayload),
    /// Older clients; same as `toggleReady{isReady: true}`.
    RequestRestart,
}

/// `joinRoom` accepts either a bare room id string or `{roomId, instance?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JoinRoomPayload {
    Legacy(String),
    Detailed {
        #[serde(rename = "roomId")]
        room_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        instance: Option<String>,
    },
}

impl JoinRoomPayload {
    pub fn room_id(&self) -> &str {
        match self {
            JoinRoomPayload::Legacy(id) => id,
            JoinRoomPayload::Detailed { room_id, .. } => room_id,
        }
    }

    pub fn instance(&self) -> Option<&str> {
        match self {
            JoinRoomPayload::Legacy(_) => None,
            JoinRoomPayload::Detailed { instance, .. } => instance.as_deref(),
        }
    }
}

/// `dir` is kept raw so out-of-range values can be logged and dropped instead of
/// failing the whole frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputPayload {
    pub dir: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleReadyPayload {
    #[serde(rename = "isReady")]
    pub is_ready: bool,
}

// --- Server -> Client ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    Init(InitPayload),
    GameState(GameStatePayload),
    GameEvent(GameEventPayload),
    GameTerminated(TerminatedPayload),
    Error(ErrorPayload),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitPayload {
    /// -1 for spectators.
    pub player_index: i32,
    pub sides: usize,
    #[serde(default)]
    pub instance_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaddleState {
    pub edge_index: EdgeIndex,
    pub position: f32,
    pub width: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStatePayload {
    pub ball: Vec2,
    pub rotation: f32,
    pub paddles: Vec<PaddleState>,
    pub ready_edges: Vec<EdgeIndex>,
    pub difficulty: f32,
    pub game_state: GameState,
    pub score: u32,
    pub last_score: u32,
    pub final_time: u32,
    pub time_elapsed: f32,
    pub score_display_timer: f32,
    pub countdown_timer: f32,
    /// Unix millis at broadcast.
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GameEventPayload {
    /// Paddle hit or wall bounce.
    Bounce {
        #[serde(rename = "edgeIndex")]
        edge_index: EdgeIndex,
    },
    Goal {
        #[serde(rename = "edgeIndex")]
        edge_index: EdgeIndex,
        score: u32,
        time: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminatedPayload {
    pub reason: String,
    pub last_score: u32,
    pub final_time: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_instance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_instance: Option<String>,
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error(ErrorPayload {
            message: message.into(),
            expected_instance: None,
            current_instance: None,
        })
    }

    pub fn wrong_instance(expected: &str, current: &str) -> Self {
        ServerMessage::Error(ErrorPayload {
            message: "Connected to wrong instance".to_string(),
            expected_instance: Some(expected.to_string()),
            current_instance: Some(current.to_string()),
        })
    }

    pub fn to_json(&self) -> ServerResult<String> {
        serde_json::to_string(self)
            .map_err(|e| ServerError::ProtocolError(format!("failed to encode {:?}: {}", self, e)))
    }
}

/// Body of `GET /api/instance`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceInfo {
    pub instance_id: String,
    pub is_fly_instance: bool,
}

pub fn parse_client_message(text: &str) -> ServerResult<ClientMessage> {
    serde_json::from_str(text).map_err(|e| ServerError::ProtocolError(format!("malformed message: {}", e)))
}

pub fn parse_server_message(text: &str) -> ServerResult<ServerMessage> {
    serde_json::from_str(text).map_err(|e| ServerError::ProtocolError(format!("malformed message: {}", e)))
}
