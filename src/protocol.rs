use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Join {
        #[serde(default)]
        name: String,
        /// Only honoured while the socket is not yet bound to a room
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room: Option<RoomCode>,
    },
    Answers {
        #[serde(default)]
        answers: HashMap<String, String>,
    },
    /// Restart vote
    Ready,
    Validate {
        #[serde(rename = "validationId")]
        validation_id: ValidationId,
        approve: bool,
    },
    Start,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once per connection, before the first snapshot
    Identity { id: PlayerId },
    State(RoomSnapshot),
    Error { code: String, msg: String },
}

impl From<&crate::error::GameError> for ServerMessage {
    fn from(err: &crate::error::GameError) -> Self {
        ServerMessage::Error {
            code: err.code().to_string(),
            msg: err.to_string(),
        }
    }
}

/// Complete broadcastable state of a room
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub code: RoomCode,
    pub phase: RoomPhase,
    pub letter: String,
    pub remaining_seconds: u32,
    pub round_number: u32,
    pub round_limit: u32,
    pub round_active: bool,
    pub waiting_restart: bool,
    pub game_over: bool,
    pub categories: Vec<String>,
    pub round_duration: u32,
    pub players: Vec<Player>,
    pub active_players: usize,
    pub ready_count: usize,
    pub ready_total: usize,
    pub ready_threshold: usize,
    pub validation_enabled: bool,
    pub validation_active: bool,
    pub validation_entry: Option<ValidationView>,
    pub validation_pending: usize,
    pub server_now: String,
}

impl RoomSnapshot {
    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }
}

/// The open validation entry as shown to clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationView {
    pub id: ValidationId,
    pub player_id: PlayerId,
    pub player_name: String,
    pub category: String,
    pub answer: String,
    /// Number of votes cast so far
    pub votes: usize,
    pub required: usize,
    pub approvals: BTreeMap<PlayerId, bool>,
    pub completed: bool,
    pub accepted: bool,
}

/// Body of `POST /rooms`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateRoomRequest {
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub rounds: Option<u32>,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub validation: Option<bool>,
    /// Known answers per category; enables list-based automatic scoring
    #[serde(default, rename = "wordList")]
    pub word_list: Option<HashMap<String, Vec<String>>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoomResponse {
    pub code: RoomCode,
}

/// Body of `POST /rooms/join`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRoomRequest {
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<RoomCode>,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            code: None,
        }
    }
}
