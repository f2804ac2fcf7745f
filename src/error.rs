//! Error taxonomy for room operations.
//!
//! Only `RoomUnavailable` and `RoomFull` ever reach a client. Everything else
//! is a stale or out-of-turn message that the room actor logs and drops.

use crate::types::{ConnectionId, PlayerId, RoomPhase, ValidationId};

pub type GameResult<T> = Result<T, GameError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("Room {0} is unavailable")]
    RoomUnavailable(String),

    #[error("Room {0} is full")]
    RoomFull(String),

    #[error("No round is active")]
    RoundNotActive,

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Validation {0} is not open")]
    ValidationNotOpen(ValidationId),

    #[error("Players cannot vote on their own answer")]
    SelfVoteForbidden,

    #[error("Vote already cast")]
    AlreadyVoted,

    #[error("Player {0} is not eligible to vote")]
    NotEligible(PlayerId),

    #[error("Cannot {action} while the room is in {from:?}")]
    InvalidTransition {
        from: RoomPhase,
        action: &'static str,
    },

    #[error("The game is over")]
    GameOver,

    #[error("Timer event for round {0} is stale")]
    StaleTimer(u32),

    #[error("Connection {0} is not bound to a player")]
    UnknownConnection(ConnectionId),
}

impl GameError {
    /// Stable machine-readable code used in `{type:"error"}` messages
    pub fn code(&self) -> &'static str {
        match self {
            GameError::RoomUnavailable(_) => "ROOM_UNAVAILABLE",
            GameError::RoomFull(_) => "ROOM_FULL",
            GameError::RoundNotActive => "ROUND_NOT_ACTIVE",
            GameError::UnknownCategory(_) => "UNKNOWN_CATEGORY",
            GameError::ValidationNotOpen(_) => "VALIDATION_NOT_OPEN",
            GameError::SelfVoteForbidden => "SELF_VOTE_FORBIDDEN",
            GameError::AlreadyVoted => "ALREADY_VOTED",
            GameError::NotEligible(_) => "NOT_ELIGIBLE",
            GameError::InvalidTransition { .. } => "INVALID_TRANSITION",
            GameError::GameOver => "GAME_OVER",
            GameError::StaleTimer(_) => "STALE_TIMER",
            GameError::UnknownConnection(_) => "UNKNOWN_CONNECTION",
        }
    }

    /// Whether the requesting client should be told about this error
    pub fn is_client_visible(&self) -> bool {
        matches!(self, GameError::RoomUnavailable(_) | GameError::RoomFull(_))
    }
}
