//! WebSocket message dispatch
//!
//! Messages from a bound socket are forwarded to the room actor. Rejections
//! are stale or out-of-turn messages and stay silent, except the few errors
//! a client can act on. A bound socket stays in its room: the room code of
//! a later join is not looked at, only the new name is.

use crate::broadcast::RoomHandle;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::types::ConnectionId;

/// Handle client messages and return optional response
pub async fn handle_message(
    msg: ClientMessage,
    connection: ConnectionId,
    room: &RoomHandle,
) -> Option<ServerMessage> {
    match room.send(connection, msg).await {
        Ok(()) => None,
        Err(e) if e.is_client_visible() => Some(ServerMessage::from(&e)),
        Err(e) => {
            tracing::debug!(room = %room.code(), connection, "Dropped message: {}", e);
            None
        }
    }
}

/// Parse one text frame
pub fn parse_message(text: &str) -> Result<ClientMessage, ServerMessage> {
    serde_json::from_str::<ClientMessage>(text).map_err(|e| {
        tracing::warn!("Failed to parse client message: {}", e);
        ServerMessage::Error {
            code: "PARSE_ERROR".to_string(),
            msg: format!("Invalid message format: {}", e),
        }
    })
}
