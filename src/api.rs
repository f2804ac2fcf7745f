//! HTTP API endpoints for room management.
//!
//! These endpoints are used by the lobby pages to create, configure and
//! inspect rooms. Everything played inside a room goes over the websocket.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::error::GameError;
use crate::protocol::{CreateRoomRequest, CreateRoomResponse, JoinRoomRequest, StatusResponse};
use crate::state::AppState;
use crate::types::{RoomPhase, SettingsUpdate};

fn error_response(err: GameError) -> Response {
    let status = match &err {
        GameError::RoomUnavailable(_) => StatusCode::NOT_FOUND,
        GameError::RoomFull(_) | GameError::GameOver | GameError::InvalidTransition { .. } => {
            StatusCode::CONFLICT
        }
        _ => StatusCode::BAD_REQUEST,
    };
    (status, Json(crate::protocol::ServerMessage::from(&err))).into_response()
}

/// Create a room.
///
/// POST /rooms
pub async fn create_room(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateRoomRequest>,
) -> Json<CreateRoomResponse> {
    let handle = state.create_room(request).await;
    Json(CreateRoomResponse {
        code: handle.code().to_string(),
    })
}

/// Check that a room can be entered.
///
/// POST /rooms/join
pub async fn join_room(
    State(state): State<Arc<AppState>>,
    Json(request): Json<JoinRoomRequest>,
) -> Response {
    let handle = match state.get_room(&request.code).await {
        Ok(handle) => handle,
        Err(e) => return error_response(e),
    };
    let snapshot = match handle.snapshot().await {
        Ok(snapshot) => snapshot,
        Err(e) => return error_response(e),
    };

    if snapshot.phase == RoomPhase::GameOver {
        return error_response(GameError::GameOver);
    }
    let present = snapshot.players.iter().filter(|p| p.connected).count();
    if present >= state.config.defaults.max_players {
        return error_response(GameError::RoomFull(snapshot.code));
    }

    Json(StatusResponse {
        status: "ok".to_string(),
        code: Some(snapshot.code),
    })
    .into_response()
}

/// Current room snapshot.
///
/// GET /rooms/{code}
pub async fn get_room(State(state): State<Arc<AppState>>, Path(code): Path<String>) -> Response {
    let handle = match state.get_room(&code).await {
        Ok(handle) => handle,
        Err(e) => return error_response(e),
    };
    match handle.snapshot().await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => error_response(e),
    }
}

/// Replace room settings. Scores are reset and the room returns to the lobby.
///
/// POST /rooms/{code}/config
pub async fn configure_room(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(update): Json<SettingsUpdate>,
) -> Response {
    let handle = match state.get_room(&code).await {
        Ok(handle) => handle,
        Err(e) => return error_response(e),
    };
    match handle.configure(update).await {
        Ok(()) => Json(StatusResponse::ok()).into_response(),
        Err(e) => error_response(e),
    }
}

/// Start the first round.
///
/// POST /rooms/{code}/start
pub async fn start_room(State(state): State<Arc<AppState>>, Path(code): Path<String>) -> Response {
    let handle = match state.get_room(&code).await {
        Ok(handle) => handle,
        Err(e) => return error_response(e),
    };
    match handle.start().await {
        Ok(()) => Json(StatusResponse::ok()).into_response(),
        Err(e) => error_response(e),
    }
}

/// Tear a room down.
///
/// DELETE /rooms/{code}
pub async fn delete_room(State(state): State<Arc<AppState>>, Path(code): Path<String>) -> Response {
    match state.remove_room(&code).await {
        Ok(()) => Json(StatusResponse::ok()).into_response(),
        Err(e) => error_response(e),
    }
}
