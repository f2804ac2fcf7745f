pub mod handlers;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{
    sink::{Sink, SinkExt},
    stream::{Stream, StreamExt},
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

use crate::broadcast::{Connected, RoomHandle};
use crate::error::GameResult;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;

/// A socket that cannot take a message within this window is dropped
const SEND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub room: Option<String>,
    pub name: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::info!("WebSocket connection request: room={:?}", params.room);

    ws.on_upgrade(move |socket| handle_socket(socket, params, state))
}

async fn send_json<S>(sender: &mut S, msg: &ServerMessage) -> bool
where
    S: Sink<Message> + Unpin,
{
    let json = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!("Failed to serialize server message: {}", e);
            return true;
        }
    };
    matches!(
        tokio::time::timeout(SEND_TIMEOUT, sender.send(Message::Text(json.into()))).await,
        Ok(Ok(()))
    )
}

async fn bind(
    state: &AppState,
    code: Option<&str>,
    name: Option<String>,
) -> GameResult<(RoomHandle, Connected)> {
    let room = state.resolve_room(code).await?;
    let connected = room.connect(name).await?;
    Ok((room, connected))
}

/// Wait for a join naming a room we can enter. `None` when the socket went away.
async fn wait_for_room<S, R>(
    state: &AppState,
    sender: &mut S,
    receiver: &mut R,
) -> Option<(RoomHandle, Connected)>
where
    S: Sink<Message> + Unpin,
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => match handlers::parse_message(&text) {
                Ok(ClientMessage::Join { name, room }) => {
                    match bind(state, room.as_deref(), Some(name)).await {
                        Ok(bound) => return Some(bound),
                        Err(e) => {
                            if !send_json(sender, &ServerMessage::from(&e)).await {
                                return None;
                            }
                        }
                    }
                }
                Ok(other) => {
                    tracing::debug!("Ignoring {:?} from a socket without a room", other);
                }
                Err(error) => {
                    if !send_json(sender, &error).await {
                        return None;
                    }
                }
            },
            Some(Ok(Message::Ping(data))) => {
                if sender.send(Message::Pong(data)).await.is_err() {
                    return None;
                }
            }
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
            Some(Ok(_)) => {}
        }
    }
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, params: WsQuery, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let bound = match bind(&state, params.room.as_deref(), params.name).await {
        Ok(bound) => Some(bound),
        Err(e) => {
            tracing::info!("Could not enter room: {}", e);
            if send_json(&mut sender, &ServerMessage::from(&e)).await {
                wait_for_room(&state, &mut sender, &mut receiver).await
            } else {
                None
            }
        }
    };
    let Some((room, connected)) = bound else {
        tracing::info!("WebSocket closed before joining a room");
        return;
    };

    run_session(sender, receiver, room, connected).await;
}

/// Serve a socket bound to a player: identity first, then room updates and
/// client messages until either side goes away.
async fn run_session<S, R>(mut sender: S, mut receiver: R, room: RoomHandle, connected: Connected)
where
    S: Sink<Message> + Unpin,
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let Connected {
        connection,
        player_id,
        mut updates,
    } = connected;
    tracing::info!(room = %room.code(), player = %player_id, "WebSocket bound");

    let identity = ServerMessage::Identity {
        id: player_id.clone(),
    };
    if send_json(&mut sender, &identity).await {
        loop {
            tokio::select! {
                update = updates.recv() => {
                    match update {
                        Ok(msg) => {
                            if !send_json(&mut sender, &msg).await {
                                tracing::info!(room = %room.code(), player = %player_id, "Slow or gone client, dropping");
                                break;
                            }
                        }
                        // Only the latest snapshot matters
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::debug!(room = %room.code(), skipped, "Client lagging behind");
                        }
                        Err(RecvError::Closed) => {
                            tracing::info!(room = %room.code(), "Room closed, ending socket");
                            break;
                        }
                    }
                }

                ws_msg = receiver.next() => {
                    match ws_msg {
                        Some(Ok(Message::Text(text))) => {
                            tracing::debug!("Received message: {}", text);

                            let response = match handlers::parse_message(&text) {
                                Ok(msg) => handlers::handle_message(msg, connection, &room).await,
                                Err(error) => Some(error),
                            };
                            if let Some(response) = response {
                                if !send_json(&mut sender, &response).await {
                                    break;
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) => {
                            tracing::info!("WebSocket closed");
                            break;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if sender.send(Message::Pong(data)).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::error!("WebSocket error: {}", e);
                            break;
                        }
                        None => break,
                    }
                }
            }
        }
    }

    room.disconnect(connection).await;
    tracing::info!(room = %room.code(), player = %player_id, "WebSocket connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::protocol::CreateRoomRequest;
    use futures::channel::mpsc;

    async fn next_json(frames: &mut mpsc::Receiver<Message>) -> serde_json::Value {
        match frames.next().await {
            Some(Message::Text(text)) => serde_json::from_str(text.as_str()).unwrap(),
            other => panic!("expected a text frame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_identity_is_sent_once_before_first_state() {
        let state = AppState::new(Config::default());
        let room = state.create_room(CreateRoomRequest::default()).await;
        let connected = room.connect(Some("Alice".into())).await.unwrap();
        let player_id = connected.player_id.clone();

        let (out_tx, mut out_rx) = mpsc::channel::<Message>(16);
        let (mut in_tx, in_rx) = mpsc::channel::<Result<Message, axum::Error>>(16);
        let session = tokio::spawn(run_session(out_tx, in_rx, room.clone(), connected));

        let first = next_json(&mut out_rx).await;
        assert_eq!(first["type"], "identity");
        assert_eq!(first["id"], player_id.as_str());

        let second = next_json(&mut out_rx).await;
        assert_eq!(second["type"], "state");
        assert_eq!(second["players"][0]["name"], "Alice");

        // Bad frames are answered on the same socket
        in_tx.send(Ok(Message::Text("nope".into()))).await.unwrap();
        let reply = next_json(&mut out_rx).await;
        assert_eq!(reply["code"], "PARSE_ERROR");

        drop(in_tx);
        session.await.unwrap();
        while let Some(frame) = out_rx.next().await {
            if let Message::Text(text) = frame {
                let json: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
                assert_ne!(json["type"], "identity");
            }
        }

        let snap = room.snapshot().await.unwrap();
        assert!(!snap.player(&player_id).unwrap().connected);
    }
}
