use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{Request, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use petitbac::api;
use petitbac::broadcast::{Connected, RoomHandle};
use petitbac::config::Config;
use petitbac::error::GameError;
use petitbac::protocol::{ClientMessage, CreateRoomRequest, JoinRoomRequest, ServerMessage};
use petitbac::state::AppState;
use petitbac::store::JsonFileStore;
use petitbac::types::{RoomPhase, SettingsUpdate, DEFAULT_ROOM_CODE};
use petitbac::ws::handlers::handle_message;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn answers(category: &str, text: &str) -> ClientMessage {
    ClientMessage::Answers {
        answers: [(category.to_string(), text.to_string())].into_iter().collect(),
    }
}

async fn animal_room(state: &AppState, duration: u32, rounds: u32) -> RoomHandle {
    state
        .create_room(CreateRoomRequest {
            categories: vec!["Animal".to_string()],
            duration: Some(duration),
            rounds: Some(rounds),
            host: "Host".to_string(),
            ..CreateRoomRequest::default()
        })
        .await
}

async fn connect_all(room: &RoomHandle, names: &[&str]) -> Vec<Connected> {
    let mut players = Vec::new();
    for name in names {
        players.push(room.connect(Some(name.to_string())).await.unwrap());
    }
    players
}

/// Approve the open entry from every other player
async fn approve_open_entry(room: &RoomHandle, players: &[Connected]) {
    let snap = room.snapshot().await.unwrap();
    let entry = snap.validation_entry.expect("an entry should be open");
    for p in players.iter().filter(|p| p.player_id != entry.player_id) {
        room.send(
            p.connection,
            ClientMessage::Validate {
                validation_id: entry.id,
                approve: true,
            },
        )
        .await
        .unwrap();
    }
}

/// End-to-end: four players, one round, every answer approved, quorum restart ends the game
#[tokio::test]
async fn test_full_game_flow() {
    let state = Arc::new(AppState::new(Config::default()));
    let room = animal_room(&state, 60, 1).await;
    let mut players = connect_all(&room, &["Ana", "Ben", "Cleo", "Dan"]).await;

    // First update a socket sees is the state that includes itself
    match players[0].updates.recv().await {
        Ok(ServerMessage::State(snap)) => {
            assert!(snap.player(&players[0].player_id).is_some());
            assert_eq!(snap.phase, RoomPhase::Lobby);
        }
        other => panic!("Expected state, got {:?}", other),
    }

    room.start().await.unwrap();
    let snap = room.snapshot().await.unwrap();
    assert!(snap.round_active);
    assert_eq!(snap.round_number, 1);
    assert_eq!(snap.letter.len(), 1);
    assert_eq!(snap.active_players, 4);

    for (p, word) in players.iter().zip(["Bison", "Baleine", "Blaireau", "Bouquetin"]) {
        room.send(p.connection, answers("Animal", word)).await.unwrap();
    }

    let snap = room.snapshot().await.unwrap();
    assert_eq!(snap.phase, RoomPhase::RoundClosing);
    assert!(snap.validation_active);
    assert_eq!(snap.validation_pending, 4);
    let entry = snap.validation_entry.unwrap();
    assert_eq!(entry.required, 3);
    assert_eq!(entry.player_name, "Ana");

    for _ in 0..4 {
        approve_open_entry(&room, &players).await;
    }

    let snap = room.snapshot().await.unwrap();
    assert_eq!(snap.phase, RoomPhase::WaitingRestart);
    assert_eq!(snap.ready_total, 4);
    assert_eq!(snap.ready_threshold, 2);
    for p in &players {
        assert_eq!(snap.player(&p.player_id).unwrap().total_score, 1.0);
    }

    room.send(players[0].connection, ClientMessage::Ready).await.unwrap();
    assert_eq!(room.snapshot().await.unwrap().ready_count, 1);
    room.send(players[1].connection, ClientMessage::Ready).await.unwrap();

    let snap = room.snapshot().await.unwrap();
    assert!(snap.game_over);
    assert_eq!(snap.phase, RoomPhase::GameOver);

    // Nobody new gets into a finished game
    assert!(matches!(
        room.connect(Some("Eve".to_string())).await,
        Err(GameError::RoomUnavailable(_))
    ));
}

#[tokio::test]
async fn test_duplicate_answers_only_first_goes_to_vote() {
    let state = AppState::new(Config::default());
    let room = animal_room(&state, 60, 1).await;
    let players = connect_all(&room, &["Ana", "Ben"]).await;
    room.start().await.unwrap();

    room.send(players[0].connection, answers("Animal", "Bison"))
        .await
        .unwrap();
    room.send(players[1].connection, answers("Animal", "bison"))
        .await
        .unwrap();

    let snap = room.snapshot().await.unwrap();
    assert_eq!(snap.phase, RoomPhase::RoundClosing);
    assert_eq!(snap.validation_pending, 1);
    assert_eq!(snap.validation_entry.unwrap().player_id, players[0].player_id);

    approve_open_entry(&room, &players).await;
    let snap = room.snapshot().await.unwrap();
    assert_eq!(snap.phase, RoomPhase::WaitingRestart);
    assert_eq!(snap.player(&players[0].player_id).unwrap().score, 1.0);
    assert_eq!(snap.player(&players[1].player_id).unwrap().score, 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_timer_expiry_closes_round() {
    let state = AppState::new(Config::default());
    let room = animal_room(&state, 15, 2).await;
    let players = connect_all(&room, &["Ana", "Ben", "Cleo"]).await;
    room.start().await.unwrap();
    room.send(players[0].connection, answers("Animal", "Bison"))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(5_500)).await;
    let snap = room.snapshot().await.unwrap();
    assert!(snap.round_active);
    assert_eq!(snap.remaining_seconds, 10);

    tokio::time::sleep(Duration::from_secs(10)).await;
    let snap = room.snapshot().await.unwrap();
    assert_eq!(snap.phase, RoomPhase::RoundClosing);
    assert!(!snap.round_active);
    assert_eq!(snap.remaining_seconds, 0);
    let entry = snap.validation_entry.unwrap();
    assert_eq!(entry.player_id, players[0].player_id);
    assert_eq!(entry.required, 2);

    // Late answers are dropped
    assert_eq!(
        room.send(players[1].connection, answers("Animal", "Baleine")).await,
        Err(GameError::RoundNotActive)
    );
}

#[tokio::test]
async fn test_disconnect_keeps_scoreboard_and_unblocks_vote() {
    let state = AppState::new(Config::default());
    let room = animal_room(&state, 60, 3).await;
    let players = connect_all(&room, &["Ana", "Ben", "Cleo"]).await;
    room.start().await.unwrap();

    room.send(players[0].connection, answers("Animal", "Bison"))
        .await
        .unwrap();
    room.send(players[1].connection, answers("Animal", ""))
        .await
        .unwrap();
    room.send(players[2].connection, answers("Animal", ""))
        .await
        .unwrap();

    let entry = room.snapshot().await.unwrap().validation_entry.unwrap();
    room.send(
        players[1].connection,
        ClientMessage::Validate {
            validation_id: entry.id,
            approve: true,
        },
    )
    .await
    .unwrap();

    room.disconnect(players[2].connection).await;
    let snap = room.snapshot().await.unwrap();
    assert_eq!(snap.phase, RoomPhase::WaitingRestart);
    assert_eq!(snap.players.len(), 3);
    let gone = snap.player(&players[2].player_id).unwrap();
    assert!(!gone.connected);
    assert_eq!(snap.ready_total, 2);
    assert_eq!(snap.player(&players[0].player_id).unwrap().total_score, 1.0);
}

#[tokio::test]
async fn test_room_capacity() {
    let state = AppState::new(Config::default());
    let room = animal_room(&state, 60, 1).await;
    let _players = connect_all(&room, &["A", "B", "C", "D", "E"]).await;

    assert!(matches!(
        room.connect(Some("F".to_string())).await,
        Err(GameError::RoomFull(_))
    ));
}

#[tokio::test]
async fn test_websocket_dispatch_errors() {
    let state = AppState::new(Config::default());
    let room = animal_room(&state, 60, 1).await;
    let players = connect_all(&room, &["Ana", "Ben"]).await;

    // Voting outside of validation is dropped silently
    let response = handle_message(
        ClientMessage::Validate {
            validation_id: 1,
            approve: true,
        },
        players[0].connection,
        &room,
    )
    .await;
    assert!(response.is_none());

    // A join updates the display name
    handle_message(
        ClientMessage::Join {
            name: "Anabel".to_string(),
            room: None,
        },
        players[0].connection,
        &room,
    )
    .await;
    let snap = room.snapshot().await.unwrap();
    assert_eq!(snap.player(&players[0].player_id).unwrap().name, "Anabel");

    // Start from any joined socket
    assert!(handle_message(ClientMessage::Start, players[1].connection, &room)
        .await
        .is_none());
    assert!(room.snapshot().await.unwrap().round_active);
}

#[tokio::test]
async fn test_default_room() {
    let state = AppState::new(Config::default());
    let room = state.resolve_room(None).await.unwrap();
    assert_eq!(room.code(), DEFAULT_ROOM_CODE);

    let player = room.connect(None).await.unwrap();
    assert!(player.player_id.starts_with("p-classic-"));
}

#[tokio::test]
async fn test_api_room_lifecycle() {
    let state = Arc::new(AppState::new(Config::default()));

    let Json(created) = api::create_room(
        State(state.clone()),
        Json(CreateRoomRequest {
            categories: vec!["Animal".to_string(), "Pays".to_string()],
            duration: Some(45),
            rounds: Some(2),
            host: "Host".to_string(),
            ..CreateRoomRequest::default()
        }),
    )
    .await;
    assert_eq!(created.code.len(), 5);

    let response = api::join_room(
        State(state.clone()),
        Json(JoinRoomRequest {
            code: created.code.to_lowercase(),
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = api::join_room(
        State(state.clone()),
        Json(JoinRoomRequest {
            code: "NOPE9".to_string(),
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = api::start_room(State(state.clone()), Path(created.code.clone())).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = api::start_room(State(state.clone()), Path(created.code.clone())).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = api::configure_room(
        State(state.clone()),
        Path(created.code.clone()),
        Json(SettingsUpdate {
            rounds: Some(3),
            ..SettingsUpdate::default()
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let room = state.get_room(&created.code).await.unwrap();
    let snap = room.snapshot().await.unwrap();
    assert_eq!(snap.phase, RoomPhase::Lobby);
    assert_eq!(snap.round_limit, 3);
    assert_eq!(snap.round_duration, 45);

    let response = api::delete_room(State(state.clone()), Path(created.code.clone()))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::OK);
    let response = api::get_room(State(state.clone()), Path(created.code.clone())).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_router_serves_snapshot() {
    let state = Arc::new(AppState::new(Config::default()));
    let room = animal_room(&state, 60, 1).await;
    let app = petitbac::app(state.clone());

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/rooms/{}", room.code()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["code"], room.code());
    assert_eq!(json["phase"], "LOBBY");
    assert_eq!(json["categories"], serde_json::json!(["Animal"]));
}

#[tokio::test]
async fn test_scoreboard_is_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonFileStore::new(dir.path()));
    let state = AppState::with_store(Config::default(), store.clone());

    let room = animal_room(&state, 60, 1).await;
    let players = connect_all(&room, &["Ana", "Ben"]).await;
    room.start().await.unwrap();
    room.send(players[0].connection, answers("Animal", "Bison"))
        .await
        .unwrap();
    room.send(players[1].connection, answers("Animal", ""))
        .await
        .unwrap();
    approve_open_entry(&room, &players).await;
    assert_eq!(room.snapshot().await.unwrap().phase, RoomPhase::WaitingRestart);

    // Store writes run in the background
    let mut saved = None;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        if let Some(file) = store.load(room.code()).await.unwrap() {
            if file.players.iter().any(|p| p.total_score > 0.0) {
                saved = Some(file);
                break;
            }
        }
    }

    let file = saved.expect("scoreboard should be saved");
    assert_eq!(file.room.host, "Host");
    assert_eq!(file.room.categories, vec!["Animal"]);
    let ana = file.players.iter().find(|p| p.pseudo == "Ana").unwrap();
    assert_eq!(ana.total_score, 1.0);
}
