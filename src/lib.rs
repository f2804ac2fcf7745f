// Public API for integration tests and potential library usage

pub mod api;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod protocol;
pub mod state;
pub mod store;
pub mod types;
pub mod ws;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

/// Full HTTP surface: room API, websocket and static files
pub fn app(state: Arc<state::AppState>) -> Router {
    let static_dir = state.config.static_dir.clone();

    Router::new()
        .route("/rooms", post(api::create_room))
        .route("/rooms/join", post(api::join_room))
        .route("/rooms/{code}", get(api::get_room).delete(api::delete_room))
        .route("/rooms/{code}/config", post(api::configure_room))
        .route("/rooms/{code}/start", post(api::start_room))
        .route("/ws", get(ws::ws_handler))
        .fallback_service(ServeDir::new(static_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
