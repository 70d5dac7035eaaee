// Public API for integration tests and potential library usage

pub mod api;
pub mod broadcast;
pub mod config;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod sequencer;
pub mod state;
pub mod types;
pub mod ws;

use axum::{
    routing::{any, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use state::AppState;

/// Build the HTTP router: websocket, history dump, transcript save, and
/// static files for every other path.
pub fn app(state: Arc<AppState>) -> Router {
    let static_files = ServeDir::new(&state.config.static_dir);

    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/dump", any(api::dump_history))
        .route("/save_chat", post(api::save_chat))
        .fallback_service(static_files)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
