//! HTTP endpoints next to the websocket: history dump and transcript save.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::RelayResult;
use crate::protocol::{render_transcript, DumpResponse};
use crate::state::AppState;
use crate::types::ChatMessage;

pub const SAVE_SUCCESS_BODY: &str = "Chat data saved successfully!";

/// Return the full chat history.
///
/// ANY /dump
pub async fn dump_history(State(state): State<Arc<AppState>>) -> Json<DumpResponse> {
    let chat_history = state.history.snapshot().await;
    tracing::debug!("Dumping {} history entries", chat_history.len());
    Json(DumpResponse { chat_history })
}

/// Write a posted chat log to a timestamped transcript file.
///
/// POST /save_chat
///
/// Body is a JSON array of messages, typically the `chatHistory` from `/dump`.
pub async fn save_chat(
    State(state): State<Arc<AppState>>,
    Json(messages): Json<Vec<ChatMessage>>,
) -> Response {
    match write_transcript(&state.config.save_dir, &messages, Local::now()).await {
        Ok(path) => {
            tracing::info!(
                "Saved {} messages to {}",
                messages.len(),
                path.display()
            );
            (StatusCode::OK, SAVE_SUCCESS_BODY).into_response()
        }
        Err(e) => {
            tracing::error!("Failed to save chat transcript: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to save chat: {}", e),
            )
                .into_response()
        }
    }
}

/// File name for a transcript saved at `now`
pub fn transcript_file_name(now: DateTime<Local>) -> String {
    now.format("websocket_chat_history_%Y_%m_%d_%H_%M_%S.txt")
        .to_string()
}

/// Write `messages` as a transcript into `dir`, returning the file path
pub async fn write_transcript(
    dir: &Path,
    messages: &[ChatMessage],
    now: DateTime<Local>,
) -> RelayResult<PathBuf> {
    let path = dir.join(transcript_file_name(now));
    tokio::fs::write(&path, render_transcript(messages)).await?;
    Ok(path)
}
