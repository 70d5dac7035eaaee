use crate::error::{RelayError, RelayResult};
use crate::types::ChatMessage;
use serde::{de::Error as _, Deserialize, Serialize};

/// Response body for `/dump`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DumpResponse {
    #[serde(rename = "chatHistory")]
    pub chat_history: Vec<ChatMessage>,
}

/// Decode one inbound websocket frame (text or binary payload).
///
/// The payload must be a JSON object; serde would otherwise accept a
/// positional array for the struct.
pub fn decode_frame(payload: &[u8]) -> RelayResult<ChatMessage> {
    let value: serde_json::Value = serde_json::from_slice(payload)?;
    if !value.is_object() {
        return Err(RelayError::Decode(serde_json::Error::custom(
            "expected a JSON object",
        )));
    }
    Ok(serde_json::from_value(value)?)
}

/// Encode a message as an outbound websocket text frame
pub fn encode_frame(msg: &ChatMessage) -> RelayResult<String> {
    Ok(serde_json::to_string(msg)?)
}

/// Render messages as a plain-text transcript, one `username: content` line each
pub fn render_transcript(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}\n", m.username, m.content))
        .collect()
}
