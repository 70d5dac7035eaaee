use serde::{Deserialize, Serialize};
use std::fmt;

/// A single chat message as sent by a client and relayed to every subscriber.
///
/// Ordering is decided by the sequencer, not by any field on the message.
/// Missing fields decode as empty strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChatMessage {
    pub username: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(username: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            content: content.into(),
        }
    }
}

/// Opaque id for one upgraded websocket connection. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(ulid::Ulid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
