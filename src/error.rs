use std::time::Duration;

/// Result type for relay operations
pub type RelayResult<T> = Result<T, RelayError>;

/// Errors that can occur while relaying chat messages.
///
/// Every variant is scoped to a single connection or request; none of them
/// should take the whole server down.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Failed to decode inbound frame: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Failed to deliver frame: {0}")]
    Delivery(#[from] axum::Error),

    #[error("Delivery timed out after {0:?}")]
    DeliveryTimeout(Duration),

    #[error("Connection already closed")]
    ConnectionClosed,

    #[error("Sequencer is closed, broadcaster has stopped")]
    SequencerClosed,

    #[error("Broadcaster is already running")]
    BroadcasterRunning,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
