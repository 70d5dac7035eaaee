use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::stream::{Stream, StreamExt};
use std::sync::Arc;

use crate::connection::{Connection, WsConnection};
use crate::protocol::decode_frame;
use crate::sequencer::Sequencer;
use crate::state::AppState;

/// Why a connection's read loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// Close frame or end of stream
    PeerClosed,
    /// Frame did not decode into a chat message
    Decode,
    /// Transport error while reading
    Transport,
    /// The broadcaster marked this connection closed after a failed push
    Evicted,
    /// Nobody is consuming the sequencer any more
    SequencerClosed,
}

/// WebSocket upgrade handler
///
/// Any origin is accepted. A failed handshake only affects this request.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_failed_upgrade(|e| tracing::warn!("WebSocket upgrade failed: {}", e))
        .on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (sender, receiver) = socket.split();
    let conn = Arc::new(WsConnection::new(sender, state.config.write_timeout));
    let id = conn.id();

    state.registry.add(conn.clone()).await;
    tracing::info!("WebSocket connected: {}", id);

    let exit = read_loop(receiver, conn.as_ref(), &state.sequencer).await;

    state.registry.remove(id).await;
    conn.close().await;
    tracing::info!("WebSocket connection closed: {} ({:?})", id, exit);
}

/// Read frames until the connection ends, handing each decoded message to
/// the sequencer.
///
/// Nothing is enqueued once the connection is known to be closed.
pub async fn read_loop<S>(
    mut inbound: S,
    conn: &dyn Connection,
    sequencer: &Sequencer,
) -> LoopExit
where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    loop {
        let frame = tokio::select! {
            biased;
            _ = conn.closed() => return LoopExit::Evicted,
            frame = inbound.next() => frame,
        };

        if conn.is_closed() {
            return LoopExit::Evicted;
        }

        let decoded = match frame {
            Some(Ok(Message::Text(text))) => decode_frame(text.as_str().as_bytes()),
            Some(Ok(Message::Binary(data))) => decode_frame(&data),
            Some(Ok(Message::Close(_))) | None => return LoopExit::PeerClosed,
            // Pings are answered by the transport
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                tracing::warn!("WebSocket error on {}: {}", conn.id(), e);
                return LoopExit::Transport;
            }
        };

        match decoded {
            Ok(msg) => {
                tracing::debug!("Received message from {:?} on {}", msg.username, conn.id());
                if let Err(e) = sequencer.enqueue(msg) {
                    tracing::error!("Dropping connection {}: {}", conn.id(), e);
                    return LoopExit::SequencerClosed;
                }
            }
            Err(e) => {
                tracing::warn!("Closing {} after malformed frame: {}", conn.id(), e);
                return LoopExit::Decode;
            }
        }
    }
}
