use crate::connection::Connection;
use crate::error::{RelayError, RelayResult};
use crate::protocol::encode_frame;
use crate::sequencer::SequencerRx;
use crate::state::{AppState, Visit};
use crate::types::{ChatMessage, ConnectionId};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Summary of one broadcast pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub delivered: usize,
    pub evicted: Vec<ConnectionId>,
}

/// Run one broadcast pass: record the message in history, then push it to
/// every registered connection in turn.
///
/// A failed push marks that recipient closed and evicts it; the pass carries
/// on with the rest. Releasing the evicted socket is left to its own read
/// loop task, so no close handshake runs under the registry lock. The
/// history entry stays no matter how many pushes fail.
pub async fn broadcast_message(state: &AppState, msg: ChatMessage) -> PassReport {
    let frame: Arc<str> = match encode_frame(&msg) {
        Ok(json) => json.into(),
        Err(e) => {
            tracing::error!("Failed to encode message, not broadcasting: {}", e);
            return PassReport::default();
        }
    };

    state.history.append(msg).await;

    let outcome = state
        .registry
        .for_each_alive(|conn| {
            let frame = frame.clone();
            async move { push_or_evict(conn.as_ref(), &frame).await }
        })
        .await;

    if !outcome.evicted.is_empty() {
        tracing::info!(
            evicted = outcome.evicted.len(),
            "Dropped recipients after failed delivery"
        );
    }

    PassReport {
        delivered: outcome.visited - outcome.evicted.len(),
        evicted: outcome.evicted,
    }
}

async fn push_or_evict(conn: &dyn Connection, frame: &str) -> Visit {
    match conn.push(frame).await {
        Ok(()) => Visit::Keep,
        Err(e) => {
            tracing::warn!("Delivery to {} failed, evicting: {}", conn.id(), e);
            conn.mark_closed();
            Visit::Evict
        }
    }
}

/// Consume the sequencer until every producer is gone
pub async fn run_broadcaster(state: Arc<AppState>, mut rx: SequencerRx) {
    tracing::info!("Broadcaster started");
    while let Some(msg) = rx.dequeue().await {
        tracing::debug!("Broadcasting message from {:?}", msg.username);
        broadcast_message(&state, msg).await;
    }
    tracing::info!("Broadcaster stopped, sequencer closed");
}

/// Spawn the single broadcaster task for this state
pub fn spawn_broadcaster(state: Arc<AppState>) -> RelayResult<JoinHandle<()>> {
    let rx = state
        .take_sequencer_rx()
        .ok_or(RelayError::BroadcasterRunning)?;
    Ok(tokio::spawn(run_broadcaster(state, rx)))
}
