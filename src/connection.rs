//! Connection handles tracked by the registry.
//!
//! A handle is shared between the read loop that created it and the registry
//! that pushes broadcast frames into it. The broadcaster only marks a failed
//! handle closed, which wakes its read loop; the read loop's task then
//! releases the transport, exactly once and outside the registry lock.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::sink::SinkExt;
use futures::stream::SplitSink;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, Notify};

use crate::error::{RelayError, RelayResult};
use crate::types::ConnectionId;

/// Upper bound on the close handshake, regardless of the write deadline
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// One client's outbound side, as seen by the broadcaster
#[async_trait]
pub trait Connection: Send + Sync {
    fn id(&self) -> ConnectionId;

    /// Deliver one encoded frame to this client
    async fn push(&self, frame: &str) -> RelayResult<()>;

    /// Mark the connection closed and wake its read loop. Does no I/O.
    /// Returns true for the caller that actually closed it.
    fn mark_closed(&self) -> bool;

    /// Mark closed and release the transport. The release runs once.
    async fn close(&self);

    fn is_closed(&self) -> bool;

    /// Resolves once the connection has been closed
    async fn closed(&self);
}

/// Closed flag plus wakeup for anyone waiting on it
#[derive(Debug, Default)]
pub struct CloseSignal {
    closed: AtomicBool,
    notify: Notify,
}

impl CloseSignal {
    /// Mark closed. Returns true for the caller that actually closed it.
    pub fn close(&self) -> bool {
        let first = !self.closed.swap(true, Ordering::AcqRel);
        if first {
            self.notify.notify_waiters();
        }
        first
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_closed() {
                return;
            }
            notified.await;
        }
    }
}

/// Run a write under an optional deadline
async fn with_deadline<F>(deadline: Option<Duration>, write: F) -> RelayResult<()>
where
    F: std::future::Future<Output = RelayResult<()>>,
{
    match deadline {
        Some(d) => tokio::time::timeout(d, write)
            .await
            .map_err(|_| RelayError::DeliveryTimeout(d))?,
        None => write.await,
    }
}

/// Outbound half of an upgraded axum websocket
pub struct WsConnection {
    id: ConnectionId,
    sink: Mutex<SplitSink<WebSocket, Message>>,
    write_timeout: Option<Duration>,
    signal: CloseSignal,
    released: AtomicBool,
}

impl WsConnection {
    pub fn new(sink: SplitSink<WebSocket, Message>, write_timeout: Option<Duration>) -> Self {
        Self {
            id: ConnectionId::new(),
            sink: Mutex::new(sink),
            write_timeout,
            signal: CloseSignal::default(),
            released: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Connection for WsConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    async fn push(&self, frame: &str) -> RelayResult<()> {
        if self.signal.is_closed() {
            return Err(RelayError::ConnectionClosed);
        }
        let mut sink = self.sink.lock().await;
        with_deadline(self.write_timeout, async {
            sink.send(Message::Text(frame.to_owned().into())).await?;
            Ok::<(), RelayError>(())
        })
        .await
    }

    fn mark_closed(&self) -> bool {
        self.signal.close()
    }

    async fn close(&self) {
        self.signal.close();
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        // A stuck peer gets at most CLOSE_TIMEOUT here, never a second write deadline
        let deadline = self
            .write_timeout
            .map_or(CLOSE_TIMEOUT, |d| d.min(CLOSE_TIMEOUT));
        let _ = with_deadline(Some(deadline), async {
            let mut sink = self.sink.lock().await;
            sink.send(Message::Close(None)).await?;
            sink.close().await?;
            Ok::<(), RelayError>(())
        })
        .await;
        tracing::debug!("Closed websocket {}", self.id);
    }

    fn is_closed(&self) -> bool {
        self.signal.is_closed()
    }

    async fn closed(&self) {
        self.signal.wait().await
    }
}

/// In-process subscriber backed by a bounded channel.
///
/// A full channel behaves like a slow socket (the push waits, then hits the
/// write deadline); a dropped receiver behaves like a vanished peer.
pub struct MemoryConnection {
    id: ConnectionId,
    tx: mpsc::Sender<String>,
    write_timeout: Option<Duration>,
    signal: CloseSignal,
}

impl MemoryConnection {
    pub fn new(
        capacity: usize,
        write_timeout: Option<Duration>,
    ) -> (Arc<Self>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let conn = Arc::new(Self {
            id: ConnectionId::new(),
            tx,
            write_timeout,
            signal: CloseSignal::default(),
        });
        (conn, rx)
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    async fn push(&self, frame: &str) -> RelayResult<()> {
        if self.signal.is_closed() {
            return Err(RelayError::ConnectionClosed);
        }
        with_deadline(self.write_timeout, async {
            self.tx
                .send(frame.to_owned())
                .await
                .map_err(|_| RelayError::ConnectionClosed)
        })
        .await
    }

    fn mark_closed(&self) -> bool {
        self.signal.close()
    }

    async fn close(&self) {
        self.signal.close();
    }

    fn is_closed(&self) -> bool {
        self.signal.is_closed()
    }

    async fn closed(&self) {
        self.signal.wait().await
    }
}
