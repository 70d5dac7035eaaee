use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::connection::Connection;
use crate::types::ConnectionId;

/// What to do with a handle after visiting it during a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Keep,
    Evict,
}

/// Result of one pass over the registry
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PassOutcome {
    pub visited: usize,
    pub evicted: Vec<ConnectionId>,
}

/// Live set of connection handles eligible for fan-out
#[derive(Default)]
pub struct Registry {
    connections: Mutex<HashMap<ConnectionId, Arc<dyn Connection>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly upgraded connection
    pub async fn add(&self, conn: Arc<dyn Connection>) {
        let id = conn.id();
        self.connections.lock().await.insert(id, conn);
        tracing::debug!("Registered connection {}", id);
    }

    /// Deregister a connection. No-op if it is already gone.
    pub async fn remove(&self, id: ConnectionId) -> Option<Arc<dyn Connection>> {
        let removed = self.connections.lock().await.remove(&id);
        if removed.is_some() {
            tracing::debug!("Deregistered connection {}", id);
        }
        removed
    }

    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.connections.lock().await.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.connections.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Visit every registered handle while holding the registry lock.
    ///
    /// Handles the visitor asks to evict are removed before the lock is
    /// released, so no `add`/`remove` interleaves with the pass and the next
    /// pass never sees them.
    pub async fn for_each_alive<F, Fut>(&self, mut visit: F) -> PassOutcome
    where
        F: FnMut(Arc<dyn Connection>) -> Fut,
        Fut: Future<Output = Visit>,
    {
        let mut connections = self.connections.lock().await;
        let mut outcome = PassOutcome::default();

        for (id, conn) in connections.iter() {
            outcome.visited += 1;
            if visit(conn.clone()).await == Visit::Evict {
                outcome.evicted.push(*id);
            }
        }

        for id in &outcome.evicted {
            connections.remove(id);
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::MemoryConnection;
    use std::time::Duration;
    use tokio::sync::Notify;

    #[tokio::test]
    async fn test_add_and_remove() {
        let registry = Registry::new();
        let (conn, _rx) = MemoryConnection::new(4, None);
        let id = conn.id();

        registry.add(conn).await;
        assert!(registry.contains(id).await);
        assert_eq!(registry.len().await, 1);

        assert!(registry.remove(id).await.is_some());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let registry = Registry::new();
        let (conn, _rx) = MemoryConnection::new(4, None);
        let id = conn.id();
        registry.add(conn).await;

        assert!(registry.remove(id).await.is_some());
        assert!(registry.remove(id).await.is_none());
        assert!(registry.remove(ConnectionId::new()).await.is_none());
    }

    #[tokio::test]
    async fn test_for_each_alive_visits_all() {
        let registry = Registry::new();
        let mut receivers = Vec::new();
        for _ in 0..3 {
            let (conn, rx) = MemoryConnection::new(4, None);
            registry.add(conn).await;
            receivers.push(rx);
        }

        let outcome = registry
            .for_each_alive(|conn| async move {
                conn.push("ping").await.unwrap();
                Visit::Keep
            })
            .await;

        assert_eq!(outcome.visited, 3);
        assert!(outcome.evicted.is_empty());
        for rx in &mut receivers {
            assert_eq!(rx.recv().await.as_deref(), Some("ping"));
        }
    }

    #[tokio::test]
    async fn test_evictions_applied_before_next_pass() {
        let registry = Registry::new();
        let (keep, _keep_rx) = MemoryConnection::new(4, None);
        let (evict, _evict_rx) = MemoryConnection::new(4, None);
        let evict_id = evict.id();
        registry.add(keep).await;
        registry.add(evict).await;

        let outcome = registry
            .for_each_alive(|conn| async move {
                if conn.id() == evict_id {
                    Visit::Evict
                } else {
                    Visit::Keep
                }
            })
            .await;

        assert_eq!(outcome.visited, 2);
        assert_eq!(outcome.evicted, vec![evict_id]);
        assert!(!registry.contains(evict_id).await);

        let second = registry.for_each_alive(|_| async { Visit::Keep }).await;
        assert_eq!(second.visited, 1);
    }

    #[tokio::test]
    async fn test_add_waits_for_running_pass() {
        let registry = Arc::new(Registry::new());
        let (first, _first_rx) = MemoryConnection::new(4, None);
        registry.add(first).await;

        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());

        let pass = {
            let registry = registry.clone();
            let entered = entered.clone();
            let release = release.clone();
            tokio::spawn(async move {
                registry
                    .for_each_alive(|_| {
                        let entered = entered.clone();
                        let release = release.clone();
                        async move {
                            entered.notify_one();
                            release.notified().await;
                            Visit::Keep
                        }
                    })
                    .await
            })
        };
        entered.notified().await;

        let (late, _late_rx) = MemoryConnection::new(4, None);
        let late_id = late.id();
        let add = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.add(late).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!add.is_finished(), "add must wait for the pass to release the lock");

        release.notify_one();
        let outcome = pass.await.unwrap();
        assert_eq!(outcome.visited, 1, "handle added mid-pass is not visited");

        tokio::time::timeout(Duration::from_secs(1), add)
            .await
            .expect("add completes once the pass is done")
            .unwrap();
        assert!(registry.contains(late_id).await);
        assert_eq!(registry.len().await, 2);
    }
}
