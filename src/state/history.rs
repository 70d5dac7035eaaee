use std::collections::VecDeque;
use tokio::sync::RwLock;

use crate::types::ChatMessage;

/// Append-only log of every broadcast message, in broadcast order.
///
/// Unbounded unless a retention limit is set, in which case the oldest
/// entries are dropped first.
#[derive(Debug, Default)]
pub struct History {
    entries: RwLock<VecDeque<ChatMessage>>,
    limit: Option<usize>,
}

impl History {
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            entries: RwLock::new(VecDeque::new()),
            limit: limit.filter(|n| *n > 0),
        }
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Append one message, trimming the oldest ones past the retention limit
    pub async fn append(&self, msg: ChatMessage) {
        let mut entries = self.entries.write().await;
        entries.push_back(msg);
        if let Some(limit) = self.limit {
            while entries.len() > limit {
                entries.pop_front();
            }
        }
    }

    /// Full history as of now, oldest first
    pub async fn snapshot(&self) -> Vec<ChatMessage> {
        self.entries.read().await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
