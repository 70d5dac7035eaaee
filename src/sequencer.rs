//! Single ordering point between the read loops and the broadcaster.
//!
//! Any number of read loops enqueue; exactly one consumer dequeues. The
//! dequeue order is the canonical order for both fan-out and history.

use tokio::sync::mpsc;

use crate::error::{RelayError, RelayResult};
use crate::types::ChatMessage;

/// Producer side. Cheap to clone, one per read loop.
#[derive(Debug, Clone)]
pub struct Sequencer {
    tx: mpsc::UnboundedSender<ChatMessage>,
}

/// Consumer side, owned by the broadcaster
#[derive(Debug)]
pub struct SequencerRx {
    rx: mpsc::UnboundedReceiver<ChatMessage>,
}

impl Sequencer {
    pub fn channel() -> (Sequencer, SequencerRx) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Sequencer { tx }, SequencerRx { rx })
    }

    /// Queue a message for ordering. Never waits for delivery.
    pub fn enqueue(&self, msg: ChatMessage) -> RelayResult<()> {
        self.tx.send(msg).map_err(|_| RelayError::SequencerClosed)
    }
}

impl SequencerRx {
    /// Wait for the next message. None once every producer is gone.
    pub async fn dequeue(&mut self) -> Option<ChatMessage> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_order_single_producer() {
        let (seq, mut rx) = Sequencer::channel();
        for i in 0..3 {
            seq.enqueue(ChatMessage::new("a", i.to_string())).unwrap();
        }
        for i in 0..3 {
            assert_eq!(rx.dequeue().await.unwrap().content, i.to_string());
        }
    }

    #[tokio::test]
    async fn test_many_producers_lose_nothing() {
        let (seq, mut rx) = Sequencer::channel();
        let mut tasks = Vec::new();
        for p in 0..8 {
            let seq = seq.clone();
            tasks.push(tokio::spawn(async move {
                for i in 0..50 {
                    seq.enqueue(ChatMessage::new(format!("p{}", p), i.to_string()))
                        .unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        drop(seq);

        let mut per_producer: std::collections::HashMap<String, Vec<u32>> = Default::default();
        while let Some(msg) = rx.dequeue().await {
            per_producer
                .entry(msg.username)
                .or_default()
                .push(msg.content.parse().unwrap());
        }

        assert_eq!(per_producer.len(), 8);
        for seen in per_producer.values() {
            // Each producer's own messages stay in the order it sent them
            assert_eq!(*seen, (0..50).collect::<Vec<_>>());
        }
    }

    #[tokio::test]
    async fn test_enqueue_fails_once_consumer_dropped() {
        let (seq, rx) = Sequencer::channel();
        drop(rx);
        assert!(matches!(
            seq.enqueue(ChatMessage::new("a", "hi")),
            Err(RelayError::SequencerClosed)
        ));
    }
}
