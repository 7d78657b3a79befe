//! In-process broadcast event sink.
//!
//! The sink fans appended payloads out to any number of subscribers over a
//! tokio broadcast channel, with a monotonically increasing sequence number
//! per sink. Slow subscribers drop the oldest entries.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::domain::errors::TrackerResult;
use crate::domain::models::now_ts;
use crate::domain::ports::EventSink;

/// One entry on the stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEntry {
    pub stream: String,
    pub sequence: u64,
    pub timestamp: f64,
    pub payload: Value,
}

pub struct BroadcastEventSink {
    tx: broadcast::Sender<StreamEntry>,
    sequence: AtomicU64,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            sequence: AtomicU64::new(0),
        }
    }

    /// Subscribe to every subsequently appended entry.
    pub fn subscribe(&self) -> broadcast::Receiver<StreamEntry> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastEventSink {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl EventSink for BroadcastEventSink {
    async fn append(&self, stream: &str, payload: Value) -> TrackerResult<()> {
        let entry = StreamEntry {
            stream: stream.to_string(),
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
            timestamp: now_ts(),
            payload,
        };
        // No subscribers is fine; the stream is best-effort by contract.
        let _ = self.tx.send(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_append_reaches_subscriber_with_sequence() {
        let sink = BroadcastEventSink::new(8);
        let mut rx = sink.subscribe();
        sink.append("events:action_recorded", json!({"n": 1})).await.unwrap();
        sink.append("events:action_recorded", json!({"n": 2})).await.unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.sequence, 0);
        assert_eq!(second.sequence, 1);
        assert_eq!(second.payload, json!({"n": 2}));
    }

    #[tokio::test]
    async fn test_append_without_subscribers_is_ok() {
        let sink = BroadcastEventSink::new(8);
        assert!(sink.append("s", json!({})).await.is_ok());
    }
}
