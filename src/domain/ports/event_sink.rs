//! Event stream port.
//!
//! The tracker publishes an envelope for every recorded action event to a
//! named stream. Publishing is best-effort: sink failures are logged by the
//! publisher and never surface to the write path.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::errors::TrackerResult;

/// Append-only event stream keyed by stream name.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Append one payload to the named stream.
    async fn append(&self, stream: &str, payload: Value) -> TrackerResult<()>;
}

/// Sink used when no stream is configured: every append is a silent no-op.
pub struct NullEventSink;

#[async_trait]
impl EventSink for NullEventSink {
    async fn append(&self, _stream: &str, _payload: Value) -> TrackerResult<()> {
        Ok(())
    }
}
