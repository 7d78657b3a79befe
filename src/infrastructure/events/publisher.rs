//! Best-effort publisher for action-recorded envelopes.

use std::sync::Arc;

use tracing::warn;

use crate::domain::models::wire::V1ActionRecorded;
use crate::domain::ports::EventSink;

/// Stream name for recorded action events.
pub const STREAM_ACTION_RECORDED: &str = "events:action_recorded";

/// Wraps an [`EventSink`] and absorbs its failures: a failed publish is
/// logged and never fails the write that triggered it.
pub struct ActionRecordedPublisher {
    sink: Arc<dyn EventSink>,
}

impl ActionRecordedPublisher {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }

    pub async fn publish(&self, envelope: &V1ActionRecorded) {
        let payload = match serde_json::to_value(envelope) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "failed to serialise action-recorded envelope");
                return;
            }
        };
        if let Err(e) = self.sink.append(STREAM_ACTION_RECORDED, payload).await {
            warn!(error = %e, "failed to publish action-recorded event");
        }
    }
}
