//! Event streaming: the action-recorded publisher and its sinks.

pub mod publisher;
pub mod sink;

pub use publisher::{ActionRecordedPublisher, STREAM_ACTION_RECORDED};
pub use sink::BroadcastEventSink;
