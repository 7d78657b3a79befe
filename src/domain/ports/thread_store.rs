//! Conversation thread persistence port.

use async_trait::async_trait;

use crate::domain::errors::TrackerResult;
use crate::domain::models::{RoleMessage, RoleThread};

/// Repository interface for role threads and their messages.
#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// Insert or replace a thread.
    async fn upsert_thread(&self, thread: &RoleThread) -> TrackerResult<()>;

    /// Load threads by id, preserving the order of `ids`.
    async fn get_threads(&self, ids: &[String]) -> TrackerResult<Vec<RoleThread>>;

    /// Delete a thread and its messages.
    async fn delete_thread(&self, id: &str) -> TrackerResult<()>;

    /// Append a message to its thread.
    async fn post_message(&self, message: &RoleMessage) -> TrackerResult<()>;

    /// Messages of one thread in insertion order.
    async fn messages(&self, thread_id: &str) -> TrackerResult<Vec<RoleMessage>>;
}
