//! Flag persistence port.

use async_trait::async_trait;

use crate::domain::errors::TrackerResult;
use crate::domain::models::Flag;

/// Repository interface for flags.
#[async_trait]
pub trait FlagStore: Send + Sync {
    /// Insert a new flag.
    async fn insert(&self, flag: &Flag) -> TrackerResult<()>;

    /// Fetch one flag.
    async fn get(&self, id: &str) -> TrackerResult<Option<Flag>>;

    /// Flags, newest first, optionally restricted to one kind.
    async fn find(&self, kind: Option<&str>) -> TrackerResult<Vec<Flag>>;

    /// Store the result payload of one flag.
    async fn set_result(&self, id: &str, result: &serde_json::Value) -> TrackerResult<()>;
}
