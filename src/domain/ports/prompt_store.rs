//! Prompt persistence port.

use async_trait::async_trait;

use crate::domain::errors::TrackerResult;
use crate::domain::models::Prompt;

/// Repository interface for stored prompts.
#[async_trait]
pub trait PromptStore: Send + Sync {
    /// Insert or replace a prompt.
    async fn upsert(&self, prompt: &Prompt) -> TrackerResult<()>;

    /// Fetch one prompt.
    async fn get(&self, id: &str) -> TrackerResult<Option<Prompt>>;

    /// Prompts belonging to one task, oldest first.
    async fn for_task(&self, task_id: &str) -> TrackerResult<Vec<Prompt>>;

    /// Set the approved flag on one prompt.
    async fn set_approved(&self, id: &str, approved: bool) -> TrackerResult<()>;

    /// Approve every prompt belonging to one task.
    async fn approve_all_for_task(&self, task_id: &str) -> TrackerResult<()>;

    /// Delete one prompt.
    async fn delete(&self, id: &str) -> TrackerResult<()>;

    /// Delete every prompt belonging to one task.
    async fn delete_for_task(&self, task_id: &str) -> TrackerResult<()>;
}
