//! Task persistence port.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::errors::TrackerResult;
use crate::domain::models::{
    Device, DeviceType, Episode, Review, ReviewRequirement, RoleThread, Task, TaskStatus,
};

/// The persisted projection of one task row: scalar fields plus the ids of
/// its child entities. Child bodies live in their own stores.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRow {
    pub id: String,
    pub owner_id: Option<String>,
    pub created_by: Option<String>,
    pub parent_id: Option<String>,
    pub description: Option<String>,
    pub max_steps: u32,
    /// Decrypted device descriptor; the store encrypts at rest.
    pub device: Option<Device>,
    pub device_type: Option<DeviceType>,
    pub expect_schema: Option<Value>,
    pub project: Option<String>,
    pub skill: Option<String>,
    pub status: TaskStatus,
    pub created: f64,
    pub started: f64,
    pub completed: f64,
    pub assigned_to: Option<String>,
    pub assigned_type: Option<String>,
    pub error: Option<String>,
    pub output: Option<String>,
    pub parameters: BTreeMap<String, Value>,
    pub labels: BTreeMap<String, String>,
    pub tags: Vec<String>,
    pub thread_ids: Vec<String>,
    pub prompt_ids: Vec<String>,
    pub episode_id: Option<String>,
    pub version: Option<String>,
}

impl TaskRow {
    pub fn from_task(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            owner_id: task.owner_id.clone(),
            created_by: task.created_by.clone(),
            parent_id: task.parent_id.clone(),
            description: task.description.clone(),
            max_steps: task.max_steps,
            device: task.device.clone(),
            device_type: task.device_type.clone(),
            expect_schema: task.expect_schema.clone(),
            project: task.project.clone(),
            skill: task.skill.clone(),
            status: task.status,
            created: task.created,
            started: task.started,
            completed: task.completed,
            assigned_to: task.assigned_to.clone(),
            assigned_type: task.assigned_type.clone(),
            error: task.error.clone(),
            output: task.output.clone(),
            parameters: task.parameters.clone(),
            labels: task.labels.clone(),
            tags: task.tags.clone(),
            thread_ids: task.threads.iter().map(|t| t.id.clone()).collect(),
            prompt_ids: task.prompts.clone(),
            episode_id: Some(task.episode.id.clone()),
            version: task.version.clone(),
        }
    }

    /// Reassemble the aggregate from the row and its loaded children.
    pub fn into_task(
        self,
        threads: Vec<RoleThread>,
        episode: Episode,
        reviews: Vec<Review>,
        review_requirements: Vec<ReviewRequirement>,
    ) -> Task {
        Task {
            id: self.id,
            owner_id: self.owner_id,
            created_by: self.created_by,
            parent_id: self.parent_id,
            description: self.description,
            max_steps: self.max_steps,
            device: self.device,
            device_type: self.device_type,
            expect_schema: self.expect_schema,
            project: self.project,
            skill: self.skill,
            status: self.status,
            created: self.created,
            started: self.started,
            completed: self.completed,
            assigned_to: self.assigned_to,
            assigned_type: self.assigned_type,
            error: self.error,
            output: self.output,
            parameters: self.parameters,
            labels: self.labels,
            tags: self.tags,
            threads,
            prompts: self.prompt_ids,
            episode,
            reviews,
            review_requirements,
            version: self.version,
            remote: None,
            auth_token: None,
        }
    }
}

/// A lightweight batch-loaded task: the row plus its reviews and review
/// requirements, fetched in O(1) store calls for the whole batch.
#[derive(Debug, Clone)]
pub struct TaskLite {
    pub row: TaskRow,
    pub reviews: Vec<Review>,
    pub review_requirements: Vec<ReviewRequirement>,
}

/// Filter criteria for task searches. Every filter is conjunctive; tag and
/// label filters join through the association tables.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    /// Owner identifiers the caller may see. Must not be empty.
    pub owners: Vec<String>,
    pub id: Option<String>,
    pub status: Option<String>,
    pub assigned_to: Option<String>,
    pub assigned_type: Option<String>,
    pub device: Option<String>,
    pub device_type: Option<String>,
    pub parent_id: Option<String>,
    pub project: Option<String>,
    pub skill: Option<String>,
    pub tags: Vec<String>,
    pub labels: BTreeMap<String, String>,
}

/// Repository interface for task rows.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert or replace a task row, keeping tag/label associations in sync.
    async fn upsert(&self, row: &TaskRow) -> TrackerResult<()>;

    /// Fetch one row by id.
    async fn get(&self, id: &str) -> TrackerResult<Option<TaskRow>>;

    /// Search rows, ordered by `created` descending.
    async fn find(&self, filter: &TaskFilter) -> TrackerResult<Vec<TaskRow>>;

    /// Batch-load rows with reviews and requirements; the number of store
    /// round-trips is constant in the size of `ids`.
    async fn find_many_lite(&self, ids: &[String]) -> TrackerResult<Vec<TaskLite>>;

    /// Delete one row and its tag/label associations.
    async fn delete(&self, id: &str) -> TrackerResult<()>;
}
