//! Task domain model.
//!
//! A task is a single unit of agent work with its full audit trail: the
//! conversation threads, stored prompts, the episode of recorded action
//! events, and the reviews written against it.

use std::collections::BTreeMap;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::domain::errors::{TrackerError, TrackerResult};

use super::device::{Device, DeviceType};
use super::episode::Episode;
use super::review::{Review, ReviewRequirement};
use super::thread::RoleThread;
use super::wire::{V1ReviewRequirement, V1Task, V1TaskUpdate};
use super::{now_ts, short_id};

/// Status of a task. Transitions are free-form; the terminal statuses are
/// only sticky for the `is_done` predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Defined,
    Created,
    InProgress,
    Finished,
    Failed,
    Error,
    Waiting,
    Canceling,
    Canceled,
    TimedOut,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Defined
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Defined => "defined",
            Self::Created => "created",
            Self::InProgress => "in progress",
            Self::Finished => "finished",
            Self::Failed => "failed",
            Self::Error => "error",
            Self::Waiting => "waiting",
            Self::Canceling => "canceling",
            Self::Canceled => "canceled",
            Self::TimedOut => "timed out",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "defined" => Some(Self::Defined),
            "created" => Some(Self::Created),
            "in progress" | "in_progress" => Some(Self::InProgress),
            "finished" => Some(Self::Finished),
            "failed" => Some(Self::Failed),
            "error" => Some(Self::Error),
            "waiting" => Some(Self::Waiting),
            "canceling" => Some(Self::Canceling),
            "canceled" | "cancelled" => Some(Self::Canceled),
            "timed out" | "timed_out" => Some(Self::TimedOut),
            _ => None,
        }
    }

    /// Whether a task in this status counts as done for pollers.
    pub fn is_done(&self) -> bool {
        matches!(
            self,
            Self::Finished
                | Self::Failed
                | Self::Error
                | Self::Canceled
                | Self::Canceling
                | Self::TimedOut
        )
    }
}

/// The backend a task operation dispatches to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskBackend {
    /// The task lives in this tracker's store.
    Local,
    /// The task lives on a peer tracker; every operation is forwarded.
    Remote {
        base_url: String,
        auth_token: Option<String>,
    },
}

/// A single unit of agent work.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: String,
    pub owner_id: Option<String>,
    pub created_by: Option<String>,
    pub parent_id: Option<String>,
    pub description: Option<String>,
    pub max_steps: u32,
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
    pub threads: Vec<RoleThread>,
    /// Ordered prompt ids; prompt bodies live in their own store.
    pub prompts: Vec<String>,
    pub episode: Episode,
    pub reviews: Vec<Review>,
    pub review_requirements: Vec<ReviewRequirement>,
    pub version: Option<String>,
    /// Base URL of a peer tracker when this task is a remote proxy.
    pub remote: Option<String>,
    /// Propagated to the remote adapter only; never persisted.
    pub auth_token: Option<String>,
}

impl Task {
    /// Create a new local task. The `feed` thread and an empty episode are
    /// created alongside, upholding the task invariants from birth.
    pub fn new(description: impl Into<String>, owner_id: Option<String>) -> Self {
        let id = short_id();
        let mut task = Self {
            id,
            owner_id: owner_id.clone(),
            created_by: None,
            parent_id: None,
            description: Some(description.into()),
            max_steps: 30,
            device: None,
            device_type: None,
            expect_schema: None,
            project: None,
            skill: None,
            status: TaskStatus::Defined,
            created: now_ts(),
            started: 0.0,
            completed: 0.0,
            assigned_to: None,
            assigned_type: None,
            error: None,
            output: None,
            parameters: BTreeMap::new(),
            labels: BTreeMap::new(),
            tags: Vec::new(),
            threads: Vec::new(),
            prompts: Vec::new(),
            episode: Episode::new(owner_id),
            reviews: Vec::new(),
            review_requirements: Vec::new(),
            version: None,
            remote: None,
            auth_token: None,
        };
        task.ensure_thread("feed");
        task.version = task.compute_version().ok();
        task
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn with_assigned_to(mut self, assigned_to: impl Into<String>) -> Self {
        self.assigned_to = Some(assigned_to.into());
        self
    }

    pub fn with_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    /// Which backend operations on this task dispatch to.
    pub fn backend(&self) -> TaskBackend {
        match &self.remote {
            Some(base_url) if !base_url.is_empty() => TaskBackend::Remote {
                base_url: base_url.clone(),
                auth_token: self.auth_token.clone(),
            },
            _ => TaskBackend::Local,
        }
    }

    pub fn is_done(&self) -> bool {
        self.status.is_done()
    }

    /// A task must describe its work or proxy a remote task that does.
    pub fn validate(&self) -> TrackerResult<()> {
        let has_description = self
            .description
            .as_ref()
            .is_some_and(|d| !d.trim().is_empty());
        let has_remote = self.remote.as_ref().is_some_and(|r| !r.is_empty());
        if !has_description && !has_remote {
            return Err(TrackerError::validation(
                "description",
                "task must have a description or a remote endpoint",
            ));
        }
        if self.max_steps == 0 {
            return Err(TrackerError::validation("max_steps", "must be positive"));
        }
        Ok(())
    }

    /// Find a thread by name or id.
    pub fn thread(&self, name_or_id: &str) -> Option<&RoleThread> {
        self.threads
            .iter()
            .find(|t| t.id == name_or_id || t.name.as_deref() == Some(name_or_id))
    }

    /// Create the named thread if no thread with that name exists yet.
    /// Returns the thread id.
    pub fn ensure_thread(&mut self, name: &str) -> String {
        if let Some(existing) = self.threads.iter().find(|t| t.name.as_deref() == Some(name)) {
            return existing.id.clone();
        }
        let thread = RoleThread::new(self.owner_id.clone(), Some(name.to_string()), false);
        let id = thread.id.clone();
        self.threads.push(thread);
        id
    }

    /// Add a distinct new thread. Fails `Conflict` when the name or id is
    /// already taken.
    pub fn add_thread(&mut self, thread: RoleThread) -> TrackerResult<()> {
        let clash = self.threads.iter().any(|t| {
            t.id == thread.id || (thread.name.is_some() && t.name == thread.name)
        });
        if clash {
            return Err(TrackerError::Conflict(format!(
                "thread '{}' already exists",
                thread.name.as_deref().unwrap_or(&thread.id)
            )));
        }
        self.threads.push(thread);
        Ok(())
    }

    /// Drop a thread by id. Returns whether a thread was removed.
    pub fn remove_thread(&mut self, thread_id: &str) -> bool {
        let before = self.threads.len();
        self.threads.retain(|t| t.id != thread_id);
        self.threads.len() != before
    }

    /// SHA-256 of the canonical (JCS) JSON of the V1 projection, taken with
    /// the `version` field cleared so the hash never depends on itself.
    pub fn compute_version(&self) -> TrackerResult<String> {
        let mut v1 = self.to_v1();
        v1.version = None;
        v1.auth_token = None;
        let canonical = serde_jcs::to_string(&v1)
            .map_err(|e| TrackerError::Serialization(e.to_string()))?;
        Ok(hex::encode(Sha256::digest(canonical.as_bytes())))
    }

    /// Recompute and store the version hash. Returns whether it changed.
    pub fn refresh_version(&mut self) -> TrackerResult<bool> {
        let next = self.compute_version()?;
        let changed = self.version.as_deref() != Some(next.as_str());
        self.version = Some(next);
        Ok(changed)
    }

    /// Deep copy with a fresh identity: new id, reset timestamps, status
    /// back to `defined`, a brand-new empty episode, and fresh thread and
    /// requirement rows. No mutable child object is shared with the source.
    pub fn copy(&self) -> Task {
        let mut copied = self.clone();
        copied.id = short_id();
        copied.created = now_ts();
        copied.started = 0.0;
        copied.completed = 0.0;
        copied.status = TaskStatus::Defined;
        copied.episode = Episode::new(self.owner_id.clone());
        copied.threads = self
            .threads
            .iter()
            .map(|t| {
                RoleThread::new(t.owner_id.clone(), t.name.clone(), t.public)
                    .with_metadata(t.metadata.clone())
            })
            .collect();
        copied.reviews = Vec::new();
        copied.review_requirements = self
            .review_requirements
            .iter()
            .map(|r| {
                let mut req = r.clone();
                req.id = short_id();
                req.task_id = copied.id.clone();
                req.created = now_ts();
                req.updated = None;
                req
            })
            .collect();
        copied.version = copied.compute_version().ok();
        copied
    }

    pub fn to_v1(&self) -> V1Task {
        // Tags are a set; the projection emits them sorted so the version
        // hash is stable across load/save cycles.
        let mut tags = self.tags.clone();
        tags.sort();
        V1Task {
            id: self.id.clone(),
            description: self.description.clone().unwrap_or_default(),
            max_steps: self.max_steps,
            device: self.device.clone(),
            device_type: self.device_type.clone(),
            expect_schema: self.expect_schema.clone(),
            status: Some(self.status.as_str().to_string()),
            threads: Some(self.threads.clone()),
            prompts: Some(self.prompts.clone()),
            reviews: self.reviews.clone(),
            review_requirements: self
                .review_requirements
                .iter()
                .map(|r| V1ReviewRequirement {
                    id: Some(r.id.clone()),
                    task_id: Some(r.task_id.clone()),
                    users: r.users.clone(),
                    agents: r.agents.clone(),
                    groups: r.groups.clone(),
                    types: r.types.clone(),
                    number_required: r.number_required,
                })
                .collect(),
            assigned_to: self.assigned_to.clone(),
            assigned_type: self.assigned_type.clone(),
            created: self.created,
            started: self.started,
            completed: self.completed,
            error: self.error.clone(),
            output: self.output.clone(),
            parameters: self.parameters.clone(),
            version: self.version.clone(),
            remote: self.remote.clone(),
            owner_id: self.owner_id.clone(),
            created_by: self.created_by.clone(),
            project: self.project.clone(),
            skill: self.skill.clone(),
            parent_id: self.parent_id.clone(),
            tags,
            labels: self.labels.clone(),
            episode_id: Some(self.episode.id.clone()),
            auth_token: None,
        }
    }

    /// The patch sent to a peer tracker when saving an existing remote task.
    pub fn to_update_v1(&self) -> V1TaskUpdate {
        V1TaskUpdate {
            status: Some(self.status.as_str().to_string()),
            description: self.description.clone(),
            max_steps: Some(self.max_steps),
            error: self.error.clone(),
            output: self.output.clone(),
            assigned_to: self.assigned_to.clone(),
            assigned_type: self.assigned_type.clone(),
            completed: Some(self.completed),
            version: self.version.clone(),
            set_labels: None,
        }
    }

    /// Build a task from its wire projection. The episode is a stub carrying
    /// only the id; callers load or create the real one.
    pub fn from_v1(v1: V1Task, owner_id: Option<&str>) -> TrackerResult<Task> {
        let owner = owner_id
            .map(ToString::to_string)
            .or_else(|| v1.owner_id.clone());
        if owner.is_none() {
            return Err(TrackerError::validation("owner_id", "owner id is required"));
        }

        let status = match v1.status.as_deref() {
            None | Some("") => TaskStatus::Defined,
            Some(s) => TaskStatus::from_str(s)
                .ok_or_else(|| TrackerError::validation("status", format!("unknown status '{s}'")))?,
        };

        let mut episode = Episode::new(owner.clone());
        if let Some(id) = &v1.episode_id {
            episode.id = id.clone();
        }

        let mut task = Task {
            id: v1.id,
            owner_id: owner.clone(),
            created_by: v1.created_by,
            parent_id: v1.parent_id,
            description: if v1.description.is_empty() {
                None
            } else {
                Some(v1.description)
            },
            max_steps: v1.max_steps,
            device: v1.device,
            device_type: v1.device_type,
            expect_schema: v1.expect_schema,
            project: v1.project,
            skill: v1.skill,
            status,
            created: v1.created,
            started: v1.started,
            completed: v1.completed,
            assigned_to: v1.assigned_to,
            assigned_type: v1.assigned_type,
            error: v1.error,
            output: v1.output,
            parameters: v1.parameters,
            labels: v1.labels,
            tags: v1.tags,
            threads: v1.threads.unwrap_or_default(),
            prompts: v1.prompts.unwrap_or_default(),
            episode,
            reviews: v1.reviews,
            review_requirements: Vec::new(),
            version: v1.version,
            remote: v1.remote,
            auth_token: v1.auth_token,
        };

        task.review_requirements = v1
            .review_requirements
            .into_iter()
            .map(|r| ReviewRequirement {
                id: r.id.unwrap_or_else(short_id),
                task_id: task.id.clone(),
                number_required: r.number_required,
                users: r.users,
                agents: r.agents,
                groups: r.groups,
                types: r.types,
                created: now_ts(),
                updated: None,
            })
            .collect();

        if task.thread("feed").is_none() {
            task.ensure_thread("feed");
        }
        task.validate()?;
        Ok(task)
    }

    /// Overwrite local fields from a freshly fetched remote projection.
    /// Identity, ownership, and the remote pointer itself are kept.
    pub fn absorb_v1(&mut self, v1: V1Task) -> TrackerResult<()> {
        let remote = self.remote.clone();
        let auth_token = self.auth_token.clone();
        let owner = self.owner_id.clone();
        let mut refreshed = Task::from_v1(v1, owner.as_deref())?;
        refreshed.id = self.id.clone();
        refreshed.remote = remote;
        refreshed.auth_token = auth_token;
        *self = refreshed;
        Ok(())
    }
}

/// Explicit patch of settable task fields. Unknown fields are rejected at
/// the wire boundary; absent fields leave the task untouched.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub status: Option<TaskStatus>,
    pub description: Option<String>,
    pub max_steps: Option<u32>,
    pub error: Option<String>,
    pub output: Option<String>,
    pub assigned_to: Option<String>,
    pub assigned_type: Option<String>,
    pub completed: Option<f64>,
    pub version: Option<String>,
    pub set_labels: Option<BTreeMap<String, String>>,
}

impl TaskPatch {
    pub fn from_v1(update: V1TaskUpdate) -> TrackerResult<Self> {
        let status = match update.status.as_deref() {
            None => None,
            Some(s) => Some(TaskStatus::from_str(s).ok_or_else(|| {
                TrackerError::validation("status", format!("unknown status '{s}'"))
            })?),
        };
        Ok(Self {
            status,
            description: update.description,
            max_steps: update.max_steps,
            error: update.error,
            output: update.output,
            assigned_to: update.assigned_to,
            assigned_type: update.assigned_type,
            completed: update.completed,
            version: update.version,
            set_labels: update.set_labels,
        })
    }

    /// Apply to a task. Returns whether any observable field changed.
    /// `set_labels` merges key-by-key; it never replaces the whole map.
    pub fn apply(self, task: &mut Task) -> bool {
        let mut changed = false;

        if let Some(status) = self.status {
            if task.status != status {
                task.status = status;
                changed = true;
            }
        }
        if let Some(description) = self.description {
            if task.description.as_deref() != Some(description.as_str()) {
                task.description = Some(description);
                changed = true;
            }
        }
        if let Some(max_steps) = self.max_steps {
            if task.max_steps != max_steps {
                task.max_steps = max_steps;
                changed = true;
            }
        }
        if let Some(error) = self.error {
            if task.error.as_deref() != Some(error.as_str()) {
                task.error = Some(error);
                changed = true;
            }
        }
        if let Some(output) = self.output {
            if task.output.as_deref() != Some(output.as_str()) {
                task.output = Some(output);
                changed = true;
            }
        }
        if let Some(assigned_to) = self.assigned_to {
            if task.assigned_to.as_deref() != Some(assigned_to.as_str()) {
                task.assigned_to = Some(assigned_to);
                changed = true;
            }
        }
        if let Some(assigned_type) = self.assigned_type {
            if task.assigned_type.as_deref() != Some(assigned_type.as_str()) {
                task.assigned_type = Some(assigned_type);
                changed = true;
            }
        }
        if let Some(completed) = self.completed {
            if (task.completed - completed).abs() > f64::EPSILON {
                task.completed = completed;
                changed = true;
            }
        }
        if let Some(labels) = self.set_labels {
            for (key, value) in labels {
                if task.labels.get(&key) != Some(&value) {
                    task.labels.insert(key, value);
                    changed = true;
                }
            }
        }

        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_has_feed_thread_and_episode() {
        let task = Task::new("Search for french ducks", Some("tom@myspace.com".into()));
        assert!(task.thread("feed").is_some());
        assert_eq!(task.threads.len(), 1);
        assert!(task.episode.actions.is_empty());
        assert_eq!(task.status, TaskStatus::Defined);
        assert!(task.version.is_some());
    }

    #[test]
    fn test_ensure_thread_is_idempotent() {
        let mut task = Task::new("t", None);
        let first = task.ensure_thread("feed");
        let second = task.ensure_thread("feed");
        assert_eq!(first, second);
        assert_eq!(task.threads.len(), 1);
    }

    #[test]
    fn test_validate_requires_description_or_remote() {
        let mut task = Task::new("described", None);
        task.description = None;
        assert!(task.validate().is_err());

        task.remote = Some("https://tracker.example.com".into());
        assert!(task.validate().is_ok());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            TaskStatus::Defined,
            TaskStatus::Created,
            TaskStatus::InProgress,
            TaskStatus::Finished,
            TaskStatus::Failed,
            TaskStatus::Error,
            TaskStatus::Waiting,
            TaskStatus::Canceling,
            TaskStatus::Canceled,
            TaskStatus::TimedOut,
        ] {
            assert_eq!(TaskStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::from_str("in_progress"), Some(TaskStatus::InProgress));
        assert!(TaskStatus::from_str("bogus").is_none());
    }

    #[test]
    fn test_is_done_statuses() {
        for status in [
            TaskStatus::Finished,
            TaskStatus::Failed,
            TaskStatus::Error,
            TaskStatus::Canceled,
            TaskStatus::Canceling,
            TaskStatus::TimedOut,
        ] {
            assert!(status.is_done(), "{} should be done", status.as_str());
        }
        for status in [TaskStatus::Defined, TaskStatus::Created, TaskStatus::InProgress, TaskStatus::Waiting] {
            assert!(!status.is_done(), "{} should not be done", status.as_str());
        }
    }

    #[test]
    fn test_version_matches_canonical_hash() {
        let task = Task::new("hash me", Some("o@x.com".into()));
        let recomputed = task.compute_version().unwrap();
        assert_eq!(task.version.as_deref(), Some(recomputed.as_str()));
    }

    #[test]
    fn test_version_changes_with_observable_fields() {
        let mut task = Task::new("versioned", Some("o@x.com".into()));
        let before = task.version.clone().unwrap();
        task.labels.insert("env".into(), "prod".into());
        assert!(task.refresh_version().unwrap());
        assert_ne!(task.version.unwrap(), before);
    }

    #[test]
    fn test_copy_shares_no_mutable_children() {
        let mut task = Task::new("copy me", Some("o@x.com".into()));
        task.review_requirements
            .push(ReviewRequirement::new(task.id.clone(), 1).with_users(vec!["a@x.com".into()]));
        task.started = 12.0;
        task.completed = 13.0;
        task.status = TaskStatus::Finished;

        let copied = task.copy();
        assert_ne!(copied.id, task.id);
        assert_eq!(copied.status, TaskStatus::Defined);
        assert_eq!(copied.started, 0.0);
        assert_eq!(copied.completed, 0.0);
        assert_ne!(copied.episode.id, task.episode.id);
        for (a, b) in copied.threads.iter().zip(task.threads.iter()) {
            assert_ne!(a.id, b.id);
        }
        for req in &copied.review_requirements {
            assert_eq!(req.task_id, copied.id);
        }
        assert!(copied.reviews.is_empty());
    }

    #[test]
    fn test_patch_merges_labels_instead_of_replacing() {
        let mut task = Task::new("label me", None)
            .with_labels([("test".to_string(), "true".to_string())].into());
        let patch = TaskPatch {
            set_labels: Some([("test_set".to_string(), "true".to_string())].into()),
            ..Default::default()
        };
        assert!(patch.apply(&mut task));
        assert_eq!(task.labels.get("test").map(String::as_str), Some("true"));
        assert_eq!(task.labels.get("test_set").map(String::as_str), Some("true"));
    }

    #[test]
    fn test_patch_reports_no_change_for_identical_values() {
        let mut task = Task::new("still", None);
        let patch = TaskPatch {
            description: Some("still".into()),
            ..Default::default()
        };
        assert!(!patch.apply(&mut task));
    }

    #[test]
    fn test_patch_rejects_unknown_status() {
        let update = V1TaskUpdate {
            status: Some("exploded".into()),
            ..Default::default()
        };
        assert!(TaskPatch::from_v1(update).is_err());
    }

    #[test]
    fn test_v1_round_trip_preserves_requirements() {
        let mut task = Task::new("round trip", Some("o@x.com".into()));
        task.review_requirements.push(
            ReviewRequirement::new(task.id.clone(), 2)
                .with_users(vec!["u@x.com".into()])
                .with_agents(vec!["agent1".into()]),
        );
        let v1 = task.to_v1();
        let rebuilt = Task::from_v1(v1, None).unwrap();
        assert_eq!(rebuilt.id, task.id);
        assert_eq!(rebuilt.review_requirements.len(), 1);
        assert_eq!(rebuilt.review_requirements[0].users, vec!["u@x.com".to_string()]);
        assert_eq!(rebuilt.episode.id, task.episode.id);
    }

    #[test]
    fn test_backend_dispatch() {
        let mut task = Task::new("where", None);
        assert_eq!(task.backend(), TaskBackend::Local);
        task.remote = Some("https://peer.example.com".into());
        task.auth_token = Some("secret".into());
        match task.backend() {
            TaskBackend::Remote { base_url, auth_token } => {
                assert_eq!(base_url, "https://peer.example.com");
                assert_eq!(auth_token.as_deref(), Some("secret"));
            }
            TaskBackend::Local => panic!("expected remote backend"),
        }
    }
}
