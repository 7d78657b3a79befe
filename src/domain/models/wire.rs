//! Wire-format (V1) projections.
//!
//! These are the JSON shapes exchanged with clients and peer trackers.
//! The task projection doubles as the input to the version hash, so field
//! changes here are observable in `Task::compute_version`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::device::{Device, DeviceType};
use super::episode::{Action, ActionEvent, Annotation, EnvState, ToolRef};
use super::prompt::Prompt;
use super::review::Review;
use super::thread::RoleThread;
use super::{now_ts, short_id};

/// Review requirement as carried on task create/read bodies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct V1ReviewRequirement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default)]
    pub users: Vec<String>,
    #[serde(default)]
    pub agents: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default = "default_number_required")]
    pub number_required: u32,
}

fn default_number_required() -> u32 {
    2
}

/// Distinct parties still owing a review on one task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct V1PendingReviewers {
    pub task_id: String,
    #[serde(default)]
    pub users: Vec<String>,
    #[serde(default)]
    pub agents: Vec<String>,
}

/// Task ids on which a party is listed as pending.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct V1PendingReviews {
    #[serde(default)]
    pub tasks: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct V1CreateReview {
    pub approved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correction: Option<Value>,
}

/// Bulk review request for approve/fail across many actions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct V1ReviewMany {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer_type: Option<String>,
    /// Apply to hidden actions too.
    #[serde(default)]
    pub hidden: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct V1TaskUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Key-level upsert into the task's labels; never a whole-map replace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_labels: Option<BTreeMap<String, String>>,
}

/// The task wire projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct V1Task {
    #[serde(default = "short_id")]
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<Device>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<DeviceType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<Vec<RoleThread>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompts: Option<Vec<String>>,
    #[serde(default)]
    pub reviews: Vec<Review>,
    #[serde(default)]
    pub review_requirements: Vec<V1ReviewRequirement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_type: Option<String>,
    #[serde(default = "now_ts")]
    pub created: f64,
    #[serde(default)]
    pub started: f64,
    #[serde(default)]
    pub completed: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode_id: Option<String>,
    /// Propagated only to the remote adapter; never serialised back out.
    #[serde(default, skip_serializing)]
    pub auth_token: Option<String>,
}

fn default_max_steps() -> u32 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct V1Tasks {
    pub tasks: Vec<V1Task>,
}

/// Search body for `POST /v1/tasks/search`. Absent fields do not filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct V1SearchTask {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    /// Explicit owner filter; every element must pass the authz gate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owners: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct V1AddThread {
    #[serde(default)]
    pub public: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct V1RemoveThread {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct V1PostMessage {
    pub role: String,
    pub msg: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread: Option<String>,
}

/// Prompt create/read body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct V1Prompt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    pub response: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    #[serde(default)]
    pub approved: bool,
    #[serde(default)]
    pub flagged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<f64>,
}

fn default_namespace() -> String {
    "default".to_string()
}

impl V1Prompt {
    /// Materialise a prompt owned by `task_id`.
    pub fn into_prompt(self, task_id: &str) -> Prompt {
        Prompt {
            id: self.id.unwrap_or_else(short_id),
            task_id: Some(task_id.to_string()),
            namespace: self.namespace,
            thread_id: self.thread_id,
            response: self.response,
            response_schema: self.response_schema,
            metadata: self.metadata,
            approved: self.approved,
            flagged: self.flagged,
            owner_id: self.owner_id,
            agent_id: self.agent_id,
            model: self.model,
            created: self.created.unwrap_or_else(now_ts),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct V1Prompts {
    pub prompts: Vec<Prompt>,
}

/// Action event create/read body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct V1ActionEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub action: Action,
    pub tool: ToolRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<EnvState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_state: Option<EnvState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_id: Option<String>,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<f64>,
}

impl V1ActionEvent {
    pub fn into_event(self) -> ActionEvent {
        ActionEvent {
            id: self.id.unwrap_or_else(short_id),
            action: self.action,
            tool: self.tool,
            state: self.state,
            end_state: self.end_state,
            result: self.result,
            prompt_id: self.prompt_id,
            namespace: self.namespace,
            metadata: self.metadata,
            owner_id: self.owner_id,
            model: self.model,
            agent_id: self.agent_id,
            hidden: self.hidden,
            reviews: Vec::new(),
            reviewables: Vec::new(),
            created: self.created.unwrap_or_else(now_ts),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct V1ActionEvents {
    pub events: Vec<ActionEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct V1Threads {
    pub threads: Vec<RoleThread>,
}

/// Annotation create body for one action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct V1AnnotationReviewable {
    pub key: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotator_type: Option<String>,
}

impl V1AnnotationReviewable {
    pub fn into_annotation(self) -> Annotation {
        let mut annotation = Annotation::new(self.key, self.value);
        annotation.annotator = self.annotator;
        annotation.annotator_type = self.annotator_type;
        annotation
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct V1TaskTemplate {
    #[serde(default = "short_id")]
    pub id: String,
    pub description: String,
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<Device>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<DeviceType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect_schema: Option<Value>,
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default = "now_ts")]
    pub created: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct V1Benchmark {
    #[serde(default = "short_id")]
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub tasks: Vec<V1TaskTemplate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default = "now_ts")]
    pub created: f64,
    #[serde(default)]
    pub public: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct V1Benchmarks {
    pub benchmarks: Vec<V1Benchmark>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct V1BenchmarkEval {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct V1Eval {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub benchmark: V1Benchmark,
    #[serde(default)]
    pub tasks: Vec<V1Task>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct V1Evals {
    pub evals: Vec<V1Eval>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct V1Flag {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub flag: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    pub created: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct V1Flags {
    pub flags: Vec<V1Flag>,
}

/// A rectangle on a screenshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct V1BoundingBox {
    pub x0: i64,
    pub x1: i64,
    pub y0: i64,
    pub y1: i64,
}

/// Flag payload asking a human to draw a bounding box around a target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct V1BoundingBoxFlag {
    pub img: String,
    pub target: String,
    pub bbox: V1BoundingBox,
}

/// Profile returned by the auth hub for a verified token.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct V1UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(default)]
    pub organizations: BTreeMap<String, V1OrgMembership>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct V1OrgMembership {
    pub role: String,
}

/// Envelope published for every recorded action event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct V1ActionRecorded {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_action: Option<ActionEvent>,
    pub action: ActionEvent,
    pub event_number: u64,
    pub task_snapshot: V1Task,
}

