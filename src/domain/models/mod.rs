//! Domain models for the task tracker.

pub mod benchmark;
pub mod config;
pub mod device;
pub mod episode;
pub mod flag;
pub mod principal;
pub mod prompt;
pub mod review;
pub mod task;
pub mod thread;
pub mod tracker;
pub mod wire;

pub use benchmark::{Benchmark, Eval, TaskTemplate};
pub use config::Config;
pub use device::{Device, DeviceType};
pub use episode::{Action, ActionEvent, Annotation, EnvState, Episode, RecordDecision, ToolRef};
pub use flag::{Flag, FlagKind};
pub use principal::{OpKind, OrgMembership, OrgRole, Principal};
pub use prompt::Prompt;
pub use review::{
    recompute_pending, PendingReviewer, ResourceType, Review, ReviewRequirement, ReviewerType,
};
pub use task::{Task, TaskBackend, TaskPatch, TaskStatus};
pub use thread::{RoleMessage, RoleThread};
pub use tracker::Tracker;

use uuid::Uuid;

/// Generate a short opaque identifier (hyphen-less UUID v4).
pub fn short_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Current wall-clock time as seconds since the Unix epoch.
pub fn now_ts() -> f64 {
    let now = chrono::Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1_000_000.0
}
