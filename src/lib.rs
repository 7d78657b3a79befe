//! Trackway - task tracker for autonomous agents
//!
//! Records what an agent was asked to do, the trajectory it took, the
//! prompts it sent, the actions it executed, and the reviews of each step:
//! - Task aggregate with threads, prompts, and an append-only episode
//! - Multi-party review workflow with a materialised pending projection
//! - Benchmarks and evals composed from task templates
//! - Dual local/remote operation against peer trackers
//! - SQLite persistence with WAL mode

pub mod api;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export key types for convenience
pub use domain::errors::{TrackerError, TrackerResult};
pub use domain::models::{Task, TaskStatus};
pub use infrastructure::database::DatabaseConnection;
