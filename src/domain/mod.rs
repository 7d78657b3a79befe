//! Domain layer: entities, ports, and errors for the task tracker.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{TrackerError, TrackerResult};
