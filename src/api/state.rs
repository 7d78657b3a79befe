//! Shared application state for the REST surface.

use std::sync::Arc;

use crate::domain::ports::AuthProvider;
use crate::services::{BenchmarkService, FlagService, ReviewService, TaskService};

#[derive(Clone)]
pub struct AppState {
    pub tasks: Arc<TaskService>,
    pub reviews: Arc<ReviewService>,
    pub benchmarks: Arc<BenchmarkService>,
    pub flags: Arc<FlagService>,
    pub auth: Arc<dyn AuthProvider>,
}
