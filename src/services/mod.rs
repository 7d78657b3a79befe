//! Application services for the task tracker.

pub mod authz;
pub mod benchmark_service;
pub mod flag_service;
pub mod locks;
pub mod review_service;
pub mod task_service;

pub use benchmark_service::BenchmarkService;
pub use flag_service::FlagService;
pub use locks::TaskLocks;
pub use review_service::ReviewService;
pub use task_service::TaskService;
