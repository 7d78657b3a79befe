//! Database infrastructure: connection management and SQLite store
//! implementations of the domain persistence ports.

pub mod benchmark_store;
pub mod connection;
pub mod episode_store;
pub mod flag_store;
pub mod prompt_store;
pub mod review_store;
pub mod task_store;
pub mod thread_store;
pub mod tracker_store;
pub mod utils;

pub use benchmark_store::SqliteBenchmarkStore;
pub use connection::DatabaseConnection;
pub use episode_store::SqliteEpisodeStore;
pub use flag_store::SqliteFlagStore;
pub use prompt_store::SqlitePromptStore;
pub use review_store::SqliteReviewStore;
pub use task_store::SqliteTaskStore;
pub use thread_store::SqliteThreadStore;
pub use tracker_store::SqliteTrackerStore;
