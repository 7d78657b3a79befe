//! Domain ports (interfaces) for the task tracker.

pub mod auth_provider;
pub mod benchmark_store;
pub mod episode_store;
pub mod event_sink;
pub mod flag_store;
pub mod image_converter;
pub mod prompt_store;
pub mod review_store;
pub mod task_store;
pub mod thread_store;

pub use auth_provider::AuthProvider;
pub use benchmark_store::{BenchmarkStore, EvalRow};
pub use episode_store::EpisodeStore;
pub use event_sink::{EventSink, NullEventSink};
pub use flag_store::FlagStore;
pub use image_converter::{ImageConverter, NullImageConverter};
pub use prompt_store::PromptStore;
pub use review_store::ReviewStore;
pub use task_store::{TaskFilter, TaskLite, TaskRow, TaskStore};
pub use thread_store::ThreadStore;
