//! REST surface: a thin edge that verifies the caller and invokes the
//! core services.

pub mod benchmarks;
pub mod error;
pub mod extract;
pub mod server;
pub mod state;
pub mod tasks;

pub use server::{build_router, build_state, serve};
pub use state::AppState;
