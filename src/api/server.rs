//! Router assembly and server startup.

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tracing::info;

use crate::api::state::AppState;
use crate::api::{benchmarks, tasks};
use crate::domain::errors::{TrackerError, TrackerResult};
use crate::domain::models::Config;
use crate::domain::ports::{AuthProvider, EventSink, ImageConverter, NullEventSink};
use crate::infrastructure::credentials::CredentialVault;
use crate::infrastructure::database::{
    SqliteBenchmarkStore, SqliteEpisodeStore, SqliteFlagStore, SqlitePromptStore,
    SqliteReviewStore, SqliteTaskStore, SqliteThreadStore,
};
use crate::infrastructure::events::{ActionRecordedPublisher, BroadcastEventSink};
use crate::infrastructure::images::InlineImageConverter;
use crate::infrastructure::remote::RemoteClient;
use crate::services::{
    BenchmarkService, FlagService, ReviewService, TaskLocks, TaskService,
};

/// Wire stores and services into the shared application state.
pub fn build_state(
    pool: SqlitePool,
    config: &Config,
    vault: Arc<CredentialVault>,
    auth: Arc<dyn AuthProvider>,
) -> TrackerResult<AppState> {
    let task_store = Arc::new(SqliteTaskStore::new(pool.clone(), vault));
    let thread_store = Arc::new(SqliteThreadStore::new(pool.clone()));
    let prompt_store = Arc::new(SqlitePromptStore::new(pool.clone()));
    let episode_store = Arc::new(SqliteEpisodeStore::new(pool.clone()));
    let review_store = Arc::new(SqliteReviewStore::new(pool.clone()));
    let benchmark_store = Arc::new(SqliteBenchmarkStore::new(pool.clone()));
    let flag_store = Arc::new(SqliteFlagStore::new(pool));

    let sink: Arc<dyn EventSink> = if config.events.stream_url.is_some() {
        Arc::new(BroadcastEventSink::default())
    } else {
        Arc::new(NullEventSink)
    };
    let publisher = Arc::new(ActionRecordedPublisher::new(sink));
    let images: Arc<dyn ImageConverter> = Arc::new(InlineImageConverter);
    let remote = Arc::new(RemoteClient::new(
        config.remote.api_key.clone(),
        config.remote.timeout_secs,
    )?);
    let locks = Arc::new(TaskLocks::new());

    let task_service = Arc::new(TaskService::new(
        task_store.clone(),
        thread_store,
        prompt_store,
        episode_store.clone(),
        review_store.clone(),
        images,
        publisher,
        remote.clone(),
        locks.clone(),
    ));
    let review_service = Arc::new(ReviewService::new(
        task_store,
        episode_store,
        review_store,
        remote,
        locks,
    ));
    let benchmark_service = Arc::new(BenchmarkService::new(benchmark_store, task_service.clone()));
    let flag_service = Arc::new(FlagService::new(flag_store));

    Ok(AppState {
        tasks: task_service,
        reviews: review_service,
        benchmarks: benchmark_service,
        flags: flag_service,
        auth,
    })
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "A Trackway task tracker" }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Assemble the full REST router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(tasks::router())
        .merge(benchmarks::router())
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(state: AppState, port: u16) -> TrackerResult<()> {
    let router = build_router(state);
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| TrackerError::Transient(format!("cannot bind {addr}: {e}")))?;
    info!(%addr, "task tracker listening");
    axum::serve(listener, router)
        .await
        .map_err(|e| TrackerError::Transient(format!("server error: {e}")))
}
