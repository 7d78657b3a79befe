//! Benchmark and eval routes.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::api::error::ApiError;
use crate::api::extract::{ApiJson, Caller};
use crate::api::state::AppState;
use crate::domain::models::wire::{V1Benchmark, V1BenchmarkEval, V1Benchmarks, V1Eval, V1Evals};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/benchmarks", post(create_benchmark).get(get_benchmarks))
        .route(
            "/v1/benchmarks/{id}",
            get(get_benchmark).delete(delete_benchmark),
        )
        .route("/v1/benchmarks/{id}/eval", post(create_eval_from_benchmark))
        .route("/v1/evals", post(create_eval).get(get_evals))
        .route("/v1/evals/{id}", get(get_eval).delete(delete_eval))
}

async fn create_benchmark(
    State(state): State<AppState>,
    Caller(principal): Caller,
    ApiJson(data): ApiJson<V1Benchmark>,
) -> Result<Json<V1Benchmark>, ApiError> {
    let benchmark = state.benchmarks.create_benchmark(data, &principal).await?;
    Ok(Json(benchmark.to_v1()))
}

async fn get_benchmarks(
    State(state): State<AppState>,
    Caller(principal): Caller,
) -> Result<Json<V1Benchmarks>, ApiError> {
    let benchmarks = state.benchmarks.find_benchmarks(&principal).await?;
    Ok(Json(V1Benchmarks {
        benchmarks: benchmarks.iter().map(|b| b.to_v1()).collect(),
    }))
}

async fn get_benchmark(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path(id): Path<String>,
) -> Result<Json<V1Benchmark>, ApiError> {
    let benchmark = state.benchmarks.get_benchmark(&id, &principal).await?;
    Ok(Json(benchmark.to_v1()))
}

async fn delete_benchmark(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.benchmarks.delete_benchmark(&id, &principal).await?;
    Ok(Json(json!({ "message": "Benchmark deleted successfully" })))
}

async fn create_eval_from_benchmark(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path(id): Path<String>,
    ApiJson(data): ApiJson<V1BenchmarkEval>,
) -> Result<Json<V1Eval>, ApiError> {
    let (eval, benchmark) = state.benchmarks.create_eval(&id, data, &principal).await?;
    Ok(Json(eval.to_v1(&benchmark)))
}

async fn create_eval(
    State(state): State<AppState>,
    Caller(principal): Caller,
    ApiJson(data): ApiJson<V1Eval>,
) -> Result<Json<V1Eval>, ApiError> {
    let (eval, benchmark) = state
        .benchmarks
        .create_eval_from_v1(data, &principal)
        .await?;
    Ok(Json(eval.to_v1(&benchmark)))
}

async fn get_evals(
    State(state): State<AppState>,
    Caller(principal): Caller,
) -> Result<Json<V1Evals>, ApiError> {
    let evals = state.benchmarks.find_evals(&principal).await?;
    Ok(Json(V1Evals {
        evals: evals
            .iter()
            .map(|(eval, benchmark)| eval.to_v1(benchmark))
            .collect(),
    }))
}

async fn get_eval(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path(id): Path<String>,
) -> Result<Json<V1Eval>, ApiError> {
    let (eval, benchmark) = state.benchmarks.get_eval(&id, &principal).await?;
    Ok(Json(eval.to_v1(&benchmark)))
}

async fn delete_eval(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.benchmarks.delete_eval(&id, &principal).await?;
    Ok(Json(json!({ "message": "Eval deleted successfully" })))
}
