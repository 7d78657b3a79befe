//! Benchmark and eval persistence port.

use async_trait::async_trait;

use crate::domain::errors::TrackerResult;
use crate::domain::models::Benchmark;

/// The persisted projection of an eval: scalar fields plus the ids of its
/// materialised tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalRow {
    pub id: String,
    pub benchmark_id: String,
    pub owner_id: Option<String>,
    pub assigned_to: Option<String>,
    pub assigned_type: Option<String>,
    pub created: f64,
    pub task_ids: Vec<String>,
}

/// Repository interface for benchmarks, their templates, and evals.
#[async_trait]
pub trait BenchmarkStore: Send + Sync {
    /// Persist a benchmark with its templates and associations. Fails
    /// `Conflict` when the name is taken.
    async fn insert_benchmark(&self, benchmark: &Benchmark) -> TrackerResult<()>;

    /// Load one benchmark with its templates.
    async fn get_benchmark(&self, id: &str) -> TrackerResult<Option<Benchmark>>;

    /// Benchmarks visible to the given owners, newest first.
    async fn find_benchmarks(&self, owners: &[String]) -> TrackerResult<Vec<Benchmark>>;

    /// Delete a benchmark, its associations, and its templates.
    async fn delete_benchmark(&self, id: &str) -> TrackerResult<()>;

    /// Persist an eval row and its task associations. Task rows themselves
    /// are persisted by the task aggregate.
    async fn insert_eval(&self, eval: &EvalRow) -> TrackerResult<()>;

    /// Load one eval row.
    async fn get_eval(&self, id: &str) -> TrackerResult<Option<EvalRow>>;

    /// Evals visible to the given owners, newest first.
    async fn find_evals(&self, owners: &[String]) -> TrackerResult<Vec<EvalRow>>;

    /// Delete an eval row and its associations.
    async fn delete_eval(&self, id: &str) -> TrackerResult<()>;
}
