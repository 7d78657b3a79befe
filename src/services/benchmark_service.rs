//! Benchmark and eval lifecycle.

use std::sync::Arc;

use tracing::debug;

use crate::domain::errors::{TrackerError, TrackerResult};
use crate::domain::models::wire::{V1Benchmark, V1BenchmarkEval, V1Eval};
use crate::domain::models::{Benchmark, Eval, OpKind, Principal, Task};
use crate::domain::ports::{BenchmarkStore, EvalRow};
use crate::services::authz::{check_owner, resolve_owner_filter, resolve_create_owner};
use crate::services::task_service::TaskService;

pub struct BenchmarkService {
    store: Arc<dyn BenchmarkStore>,
    tasks: Arc<TaskService>,
}

impl BenchmarkService {
    pub fn new(store: Arc<dyn BenchmarkStore>, tasks: Arc<TaskService>) -> Self {
        Self { store, tasks }
    }

    /// Persist a benchmark with its templates. Names are globally unique.
    pub async fn create_benchmark(
        &self,
        v1: V1Benchmark,
        principal: &Principal,
    ) -> TrackerResult<Benchmark> {
        let owner = resolve_create_owner(principal, v1.owner_id.as_deref())?;
        let benchmark = Benchmark::from_v1(v1, Some(&owner))?;
        self.store.insert_benchmark(&benchmark).await?;
        debug!(benchmark_id = %benchmark.id, name = %benchmark.name, "created benchmark");
        Ok(benchmark)
    }

    pub async fn get_benchmark(&self, id: &str, principal: &Principal) -> TrackerResult<Benchmark> {
        let resource = format!("benchmark {id}");
        let benchmark = self
            .store
            .get_benchmark(id)
            .await?
            .ok_or_else(|| TrackerError::NotFound(resource.clone()))?;
        if !benchmark.public {
            check_owner(principal, OpKind::Read, benchmark.owner_id.as_deref(), &resource)?;
        }
        Ok(benchmark)
    }

    pub async fn find_benchmarks(&self, principal: &Principal) -> TrackerResult<Vec<Benchmark>> {
        let owners = resolve_owner_filter(principal, OpKind::Read, None)?;
        self.store.find_benchmarks(&owners).await
    }

    pub async fn delete_benchmark(&self, id: &str, principal: &Principal) -> TrackerResult<()> {
        let resource = format!("benchmark {id}");
        let benchmark = self
            .store
            .get_benchmark(id)
            .await?
            .ok_or_else(|| TrackerError::NotFound(resource.clone()))?;
        check_owner(principal, OpKind::Delete, benchmark.owner_id.as_deref(), &resource)?;
        self.store.delete_benchmark(id).await
    }

    /// Materialise an eval from a benchmark: one fresh task per template,
    /// all persisted through the task aggregate, then the eval row.
    pub async fn create_eval(
        &self,
        benchmark_id: &str,
        data: V1BenchmarkEval,
        principal: &Principal,
    ) -> TrackerResult<(Eval, Benchmark)> {
        let benchmark = self.get_benchmark(benchmark_id, principal).await?;
        let mut eval = benchmark.eval(
            data.assigned_to.as_deref(),
            data.assigned_type.as_deref(),
            Some(principal.email.as_str()),
        );

        let mut persisted = Vec::with_capacity(eval.tasks.len());
        for task in eval.tasks {
            persisted.push(self.tasks.persist_new(task).await?);
        }
        eval.tasks = persisted;

        self.store
            .insert_eval(&EvalRow {
                id: eval.id.clone(),
                benchmark_id: benchmark.id.clone(),
                owner_id: eval.owner_id.clone(),
                assigned_to: eval.assigned_to.clone(),
                assigned_type: eval.assigned_type.clone(),
                created: eval.created,
                task_ids: eval.tasks.iter().map(|t| t.id.clone()).collect(),
            })
            .await?;
        Ok((eval, benchmark))
    }

    /// Persist an eval given in wire form (benchmark included).
    pub async fn create_eval_from_v1(
        &self,
        v1: V1Eval,
        principal: &Principal,
    ) -> TrackerResult<(Eval, Benchmark)> {
        let owner = resolve_create_owner(principal, v1.owner_id.as_deref())?;
        let benchmark = Benchmark::from_v1(v1.benchmark.clone(), Some(&owner))?;
        self.store.insert_benchmark(&benchmark).await?;

        let mut eval = Eval::from_v1(v1, &benchmark.id, Some(&owner))?;
        let mut persisted = Vec::with_capacity(eval.tasks.len());
        for task in eval.tasks {
            persisted.push(self.tasks.persist_new(task).await?);
        }
        eval.tasks = persisted;

        self.store
            .insert_eval(&EvalRow {
                id: eval.id.clone(),
                benchmark_id: benchmark.id.clone(),
                owner_id: eval.owner_id.clone(),
                assigned_to: eval.assigned_to.clone(),
                assigned_type: eval.assigned_type.clone(),
                created: eval.created,
                task_ids: eval.tasks.iter().map(|t| t.id.clone()).collect(),
            })
            .await?;
        Ok((eval, benchmark))
    }

    /// Load an eval with its benchmark and materialised tasks.
    pub async fn get_eval(&self, id: &str, principal: &Principal) -> TrackerResult<(Eval, Benchmark)> {
        let resource = format!("eval {id}");
        let row = self
            .store
            .get_eval(id)
            .await?
            .ok_or_else(|| TrackerError::NotFound(resource.clone()))?;
        check_owner(principal, OpKind::Read, row.owner_id.as_deref(), &resource)?;

        let benchmark = self
            .store
            .get_benchmark(&row.benchmark_id)
            .await?
            .ok_or_else(|| {
                TrackerError::DependencyMissing(format!("benchmark {}", row.benchmark_id))
            })?;

        let mut tasks: Vec<Task> = Vec::with_capacity(row.task_ids.len());
        for task_id in &row.task_ids {
            tasks.push(self.tasks.get(task_id, principal).await?);
        }

        Ok((
            Eval {
                id: row.id,
                benchmark_id: row.benchmark_id,
                tasks,
                owner_id: row.owner_id,
                assigned_to: row.assigned_to,
                assigned_type: row.assigned_type,
                created: row.created,
            },
            benchmark,
        ))
    }

    pub async fn find_evals(&self, principal: &Principal) -> TrackerResult<Vec<(Eval, Benchmark)>> {
        let owners = resolve_owner_filter(principal, OpKind::Read, None)?;
        let rows = self.store.find_evals(&owners).await?;
        let mut evals = Vec::with_capacity(rows.len());
        for row in rows {
            evals.push(self.get_eval(&row.id, principal).await?);
        }
        Ok(evals)
    }

    pub async fn delete_eval(&self, id: &str, principal: &Principal) -> TrackerResult<()> {
        let resource = format!("eval {id}");
        let row = self
            .store
            .get_eval(id)
            .await?
            .ok_or_else(|| TrackerError::NotFound(resource.clone()))?;
        check_owner(principal, OpKind::Delete, row.owner_id.as_deref(), &resource)?;
        self.store.delete_eval(id).await
    }
}
