//! SQLite implementation of the benchmark and eval store.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::domain::errors::{TrackerError, TrackerResult};
use crate::domain::models::{Benchmark, TaskTemplate};
use crate::domain::ports::{BenchmarkStore, EvalRow};
use crate::infrastructure::database::utils::{from_json_opt, from_json_or_default, to_json, to_json_opt};

pub struct SqliteBenchmarkStore {
    pool: SqlitePool,
}

impl SqliteBenchmarkStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn template_from_row(row: &SqliteRow) -> TrackerResult<TaskTemplate> {
        Ok(TaskTemplate {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            description: row.try_get("description")?,
            max_steps: row.try_get::<i64, _>("max_steps")? as u32,
            device: from_json_opt(row.try_get("device")?)?,
            device_type: from_json_opt(row.try_get("device_type")?)?,
            expect_schema: from_json_opt(row.try_get("expect")?)?,
            parameters: from_json_or_default(row.try_get("parameters")?)?,
            tags: from_json_or_default(row.try_get("tags")?)?,
            labels: from_json_or_default(row.try_get("labels")?)?,
            created: row.try_get("created")?,
        })
    }

    async fn templates_for(&self, benchmark_id: &str) -> TrackerResult<Vec<TaskTemplate>> {
        let rows = sqlx::query(
            "SELECT t.* FROM task_templates t \
             JOIN benchmark_task_association a ON a.task_template_id = t.id \
             WHERE a.benchmark_id = ? ORDER BY t.created",
        )
        .bind(benchmark_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::template_from_row).collect()
    }

    fn benchmark_from_row(row: &SqliteRow) -> TrackerResult<Benchmark> {
        Ok(Benchmark {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            tasks: Vec::new(),
            labels: from_json_or_default(row.try_get("labels")?)?,
            tags: from_json_or_default(row.try_get("tags")?)?,
            public: row.try_get::<i64, _>("public")? != 0,
            created: row.try_get("created")?,
        })
    }

    fn eval_from_row(row: &SqliteRow) -> TrackerResult<EvalRow> {
        Ok(EvalRow {
            id: row.try_get("id")?,
            benchmark_id: row.try_get("benchmark_id")?,
            owner_id: row.try_get("owner_id")?,
            assigned_to: row.try_get("assigned_to")?,
            assigned_type: row.try_get("assigned_type")?,
            created: row.try_get("created")?,
            task_ids: Vec::new(),
        })
    }

    async fn eval_task_ids(&self, eval_id: &str) -> TrackerResult<Vec<String>> {
        let rows = sqlx::query("SELECT task_id FROM eval_task_association WHERE eval_id = ?")
            .bind(eval_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|r| r.try_get::<String, _>("task_id").map_err(TrackerError::from))
            .collect()
    }
}

#[async_trait]
impl BenchmarkStore for SqliteBenchmarkStore {
    async fn insert_benchmark(&self, benchmark: &Benchmark) -> TrackerResult<()> {
        let mut tx = self.pool.begin().await?;

        // Name uniqueness is decided inside the write itself: the insert is
        // guarded by the name check, and the UNIQUE constraint (mapped to
        // Conflict) covers any race the guard cannot see.
        let inserted = sqlx::query(
            "INSERT INTO benchmarks (id, owner_id, name, description, public, tags, labels, created) \
             SELECT ?, ?, ?, ?, ?, ?, ?, ? \
             WHERE NOT EXISTS (SELECT 1 FROM benchmarks WHERE name = ?)",
        )
        .bind(&benchmark.id)
        .bind(&benchmark.owner_id)
        .bind(&benchmark.name)
        .bind(&benchmark.description)
        .bind(i64::from(benchmark.public))
        .bind(to_json(&benchmark.tags)?)
        .bind(to_json(&benchmark.labels)?)
        .bind(benchmark.created)
        .bind(&benchmark.name)
        .execute(&mut *tx)
        .await?;
        if inserted.rows_affected() == 0 {
            return Err(TrackerError::Conflict(format!(
                "benchmark name '{}' is taken",
                benchmark.name
            )));
        }

        for template in &benchmark.tasks {
            sqlx::query(
                "INSERT OR REPLACE INTO task_templates (
                    id, owner_id, description, max_steps, device, device_type,
                    expect, parameters, tags, labels, created
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&template.id)
            .bind(&template.owner_id)
            .bind(&template.description)
            .bind(i64::from(template.max_steps))
            .bind(to_json_opt(template.device.as_ref())?)
            .bind(to_json_opt(template.device_type.as_ref())?)
            .bind(to_json_opt(template.expect_schema.as_ref())?)
            .bind(to_json(&template.parameters)?)
            .bind(to_json(&template.tags)?)
            .bind(to_json(&template.labels)?)
            .bind(template.created)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT OR IGNORE INTO benchmark_task_association (benchmark_id, task_template_id) \
                 VALUES (?, ?)",
            )
            .bind(&benchmark.id)
            .bind(&template.id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_benchmark(&self, id: &str) -> TrackerResult<Option<Benchmark>> {
        let row = sqlx::query("SELECT * FROM benchmarks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut benchmark = Self::benchmark_from_row(&row)?;
        benchmark.tasks = self.templates_for(&benchmark.id).await?;
        Ok(Some(benchmark))
    }

    async fn find_benchmarks(&self, owners: &[String]) -> TrackerResult<Vec<Benchmark>> {
        if owners.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM benchmarks WHERE owner_id IN (");
        let mut sep = qb.separated(", ");
        for owner in owners {
            sep.push_bind(owner);
        }
        qb.push(") ORDER BY created DESC");
        let rows = qb.build().fetch_all(&self.pool).await?;
        let mut benchmarks = Vec::with_capacity(rows.len());
        for raw in &rows {
            let mut benchmark = Self::benchmark_from_row(raw)?;
            benchmark.tasks = self.templates_for(&benchmark.id).await?;
            benchmarks.push(benchmark);
        }
        Ok(benchmarks)
    }

    async fn delete_benchmark(&self, id: &str) -> TrackerResult<()> {
        let mut tx = self.pool.begin().await?;
        let template_ids: Vec<String> = sqlx::query(
            "SELECT task_template_id FROM benchmark_task_association WHERE benchmark_id = ?",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(|r| r.try_get::<String, _>("task_template_id"))
        .collect::<Result<_, _>>()?;
        sqlx::query("DELETE FROM benchmark_task_association WHERE benchmark_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        for template_id in &template_ids {
            sqlx::query("DELETE FROM task_templates WHERE id = ?")
                .bind(template_id)
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query("DELETE FROM benchmarks WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn insert_eval(&self, eval: &EvalRow) -> TrackerResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT OR REPLACE INTO evals (id, owner_id, benchmark_id, assigned_to, assigned_type, created) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&eval.id)
        .bind(&eval.owner_id)
        .bind(&eval.benchmark_id)
        .bind(&eval.assigned_to)
        .bind(&eval.assigned_type)
        .bind(eval.created)
        .execute(&mut *tx)
        .await?;
        for task_id in &eval.task_ids {
            sqlx::query("INSERT OR IGNORE INTO eval_task_association (eval_id, task_id) VALUES (?, ?)")
                .bind(&eval.id)
                .bind(task_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_eval(&self, id: &str) -> TrackerResult<Option<EvalRow>> {
        let row = sqlx::query("SELECT * FROM evals WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut eval = Self::eval_from_row(&row)?;
        eval.task_ids = self.eval_task_ids(&eval.id).await?;
        Ok(Some(eval))
    }

    async fn find_evals(&self, owners: &[String]) -> TrackerResult<Vec<EvalRow>> {
        if owners.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM evals WHERE owner_id IN (");
        let mut sep = qb.separated(", ");
        for owner in owners {
            sep.push_bind(owner);
        }
        qb.push(") ORDER BY created DESC");
        let rows = qb.build().fetch_all(&self.pool).await?;
        let mut evals = Vec::with_capacity(rows.len());
        for raw in &rows {
            let mut eval = Self::eval_from_row(raw)?;
            eval.task_ids = self.eval_task_ids(&eval.id).await?;
            evals.push(eval);
        }
        Ok(evals)
    }

    async fn delete_eval(&self, id: &str) -> TrackerResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM eval_task_association WHERE eval_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM evals WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}
