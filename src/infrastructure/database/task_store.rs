//! SQLite implementation of the task store.
//!
//! Tags and labels are persisted through normalised join tables so that
//! tag/label queries use indexes rather than substring matches on JSON.
//! The device column is the only encrypted column; this store is the
//! boundary where the vault is applied.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::domain::errors::{TrackerError, TrackerResult};
use crate::domain::models::{short_id, Review, ReviewRequirement, TaskStatus};
use crate::domain::ports::{TaskFilter, TaskLite, TaskRow, TaskStore};
use crate::infrastructure::credentials::CredentialVault;
use crate::infrastructure::database::review_store::{review_from_row, requirement_from_row};
use crate::infrastructure::database::utils::{from_json_opt, from_json_or_default, to_json, to_json_opt};

pub struct SqliteTaskStore {
    pool: SqlitePool,
    vault: Arc<CredentialVault>,
}

impl SqliteTaskStore {
    pub fn new(pool: SqlitePool, vault: Arc<CredentialVault>) -> Self {
        Self { pool, vault }
    }

    fn row_to_task_row(&self, row: &SqliteRow) -> TrackerResult<TaskRow> {
        let status_raw: String = row.try_get("status")?;
        let status = TaskStatus::from_str(&status_raw)
            .ok_or_else(|| TrackerError::Database(format!("unknown status '{status_raw}' in store")))?;

        let device_raw: Option<String> = row.try_get("device")?;
        let device = self.vault.decrypt_device(device_raw.as_deref())?;

        Ok(TaskRow {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            created_by: row.try_get("created_by")?,
            parent_id: row.try_get("parent_id")?,
            description: row.try_get("description")?,
            max_steps: row.try_get::<i64, _>("max_steps")? as u32,
            device,
            device_type: from_json_opt(row.try_get("device_type")?)?,
            expect_schema: from_json_opt(row.try_get("expect")?)?,
            project: row.try_get("project")?,
            skill: row.try_get("skill")?,
            status,
            created: row.try_get("created")?,
            started: row.try_get("started")?,
            completed: row.try_get("completed")?,
            assigned_to: row.try_get("assigned_to")?,
            assigned_type: row.try_get("assigned_type")?,
            error: row.try_get("error")?,
            output: row.try_get("output")?,
            parameters: from_json_or_default(row.try_get("parameters")?)?,
            labels: BTreeMap::new(),
            tags: Vec::new(),
            thread_ids: from_json_or_default(row.try_get("threads")?)?,
            prompt_ids: from_json_or_default(row.try_get("prompts")?)?,
            episode_id: row.try_get("episode_id")?,
            version: row.try_get("version")?,
        })
    }

    /// Fill tags and labels for a batch of rows in two queries.
    async fn attach_tags_and_labels(&self, rows: &mut [TaskRow]) -> TrackerResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT a.task_id AS task_id, g.tag AS tag \
             FROM task_tag_association a JOIN tags g ON g.id = a.tag_id \
             WHERE a.task_id IN (",
        );
        let mut sep = qb.separated(", ");
        for id in &ids {
            sep.push_bind(id);
        }
        qb.push(")");
        let tag_rows = qb.build().fetch_all(&self.pool).await?;

        let mut tags_by_task: HashMap<String, Vec<String>> = HashMap::new();
        for row in &tag_rows {
            let task_id: String = row.try_get("task_id")?;
            let tag: String = row.try_get("tag")?;
            tags_by_task.entry(task_id).or_default().push(tag);
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT a.task_id AS task_id, l.key AS key, l.value AS value \
             FROM task_label_association a JOIN labels l ON l.id = a.label_id \
             WHERE a.task_id IN (",
        );
        let mut sep = qb.separated(", ");
        for id in &ids {
            sep.push_bind(id);
        }
        qb.push(")");
        let label_rows = qb.build().fetch_all(&self.pool).await?;

        let mut labels_by_task: HashMap<String, BTreeMap<String, String>> = HashMap::new();
        for row in &label_rows {
            let task_id: String = row.try_get("task_id")?;
            let key: String = row.try_get("key")?;
            let value: String = row.try_get("value")?;
            labels_by_task.entry(task_id).or_default().insert(key, value);
        }

        for row in rows.iter_mut() {
            if let Some(mut tags) = tags_by_task.remove(&row.id) {
                tags.sort();
                row.tags = tags;
            }
            if let Some(labels) = labels_by_task.remove(&row.id) {
                row.labels = labels;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn upsert(&self, row: &TaskRow) -> TrackerResult<()> {
        let device = row
            .device
            .as_ref()
            .map(|d| self.vault.encrypt_device(d))
            .transpose()?;
        let device_type = to_json_opt(row.device_type.as_ref())?;
        let expect = to_json_opt(row.expect_schema.as_ref())?;
        let parameters = to_json(&row.parameters)?;
        let threads = to_json(&row.thread_ids)?;
        let prompts = to_json(&row.prompt_ids)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT OR REPLACE INTO tasks (
                id, owner_id, created_by, parent_id, description, max_steps,
                device, device_type, expect, project, skill, status,
                created, started, completed, assigned_to, assigned_type,
                error, output, threads, prompts, parameters, version, episode_id
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&row.id)
        .bind(&row.owner_id)
        .bind(&row.created_by)
        .bind(&row.parent_id)
        .bind(&row.description)
        .bind(i64::from(row.max_steps))
        .bind(&device)
        .bind(&device_type)
        .bind(&expect)
        .bind(&row.project)
        .bind(&row.skill)
        .bind(row.status.as_str())
        .bind(row.created)
        .bind(row.started)
        .bind(row.completed)
        .bind(&row.assigned_to)
        .bind(&row.assigned_type)
        .bind(&row.error)
        .bind(&row.output)
        .bind(&threads)
        .bind(&prompts)
        .bind(&parameters)
        .bind(&row.version)
        .bind(&row.episode_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM task_tag_association WHERE task_id = ?")
            .bind(&row.id)
            .execute(&mut *tx)
            .await?;
        for tag in &row.tags {
            sqlx::query("INSERT OR IGNORE INTO tags (id, tag) VALUES (?, ?)")
                .bind(short_id())
                .bind(tag)
                .execute(&mut *tx)
                .await?;
            sqlx::query(
                "INSERT OR IGNORE INTO task_tag_association (task_id, tag_id) \
                 SELECT ?, id FROM tags WHERE tag = ?",
            )
            .bind(&row.id)
            .bind(tag)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM task_label_association WHERE task_id = ?")
            .bind(&row.id)
            .execute(&mut *tx)
            .await?;
        for (key, value) in &row.labels {
            sqlx::query(
                "INSERT INTO labels (id, key, value) \
                 SELECT ?, ?, ? WHERE NOT EXISTS (SELECT 1 FROM labels WHERE key = ? AND value = ?)",
            )
            .bind(short_id())
            .bind(key)
            .bind(value)
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
            sqlx::query(
                "INSERT OR IGNORE INTO task_label_association (task_id, label_id) \
                 SELECT ?, id FROM labels WHERE key = ? AND value = ?",
            )
            .bind(&row.id)
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> TrackerResult<Option<TaskRow>> {
        let row = sqlx::query("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut rows = vec![self.row_to_task_row(&row)?];
        self.attach_tags_and_labels(&mut rows).await?;
        Ok(rows.pop())
    }

    async fn find(&self, filter: &TaskFilter) -> TrackerResult<Vec<TaskRow>> {
        if filter.owners.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT t.* FROM tasks t WHERE t.owner_id IN (");
        let mut sep = qb.separated(", ");
        for owner in &filter.owners {
            sep.push_bind(owner);
        }
        qb.push(")");

        if let Some(id) = &filter.id {
            qb.push(" AND t.id = ").push_bind(id);
        }
        if let Some(status) = &filter.status {
            qb.push(" AND t.status = ").push_bind(status);
        }
        if let Some(assigned_to) = &filter.assigned_to {
            qb.push(" AND t.assigned_to = ").push_bind(assigned_to);
        }
        if let Some(assigned_type) = &filter.assigned_type {
            qb.push(" AND t.assigned_type = ").push_bind(assigned_type);
        }
        if let Some(device) = &filter.device {
            qb.push(" AND t.device = ").push_bind(device);
        }
        if let Some(device_type) = &filter.device_type {
            qb.push(" AND t.device_type = ").push_bind(device_type);
        }
        if let Some(parent_id) = &filter.parent_id {
            qb.push(" AND t.parent_id = ").push_bind(parent_id);
        }
        if let Some(project) = &filter.project {
            qb.push(" AND t.project = ").push_bind(project);
        }
        if let Some(skill) = &filter.skill {
            qb.push(" AND t.skill = ").push_bind(skill);
        }
        for tag in &filter.tags {
            qb.push(
                " AND t.id IN (SELECT a.task_id FROM task_tag_association a \
                 JOIN tags g ON g.id = a.tag_id WHERE g.tag = ",
            )
            .push_bind(tag)
            .push(")");
        }
        for (key, value) in &filter.labels {
            qb.push(
                " AND t.id IN (SELECT a.task_id FROM task_label_association a \
                 JOIN labels l ON l.id = a.label_id WHERE l.key = ",
            )
            .push_bind(key)
            .push(" AND l.value = ")
            .push_bind(value)
            .push(")");
        }
        qb.push(" ORDER BY t.created DESC");

        let raw_rows = qb.build().fetch_all(&self.pool).await?;
        let mut rows = Vec::with_capacity(raw_rows.len());
        for raw in &raw_rows {
            rows.push(self.row_to_task_row(raw)?);
        }
        self.attach_tags_and_labels(&mut rows).await?;
        Ok(rows)
    }

    async fn find_many_lite(&self, ids: &[String]) -> TrackerResult<Vec<TaskLite>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM tasks WHERE id IN (");
        let mut sep = qb.separated(", ");
        for id in ids {
            sep.push_bind(id);
        }
        qb.push(")");
        let raw_rows = qb.build().fetch_all(&self.pool).await?;

        let mut rows = Vec::with_capacity(raw_rows.len());
        for raw in &raw_rows {
            rows.push(self.row_to_task_row(raw)?);
        }
        self.attach_tags_and_labels(&mut rows).await?;

        let found_ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        if found_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT * FROM reviews WHERE resource_type = 'task' AND resource_id IN (",
        );
        let mut sep = qb.separated(", ");
        for id in &found_ids {
            sep.push_bind(id);
        }
        qb.push(")");
        let review_rows = qb.build().fetch_all(&self.pool).await?;
        let mut reviews_by_task: HashMap<String, Vec<Review>> = HashMap::new();
        for raw in &review_rows {
            let review = review_from_row(raw)?;
            reviews_by_task
                .entry(review.resource_id.clone())
                .or_default()
                .push(review);
        }

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM review_requirements WHERE task_id IN (");
        let mut sep = qb.separated(", ");
        for id in &found_ids {
            sep.push_bind(id);
        }
        qb.push(")");
        let req_rows = qb.build().fetch_all(&self.pool).await?;
        let mut reqs_by_task: HashMap<String, Vec<ReviewRequirement>> = HashMap::new();
        for raw in &req_rows {
            let req = requirement_from_row(raw)?;
            reqs_by_task
                .entry(req.task_id.clone())
                .or_default()
                .push(req);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let reviews = reviews_by_task.remove(&row.id).unwrap_or_default();
                let review_requirements = reqs_by_task.remove(&row.id).unwrap_or_default();
                TaskLite {
                    row,
                    reviews,
                    review_requirements,
                }
            })
            .collect())
    }

    async fn delete(&self, id: &str) -> TrackerResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM task_tag_association WHERE task_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM task_label_association WHERE task_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}
