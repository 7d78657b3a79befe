//! SQLite implementation of the prompt store.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::domain::errors::TrackerResult;
use crate::domain::models::Prompt;
use crate::domain::ports::PromptStore;
use crate::infrastructure::database::utils::{from_json, from_json_opt, from_json_or_default, to_json, to_json_opt};

pub struct SqlitePromptStore {
    pool: SqlitePool,
}

impl SqlitePromptStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn prompt_from_row(row: &SqliteRow) -> TrackerResult<Prompt> {
        Ok(Prompt {
            id: row.try_get("id")?,
            task_id: row.try_get("task_id")?,
            namespace: row.try_get("namespace")?,
            thread_id: row.try_get("thread_id")?,
            response: from_json(row.try_get::<String, _>("response")?.as_str())?,
            response_schema: from_json_opt(row.try_get("response_schema")?)?,
            metadata: from_json_or_default(row.try_get("metadata")?)?,
            approved: row.try_get::<i64, _>("approved")? != 0,
            flagged: row.try_get::<i64, _>("flagged")? != 0,
            owner_id: row.try_get("owner_id")?,
            agent_id: row.try_get("agent_id")?,
            model: row.try_get("model")?,
            created: row.try_get("created")?,
        })
    }
}

#[async_trait]
impl PromptStore for SqlitePromptStore {
    async fn upsert(&self, prompt: &Prompt) -> TrackerResult<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO prompts (
                id, task_id, namespace, thread_id, response, response_schema,
                metadata, approved, flagged, owner_id, agent_id, model, created
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&prompt.id)
        .bind(&prompt.task_id)
        .bind(&prompt.namespace)
        .bind(&prompt.thread_id)
        .bind(to_json(&prompt.response)?)
        .bind(to_json_opt(prompt.response_schema.as_ref())?)
        .bind(to_json(&prompt.metadata)?)
        .bind(i64::from(prompt.approved))
        .bind(i64::from(prompt.flagged))
        .bind(&prompt.owner_id)
        .bind(&prompt.agent_id)
        .bind(&prompt.model)
        .bind(prompt.created)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> TrackerResult<Option<Prompt>> {
        let row = sqlx::query("SELECT * FROM prompts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::prompt_from_row).transpose()
    }

    async fn for_task(&self, task_id: &str) -> TrackerResult<Vec<Prompt>> {
        let rows = sqlx::query("SELECT * FROM prompts WHERE task_id = ? ORDER BY created")
            .bind(task_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::prompt_from_row).collect()
    }

    async fn set_approved(&self, id: &str, approved: bool) -> TrackerResult<()> {
        sqlx::query("UPDATE prompts SET approved = ? WHERE id = ?")
            .bind(i64::from(approved))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn approve_all_for_task(&self, task_id: &str) -> TrackerResult<()> {
        sqlx::query("UPDATE prompts SET approved = 1 WHERE task_id = ?")
            .bind(task_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> TrackerResult<()> {
        sqlx::query("DELETE FROM prompts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_for_task(&self, task_id: &str) -> TrackerResult<()> {
        sqlx::query("DELETE FROM prompts WHERE task_id = ?")
            .bind(task_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
