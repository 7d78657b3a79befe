//! SQLite implementation of the thread store.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::domain::errors::TrackerResult;
use crate::domain::models::{RoleMessage, RoleThread};
use crate::domain::ports::ThreadStore;
use crate::infrastructure::database::utils::{from_json_opt, from_json_or_default, to_json, to_json_opt};

pub struct SqliteThreadStore {
    pool: SqlitePool,
}

impl SqliteThreadStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn thread_from_row(row: &SqliteRow) -> TrackerResult<RoleThread> {
        Ok(RoleThread {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            name: row.try_get("name")?,
            public: row.try_get::<i64, _>("public")? != 0,
            metadata: from_json_opt(row.try_get("metadata")?)?,
            created: row.try_get("created")?,
        })
    }

    fn message_from_row(row: &SqliteRow) -> TrackerResult<RoleMessage> {
        Ok(RoleMessage {
            id: row.try_get("id")?,
            thread_id: row.try_get("thread_id")?,
            role: row.try_get("role")?,
            text: row.try_get("text")?,
            images: from_json_or_default(row.try_get("images")?)?,
            private: row.try_get::<i64, _>("private")? != 0,
            metadata: from_json_opt(row.try_get("metadata")?)?,
            created: row.try_get("created")?,
        })
    }
}

#[async_trait]
impl ThreadStore for SqliteThreadStore {
    async fn upsert_thread(&self, thread: &RoleThread) -> TrackerResult<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO threads (id, owner_id, name, public, metadata, created) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&thread.id)
        .bind(&thread.owner_id)
        .bind(&thread.name)
        .bind(i64::from(thread.public))
        .bind(to_json_opt(thread.metadata.as_ref())?)
        .bind(thread.created)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_threads(&self, ids: &[String]) -> TrackerResult<Vec<RoleThread>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM threads WHERE id IN (");
        let mut sep = qb.separated(", ");
        for id in ids {
            sep.push_bind(id);
        }
        qb.push(")");
        let rows = qb.build().fetch_all(&self.pool).await?;
        let mut threads = rows
            .iter()
            .map(Self::thread_from_row)
            .collect::<TrackerResult<Vec<_>>>()?;
        // Preserve the caller's ordering (the task's thread sequence).
        threads.sort_by_key(|t| ids.iter().position(|id| id == &t.id).unwrap_or(usize::MAX));
        Ok(threads)
    }

    async fn delete_thread(&self, id: &str) -> TrackerResult<()> {
        sqlx::query("DELETE FROM messages WHERE thread_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM threads WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn post_message(&self, message: &RoleMessage) -> TrackerResult<()> {
        sqlx::query(
            "INSERT INTO messages (id, thread_id, role, text, images, private, metadata, created) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&message.id)
        .bind(&message.thread_id)
        .bind(&message.role)
        .bind(&message.text)
        .bind(to_json(&message.images)?)
        .bind(i64::from(message.private))
        .bind(to_json_opt(message.metadata.as_ref())?)
        .bind(message.created)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn messages(&self, thread_id: &str) -> TrackerResult<Vec<RoleMessage>> {
        let rows = sqlx::query("SELECT * FROM messages WHERE thread_id = ? ORDER BY created")
            .bind(thread_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::message_from_row).collect()
    }
}
