//! SQLite implementation of the flag store.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::domain::errors::{TrackerError, TrackerResult};
use crate::domain::models::{Flag, FlagKind};
use crate::domain::ports::FlagStore;
use crate::infrastructure::database::utils::{from_json, from_json_opt, to_json};

pub struct SqliteFlagStore {
    pool: SqlitePool,
}

impl SqliteFlagStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn flag_from_row(row: &SqliteRow) -> TrackerResult<Flag> {
        let kind_raw: String = row.try_get("type")?;
        let kind = FlagKind::from_str(&kind_raw)
            .ok_or_else(|| TrackerError::Database(format!("unknown flag type '{kind_raw}'")))?;
        Ok(Flag {
            id: row.try_get("id")?,
            kind,
            payload: from_json(row.try_get::<String, _>("flag")?.as_str())?,
            result: from_json_opt(row.try_get("result")?)?,
            created: row.try_get("created")?,
        })
    }
}

#[async_trait]
impl FlagStore for SqliteFlagStore {
    async fn insert(&self, flag: &Flag) -> TrackerResult<()> {
        sqlx::query("INSERT OR REPLACE INTO flags (id, type, flag, result, created) VALUES (?, ?, ?, ?, ?)")
            .bind(&flag.id)
            .bind(flag.kind.as_str())
            .bind(to_json(&flag.payload)?)
            .bind(flag.result.as_ref().map(to_json).transpose()?)
            .bind(flag.created)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> TrackerResult<Option<Flag>> {
        let row = sqlx::query("SELECT * FROM flags WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::flag_from_row).transpose()
    }

    async fn find(&self, kind: Option<&str>) -> TrackerResult<Vec<Flag>> {
        let rows = match kind {
            Some(kind) => {
                sqlx::query("SELECT * FROM flags WHERE type = ? ORDER BY created DESC")
                    .bind(kind)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("SELECT * FROM flags ORDER BY created DESC")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.iter().map(Self::flag_from_row).collect()
    }

    async fn set_result(&self, id: &str, result: &serde_json::Value) -> TrackerResult<()> {
        let updated = sqlx::query("UPDATE flags SET result = ? WHERE id = ?")
            .bind(to_json(result)?)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(TrackerError::NotFound(format!("flag {id}")));
        }
        Ok(())
    }
}
