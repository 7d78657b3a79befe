//! SQLite persistence for the tracker registry.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::domain::errors::{TrackerError, TrackerResult};
use crate::domain::models::Tracker;
use crate::infrastructure::database::utils::{from_json_opt, from_json_or_default, to_json, to_json_opt};

pub struct SqliteTrackerStore {
    pool: SqlitePool,
}

impl SqliteTrackerStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn tracker_from_row(row: &SqliteRow) -> TrackerResult<Tracker> {
        Ok(Tracker {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            runtime_name: row.try_get("runtime_name")?,
            runtime_config: from_json_opt(row.try_get("runtime_config")?)?,
            status: row.try_get("status")?,
            port: row.try_get::<i64, _>("port")? as u16,
            owner_id: row.try_get("owner_id")?,
            labels: from_json_or_default(row.try_get("labels")?)?,
            created: row.try_get("created")?,
            updated: row.try_get("updated")?,
        })
    }

    pub async fn upsert(&self, tracker: &Tracker) -> TrackerResult<()> {
        // One atomic statement: replace our own registration freely, refuse
        // when the name belongs to a different tracker. The UNIQUE
        // constraint (mapped to Conflict) covers any race the guard cannot
        // see.
        let written = sqlx::query(
            "INSERT OR REPLACE INTO trackers (
                id, name, runtime_name, runtime_config, status, port, owner_id, labels, created, updated
            ) SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?, ? \
              WHERE NOT EXISTS (SELECT 1 FROM trackers WHERE name = ? AND id != ?)",
        )
        .bind(&tracker.id)
        .bind(&tracker.name)
        .bind(&tracker.runtime_name)
        .bind(to_json_opt(tracker.runtime_config.as_ref())?)
        .bind(&tracker.status)
        .bind(i64::from(tracker.port))
        .bind(&tracker.owner_id)
        .bind(to_json(&tracker.labels)?)
        .bind(tracker.created)
        .bind(tracker.updated)
        .bind(&tracker.name)
        .bind(&tracker.id)
        .execute(&self.pool)
        .await?;
        if written.rows_affected() == 0 {
            return Err(TrackerError::Conflict(format!(
                "tracker name '{}' is taken",
                tracker.name
            )));
        }
        Ok(())
    }

    pub async fn list(&self, owners: &[String]) -> TrackerResult<Vec<Tracker>> {
        let rows = sqlx::query("SELECT * FROM trackers ORDER BY created DESC")
            .fetch_all(&self.pool)
            .await?;
        let mut trackers = Vec::new();
        for raw in &rows {
            let tracker = Self::tracker_from_row(raw)?;
            let visible = tracker
                .owner_id
                .as_ref()
                .is_none_or(|owner| owners.contains(owner));
            if visible {
                trackers.push(tracker);
            }
        }
        Ok(trackers)
    }

    pub async fn delete(&self, id: &str) -> TrackerResult<()> {
        sqlx::query("DELETE FROM trackers WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
