//! Database connection pool manager.
//!
//! Manages the `SQLite` connection pool with WAL mode enabled for better
//! concurrency. Handles connection lifecycle, migrations, and configuration.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};

use crate::domain::errors::{TrackerError, TrackerResult};

/// Connection pool with SQLite configuration tuned for concurrent access.
pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    /// Create a new connection pool.
    ///
    /// * `database_url` - `SQLite` URL, e.g. `sqlite:.trackway/data/tasks.db`
    ///
    /// Journal mode WAL, synchronous NORMAL, foreign keys on, 5s busy
    /// timeout, 1-10 pooled connections.
    pub async fn new(database_url: &str) -> TrackerResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| TrackerError::Database(format!("invalid database URL: {e}")))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(10)
            .idle_timeout(Duration::from_secs(30))
            .max_lifetime(Duration::from_secs(1800))
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(|e| TrackerError::Database(format!("failed to create connection pool: {e}")))?;

        Ok(Self { pool })
    }

    /// Apply all pending migrations. Safe to call repeatedly.
    pub async fn migrate(&self) -> TrackerResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| TrackerError::Database(format!("migration failed: {e}")))?;
        Ok(())
    }

    /// The pool handle, passed to store implementations.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close all connections. Call during shutdown.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connection_and_migration() {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = format!("sqlite:{}/test.db", dir.path().display());
        let db = DatabaseConnection::new(&url)
            .await
            .expect("failed to create connection");

        db.migrate().await.expect("failed to run migrations");

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name != '_sqlx_migrations' ORDER BY name",
        )
        .fetch_all(db.pool())
        .await
        .expect("failed to query tables");

        let names: Vec<String> = tables.into_iter().map(|t| t.0).collect();
        for expected in [
            "tasks",
            "task_templates",
            "benchmarks",
            "evals",
            "benchmark_task_association",
            "eval_task_association",
            "tags",
            "labels",
            "task_tag_association",
            "task_label_association",
            "review_requirements",
            "pending_reviewers",
            "trackers",
            "flags",
            "threads",
            "messages",
            "prompts",
            "episodes",
            "action_events",
            "reviews",
            "annotations",
        ] {
            assert!(names.contains(&expected.to_string()), "{expected} table should exist");
        }

        db.close().await;
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = format!("sqlite:{}/fk.db", dir.path().display());
        let db = DatabaseConnection::new(&url).await.expect("connect");
        let result: (i32,) = sqlx::query_as("PRAGMA foreign_keys")
            .fetch_one(db.pool())
            .await
            .expect("pragma");
        assert_eq!(result.0, 1);
        db.close().await;
    }
}
