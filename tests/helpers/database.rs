//! Test database setup.

use sqlx::SqlitePool;
use tempfile::TempDir;

use trackway::infrastructure::database::DatabaseConnection;

/// Create a migrated file-backed SQLite database in a temp directory.
/// The `TempDir` must stay alive for the duration of the test.
pub async fn setup_test_db() -> (SqlitePool, TempDir) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let url = format!("sqlite:{}/test.db", dir.path().display());
    let db = DatabaseConnection::new(&url)
        .await
        .expect("failed to create database connection");
    db.migrate().await.expect("failed to run migrations");
    (db.pool().clone(), dir)
}
