//! Shared test helpers.

pub mod database;

use std::sync::Arc;

use tempfile::TempDir;

use trackway::api::{build_state, AppState};
use trackway::domain::models::{Config, Principal};
use trackway::domain::ports::AuthProvider;
use trackway::infrastructure::auth::StaticAuthProvider;
use trackway::infrastructure::credentials::CredentialVault;

/// Build a full application state over a fresh temp database.
///
/// The returned `TempDir` keeps the database file alive for the test.
pub async fn test_state(auth: Arc<dyn AuthProvider>) -> (AppState, TempDir) {
    let (pool, dir) = database::setup_test_db().await;
    let config = Config::default();
    let vault = Arc::new(CredentialVault::from_key([42u8; 32]));
    let state = build_state(pool, &config, vault, auth).expect("failed to build state");
    (state, dir)
}

/// State whose auth resolves every token to the given principal.
pub async fn test_state_as(email: &str) -> (AppState, TempDir) {
    let auth = Arc::new(StaticAuthProvider::new(Principal::new(email)));
    test_state(auth).await
}
