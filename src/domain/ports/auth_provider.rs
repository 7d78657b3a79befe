//! Auth provider port: bearer token to verified principal.

use async_trait::async_trait;

use crate::domain::errors::TrackerResult;
use crate::domain::models::Principal;

/// Verifies bearer tokens. The REST edge calls this before any core
/// operation; the core itself only ever sees the resulting [`Principal`].
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn authenticate(&self, token: &str) -> TrackerResult<Principal>;
}
