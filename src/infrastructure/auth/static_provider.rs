//! Static auth provider for no-auth deployments and tests.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::errors::TrackerResult;
use crate::domain::models::{Principal, OrgMembership, OrgRole};
use crate::domain::ports::AuthProvider;

/// Maps known tokens to principals; any unknown token resolves to the
/// fallback principal. Used when `TASK_SERVER_NO_AUTH` is set, and by the
/// integration tests to fake org memberships.
pub struct StaticAuthProvider {
    fallback: Principal,
    tokens: HashMap<String, Principal>,
}

impl StaticAuthProvider {
    pub fn new(fallback: Principal) -> Self {
        Self {
            fallback,
            tokens: HashMap::new(),
        }
    }

    /// Register a token that resolves to a specific principal.
    pub fn with_token(mut self, token: impl Into<String>, principal: Principal) -> Self {
        self.tokens.insert(token.into(), principal);
        self
    }

    /// Register a token for a principal with one org membership.
    pub fn with_org_token(
        self,
        token: impl Into<String>,
        email: impl Into<String>,
        org_id: impl Into<String>,
        role: OrgRole,
    ) -> Self {
        let mut principal = Principal::new(email);
        principal
            .organizations
            .insert(org_id.into(), OrgMembership { role });
        self.with_token(token, principal)
    }
}

#[async_trait]
impl AuthProvider for StaticAuthProvider {
    async fn authenticate(&self, token: &str) -> TrackerResult<Principal> {
        Ok(self
            .tokens
            .get(token)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone()))
    }
}
