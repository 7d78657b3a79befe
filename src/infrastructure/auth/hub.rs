//! Hub-backed auth provider.
//!
//! Verifies bearer tokens against the auth hub's `/v1/users/me` endpoint
//! and maps the returned profile to a principal with its organisation
//! roles.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use tracing::debug;

use crate::domain::errors::{TrackerError, TrackerResult};
use crate::domain::models::wire::V1UserProfile;
use crate::domain::models::{OrgMembership, OrgRole, Principal};
use crate::domain::ports::AuthProvider;

pub struct HubAuthProvider {
    http: ReqwestClient,
    hub_url: String,
}

impl HubAuthProvider {
    pub fn new(hub_url: impl Into<String>) -> TrackerResult<Self> {
        let http = ReqwestClient::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| TrackerError::Transient(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            hub_url: hub_url.into(),
        })
    }
}

#[async_trait]
impl AuthProvider for HubAuthProvider {
    async fn authenticate(&self, token: &str) -> TrackerResult<Principal> {
        let url = format!("{}/v1/users/me", self.hub_url.trim_end_matches('/'));
        debug!(%url, "verifying bearer token against hub");

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| TrackerError::Unauthorized(format!("token verification failed: {e}")))?;

        if !response.status().is_success() {
            return Err(TrackerError::Unauthorized(
                "token was rejected, please log in".into(),
            ));
        }

        let profile: V1UserProfile = response
            .json()
            .await
            .map_err(|e| TrackerError::Unauthorized(format!("malformed hub profile: {e}")))?;
        let email = profile
            .email
            .ok_or_else(|| TrackerError::Unauthorized("hub profile has no email".into()))?;

        let mut organizations = HashMap::new();
        for (org_id, membership) in profile.organizations {
            if let Some(role) = OrgRole::from_str(&membership.role) {
                organizations.insert(org_id, OrgMembership { role });
            }
        }

        Ok(Principal {
            email,
            organizations,
        })
    }
}
