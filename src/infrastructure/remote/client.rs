//! HTTP client for peer trackers.
//!
//! When a task carries a remote endpoint, every aggregate operation is
//! forwarded here with the task's auth token (falling back to the
//! `HUB_API_KEY` environment variable, then the configured key). Non-2xx
//! responses surface unchanged as `RemoteFailure`; the one exception is the
//! existence probe used by save, where 404 selects create-over-update.

use std::time::Duration;

use reqwest::{Client as ReqwestClient, Method, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::domain::errors::{TrackerError, TrackerResult};
use crate::domain::models::wire::{
    V1ActionEvent, V1ActionEvents, V1AddThread, V1CreateReview, V1PostMessage, V1Prompt,
    V1RemoveThread, V1ReviewMany, V1Task, V1TaskUpdate, V1Tasks,
};

const HUB_API_KEY_ENV: &str = "HUB_API_KEY";

pub struct RemoteClient {
    http: ReqwestClient,
    fallback_api_key: Option<String>,
}

impl RemoteClient {
    pub fn new(fallback_api_key: Option<String>, timeout_secs: u64) -> TrackerResult<Self> {
        let http = ReqwestClient::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .pool_max_idle_per_host(10)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| TrackerError::Transient(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            fallback_api_key,
        })
    }

    fn bearer(&self, auth_token: Option<&str>) -> TrackerResult<String> {
        if let Some(token) = auth_token {
            return Ok(token.to_string());
        }
        if let Ok(token) = std::env::var(HUB_API_KEY_ENV) {
            if !token.is_empty() {
                return Ok(token);
            }
        }
        if let Some(token) = &self.fallback_api_key {
            return Ok(token.clone());
        }
        Err(TrackerError::Unauthorized(format!(
            "no auth token for remote tracker; set ${HUB_API_KEY_ENV}"
        )))
    }

    async fn request(
        &self,
        base_url: &str,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<&Value>,
    ) -> TrackerResult<Option<Value>> {
        let url = format!("{}{}", base_url.trim_end_matches('/'), path);
        debug!(%url, method = %method, "forwarding to remote tracker");

        let mut request = self
            .http
            .request(method, &url)
            .bearer_auth(self.bearer(auth_token)?);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(TrackerError::from)?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TrackerError::RemoteFailure {
                status: status.as_u16(),
                message,
            });
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let raw = response.text().await.map_err(TrackerError::from)?;
        if raw.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn parse<T: serde::de::DeserializeOwned>(payload: Option<Value>) -> TrackerResult<T> {
        let value = payload
            .ok_or_else(|| TrackerError::RemoteFailure {
                status: 0,
                message: "empty response body".into(),
            })?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn get_task(
        &self,
        base_url: &str,
        auth_token: Option<&str>,
        task_id: &str,
    ) -> TrackerResult<V1Task> {
        let payload = self
            .request(base_url, Method::GET, &format!("/v1/tasks/{task_id}"), auth_token, None)
            .await?;
        Self::parse(payload)
    }

    /// Existence probe for save: 404 is not an error, it selects create.
    pub async fn try_get_task(
        &self,
        base_url: &str,
        auth_token: Option<&str>,
        task_id: &str,
    ) -> TrackerResult<Option<V1Task>> {
        match self.get_task(base_url, auth_token, task_id).await {
            Ok(task) => Ok(Some(task)),
            Err(TrackerError::RemoteFailure { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn create_task(
        &self,
        base_url: &str,
        auth_token: Option<&str>,
        task: &V1Task,
    ) -> TrackerResult<V1Task> {
        let body = serde_json::to_value(task)?;
        let payload = self
            .request(base_url, Method::POST, "/v1/tasks", auth_token, Some(&body))
            .await?;
        Self::parse(payload)
    }

    pub async fn update_task(
        &self,
        base_url: &str,
        auth_token: Option<&str>,
        task_id: &str,
        update: &V1TaskUpdate,
    ) -> TrackerResult<V1Task> {
        let body = serde_json::to_value(update)?;
        let payload = self
            .request(
                base_url,
                Method::PUT,
                &format!("/v1/tasks/{task_id}"),
                auth_token,
                Some(&body),
            )
            .await?;
        Self::parse(payload)
    }

    pub async fn delete_task(
        &self,
        base_url: &str,
        auth_token: Option<&str>,
        task_id: &str,
    ) -> TrackerResult<()> {
        self.request(
            base_url,
            Method::DELETE,
            &format!("/v1/tasks/{task_id}"),
            auth_token,
            None,
        )
        .await?;
        Ok(())
    }

    pub async fn find_tasks(
        &self,
        base_url: &str,
        auth_token: Option<&str>,
        query: &[(String, String)],
    ) -> TrackerResult<V1Tasks> {
        let mut path = "/v1/tasks".to_string();
        if !query.is_empty() {
            let encoded: Vec<String> = query
                .iter()
                .map(|(k, v)| format!("{k}={}", urlencode(v)))
                .collect();
            path = format!("{path}?{}", encoded.join("&"));
        }
        let payload = self
            .request(base_url, Method::GET, &path, auth_token, None)
            .await?;
        Self::parse(payload)
    }

    pub async fn review_task(
        &self,
        base_url: &str,
        auth_token: Option<&str>,
        task_id: &str,
        review: &V1CreateReview,
    ) -> TrackerResult<V1Task> {
        let body = serde_json::to_value(review)?;
        let payload = self
            .request(
                base_url,
                Method::PUT,
                &format!("/v1/tasks/{task_id}/review"),
                auth_token,
                Some(&body),
            )
            .await?;
        Self::parse(payload)
    }

    pub async fn post_message(
        &self,
        base_url: &str,
        auth_token: Option<&str>,
        task_id: &str,
        message: &V1PostMessage,
    ) -> TrackerResult<()> {
        let body = serde_json::to_value(message)?;
        self.request(
            base_url,
            Method::POST,
            &format!("/v1/tasks/{task_id}/msg"),
            auth_token,
            Some(&body),
        )
        .await?;
        Ok(())
    }

    pub async fn create_thread(
        &self,
        base_url: &str,
        auth_token: Option<&str>,
        task_id: &str,
        thread: &V1AddThread,
    ) -> TrackerResult<()> {
        let body = serde_json::to_value(thread)?;
        self.request(
            base_url,
            Method::POST,
            &format!("/v1/tasks/{task_id}/threads"),
            auth_token,
            Some(&body),
        )
        .await?;
        Ok(())
    }

    pub async fn remove_thread(
        &self,
        base_url: &str,
        auth_token: Option<&str>,
        task_id: &str,
        thread: &V1RemoveThread,
    ) -> TrackerResult<()> {
        let body = serde_json::to_value(thread)?;
        self.request(
            base_url,
            Method::DELETE,
            &format!("/v1/tasks/{task_id}/threads"),
            auth_token,
            Some(&body),
        )
        .await?;
        Ok(())
    }

    pub async fn store_prompt(
        &self,
        base_url: &str,
        auth_token: Option<&str>,
        task_id: &str,
        prompt: &V1Prompt,
    ) -> TrackerResult<String> {
        let body = serde_json::to_value(prompt)?;
        let payload = self
            .request(
                base_url,
                Method::POST,
                &format!("/v1/tasks/{task_id}/prompts"),
                auth_token,
                Some(&body),
            )
            .await?;
        let value: Value = payload.unwrap_or_default();
        Ok(value
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    pub async fn approve_prompt(
        &self,
        base_url: &str,
        auth_token: Option<&str>,
        task_id: &str,
        prompt_id: &str,
    ) -> TrackerResult<()> {
        self.request(
            base_url,
            Method::POST,
            &format!("/v1/tasks/{task_id}/prompts/{prompt_id}/approve"),
            auth_token,
            None,
        )
        .await?;
        Ok(())
    }

    pub async fn fail_prompt(
        &self,
        base_url: &str,
        auth_token: Option<&str>,
        task_id: &str,
        prompt_id: &str,
    ) -> TrackerResult<()> {
        self.request(
            base_url,
            Method::POST,
            &format!("/v1/tasks/{task_id}/prompts/{prompt_id}/fail"),
            auth_token,
            None,
        )
        .await?;
        Ok(())
    }

    pub async fn record_action(
        &self,
        base_url: &str,
        auth_token: Option<&str>,
        task_id: &str,
        event: &V1ActionEvent,
    ) -> TrackerResult<()> {
        let body = serde_json::to_value(event)?;
        self.request(
            base_url,
            Method::POST,
            &format!("/v1/tasks/{task_id}/actions"),
            auth_token,
            Some(&body),
        )
        .await?;
        Ok(())
    }

    pub async fn get_actions(
        &self,
        base_url: &str,
        auth_token: Option<&str>,
        task_id: &str,
    ) -> TrackerResult<V1ActionEvents> {
        let payload = self
            .request(
                base_url,
                Method::GET,
                &format!("/v1/tasks/{task_id}/actions"),
                auth_token,
                None,
            )
            .await?;
        Self::parse(payload)
    }

    pub async fn delete_actions(
        &self,
        base_url: &str,
        auth_token: Option<&str>,
        task_id: &str,
    ) -> TrackerResult<()> {
        self.request(
            base_url,
            Method::DELETE,
            &format!("/v1/tasks/{task_id}/actions"),
            auth_token,
            None,
        )
        .await?;
        Ok(())
    }

    pub async fn hide_action(
        &self,
        base_url: &str,
        auth_token: Option<&str>,
        task_id: &str,
        action_id: &str,
        hidden: bool,
    ) -> TrackerResult<()> {
        let verb = if hidden { "hide" } else { "unhide" };
        self.request(
            base_url,
            Method::PUT,
            &format!("/v1/tasks/{task_id}/actions/{action_id}/{verb}"),
            auth_token,
            None,
        )
        .await?;
        Ok(())
    }

    pub async fn review_action(
        &self,
        base_url: &str,
        auth_token: Option<&str>,
        task_id: &str,
        action_id: &str,
        approve: bool,
        review: &V1CreateReview,
    ) -> TrackerResult<()> {
        let verb = if approve { "approve" } else { "fail" };
        let body = serde_json::to_value(review)?;
        self.request(
            base_url,
            Method::POST,
            &format!("/v1/tasks/{task_id}/actions/{action_id}/{verb}"),
            auth_token,
            Some(&body),
        )
        .await?;
        Ok(())
    }

    pub async fn approve_prior(
        &self,
        base_url: &str,
        auth_token: Option<&str>,
        task_id: &str,
        action_id: &str,
        review: &V1ReviewMany,
    ) -> TrackerResult<()> {
        let body = serde_json::to_value(review)?;
        self.request(
            base_url,
            Method::POST,
            &format!("/v1/tasks/{task_id}/actions/{action_id}/approve_prior"),
            auth_token,
            Some(&body),
        )
        .await?;
        Ok(())
    }

    pub async fn review_actions_bulk(
        &self,
        base_url: &str,
        auth_token: Option<&str>,
        task_id: &str,
        approve: bool,
        review: &V1ReviewMany,
    ) -> TrackerResult<()> {
        let verb = if approve { "approve_actions" } else { "fail_actions" };
        let body = serde_json::to_value(review)?;
        self.request(
            base_url,
            Method::POST,
            &format!("/v1/tasks/{task_id}/{verb}"),
            auth_token,
            Some(&body),
        )
        .await?;
        Ok(())
    }
}

fn urlencode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
