//! Model prompts stored for offline review and dataset curation.
//!
//! A prompt is one request/response pair exchanged with a language model
//! while executing a task. Prompts live in their own store; the task holds
//! an ordered sequence of prompt ids.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{now_ts, short_id};

/// One stored prompt exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default = "Prompt::default_namespace")]
    pub namespace: String,
    /// The conversation thread that formed the request context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    /// The model's response message, stored verbatim.
    pub response: Value,
    /// JSON schema the response was expected to conform to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    #[serde(default)]
    pub approved: bool,
    #[serde(default)]
    pub flagged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub created: f64,
}

impl Prompt {
    fn default_namespace() -> String {
        "default".to_string()
    }

    pub fn new(task_id: impl Into<String>, response: Value) -> Self {
        Self {
            id: short_id(),
            task_id: Some(task_id.into()),
            namespace: Self::default_namespace(),
            thread_id: None,
            response,
            response_schema: None,
            metadata: BTreeMap::new(),
            approved: false,
            flagged: false,
            owner_id: None,
            agent_id: None,
            model: None,
            created: now_ts(),
        }
    }

    pub fn with_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }
}
