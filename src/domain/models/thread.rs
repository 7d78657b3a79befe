//! Conversation threads and role messages.
//!
//! Threads are a collaborator entity: the tracker references them by id
//! from tasks and posts messages into them, but they live in their own
//! store. Every task owns a default thread named `feed`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{now_ts, short_id};

/// One message inside a role thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleMessage {
    pub id: String,
    pub thread_id: String,
    pub role: String,
    pub text: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub private: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, Value>>,
    pub created: f64,
}

impl RoleMessage {
    pub fn new(thread_id: impl Into<String>, role: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: short_id(),
            thread_id: thread_id.into(),
            role: role.into(),
            text: text.into(),
            images: Vec::new(),
            private: false,
            metadata: None,
            created: now_ts(),
        }
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }

    pub fn with_private(mut self, private: bool) -> Self {
        self.private = private;
        self
    }

    pub fn with_metadata(mut self, metadata: Option<BTreeMap<String, Value>>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// An ordered conversation thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleThread {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub public: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, Value>>,
    pub created: f64,
}

impl RoleThread {
    pub fn new(owner_id: Option<String>, name: Option<String>, public: bool) -> Self {
        Self {
            id: short_id(),
            owner_id,
            name,
            public,
            metadata: None,
            created: now_ts(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_metadata(mut self, metadata: Option<BTreeMap<String, Value>>) -> Self {
        self.metadata = metadata;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_defaults() {
        let thread = RoleThread::new(Some("owner@example.com".into()), Some("feed".into()), false);
        assert_eq!(thread.name.as_deref(), Some("feed"));
        assert!(!thread.public);
        assert!(thread.created > 0.0);
    }

    #[test]
    fn test_message_builder() {
        let msg = RoleMessage::new("t1", "assistant", "hello")
            .with_images(vec!["data:image/png;base64,AAAA".into()])
            .with_private(true);
        assert_eq!(msg.thread_id, "t1");
        assert_eq!(msg.images.len(), 1);
        assert!(msg.private);
    }
}
