//! Tracker registry rows.
//!
//! Peer tracker services register here by name; the runtime that hosts them
//! is out of scope, so these are plain records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{now_ts, short_id};

/// One registered tracker service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tracker {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_config: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    pub created: f64,
    pub updated: f64,
}

impl Tracker {
    pub fn new(name: impl Into<String>, port: u16) -> Self {
        let now = now_ts();
        Self {
            id: short_id(),
            name: name.into(),
            runtime_name: None,
            runtime_config: None,
            status: None,
            port,
            owner_id: None,
            labels: BTreeMap::new(),
            created: now,
            updated: now,
        }
    }
}
