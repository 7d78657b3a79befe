//! Device descriptors attached to tasks.
//!
//! A device is an opaque description of the surface an agent acts on
//! (a desktop, a browser, a phone). The tracker never interprets the
//! configuration; it only persists it, encrypted at rest.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An opaque device descriptor. The `config` payload may carry secrets,
/// which is why the tasks table stores the encrypted form only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default)]
    pub config: BTreeMap<String, Value>,
}

/// A device type descriptor: the kind of surface a task expects,
/// without any concrete connection details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceType {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
