//! Tracker configuration model.

use serde::{Deserialize, Serialize};

/// Top-level configuration, merged from defaults, the config file, and
/// environment variables by the loader.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub logging: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port the REST surface binds to.
    pub port: u16,
    /// Skip token verification and act as a fixed local principal.
    pub no_auth: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 9070,
            no_auth: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Directory the database file lives in.
    pub dir: String,
    /// Database file name.
    pub name: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dir: ".trackway/data".to_string(),
            name: "tasks.db".to_string(),
        }
    }
}

impl DatabaseConfig {
    pub fn url(&self) -> String {
        format!("sqlite:{}/{}", self.dir.trim_end_matches('/'), self.name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Base URL of the auth hub used to verify bearer tokens.
    pub hub_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Fallback bearer token for calls to peer trackers.
    pub api_key: Option<String>,
    /// Per-call deadline for peer tracker requests, in seconds.
    #[serde(default = "default_remote_timeout")]
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            timeout_secs: default_remote_timeout(),
        }
    }
}

fn default_remote_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Stream endpoint; presence enables the action-recorded publisher.
    pub stream_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// trace, debug, info, warn, error
    pub level: String,
    /// json or pretty
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
