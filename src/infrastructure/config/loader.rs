//! Configuration loader with hierarchical merging.

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::Config;

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Database name cannot be empty")]
    EmptyDatabaseName,

    #[error("Configuration extraction failed: {0}")]
    ExtractionFailed(String),
}

/// Loads configuration with hierarchical merging.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults
    /// 2. `.trackway/config.yaml` (project config)
    /// 3. Environment variables (`TRACKWAY_*` prefix)
    /// 4. The spec-named environment variables (`TASKS_DB_NAME`,
    ///    `TASK_SERVER_PORT`, `TASK_SERVER_NO_AUTH`, `HUB_API_KEY`,
    ///    `HUB_AUTH_URL`, `REDIS_CACHE_STORAGE`)
    pub fn load() -> Result<Config, ConfigError> {
        let mut config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".trackway/config.yaml"))
            .merge(Env::prefixed("TRACKWAY_").split("__"))
            .extract()
            .map_err(|e| ConfigError::ExtractionFailed(e.to_string()))?;

        Self::apply_env_overrides(&mut config);
        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, skipping env overrides.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config, ConfigError> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .map_err(|e| ConfigError::ExtractionFailed(e.to_string()))?;
        Self::validate(&config)?;
        Ok(config)
    }

    fn apply_env_overrides(config: &mut Config) {
        if let Ok(name) = std::env::var("TASKS_DB_NAME") {
            if !name.is_empty() {
                config.database.name = name;
            }
        }
        if let Ok(port) = std::env::var("TASK_SERVER_PORT") {
            if let Ok(port) = port.parse() {
                config.server.port = port;
            }
        }
        if let Ok(no_auth) = std::env::var("TASK_SERVER_NO_AUTH") {
            config.server.no_auth = no_auth == "true" || no_auth == "1";
        }
        if let Ok(key) = std::env::var("HUB_API_KEY") {
            if !key.is_empty() {
                config.remote.api_key = Some(key);
            }
        }
        if let Ok(url) = std::env::var("HUB_AUTH_URL") {
            if !url.is_empty() {
                config.auth.hub_url = Some(url);
            }
        }
        if let Ok(url) = std::env::var("REDIS_CACHE_STORAGE") {
            if !url.is_empty() {
                config.events.stream_url = Some(url);
            }
        }
    }

    /// Validate configuration after loading.
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.name.is_empty() {
            return Err(ConfigError::EmptyDatabaseName);
        }
        match config.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => return Err(ConfigError::InvalidLogLevel(other.to_string())),
        }
        match config.logging.format.as_str() {
            "json" | "pretty" => {}
            other => return Err(ConfigError::InvalidLogFormat(other.to_string())),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = Config::default();
        assert!(ConfigLoader::validate(&config).is_ok());
        assert_eq!(config.server.port, 9070);
        assert_eq!(config.database.name, "tasks.db");
    }

    #[test]
    fn test_bad_log_level_rejected() {
        let mut config = Config::default();
        config.logging.level = "loud".into();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogLevel(_))
        ));
    }

    #[test]
    fn test_database_url_shape() {
        let config = Config::default();
        assert_eq!(config.database.url(), "sqlite:.trackway/data/tasks.db");
    }
}
