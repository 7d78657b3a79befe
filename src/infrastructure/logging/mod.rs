//! Logging initialisation using tracing.

use tracing_subscriber::EnvFilter;

use crate::domain::models::config::LogConfig;

/// Initialise the global tracing subscriber from the log configuration.
/// `RUST_LOG` still takes precedence over the configured level.
pub fn init(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    if config.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}
