//! Domain errors for the Trackway tracker.

use thiserror::Error;

/// Errors raised by the core tracker operations.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation failed for '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Missing dependency: {0}")]
    DependencyMissing(String),

    #[error("Remote tracker returned {status}: {message}")]
    RemoteFailure { status: u16, message: String },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Transient error: {0}")]
    Transient(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Encryption error: {0}")]
    Encryption(String),
}

impl TrackerError {
    /// Shorthand for a validation error on a named field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Timeout(_))
    }
}

pub type TrackerResult<T> = Result<T, TrackerError>;

impl From<sqlx::Error> for TrackerError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                TrackerError::Conflict(db_err.to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                TrackerError::Transient(err.to_string())
            }
            _ => TrackerError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for TrackerError {
    fn from(err: serde_json::Error) -> Self {
        TrackerError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for TrackerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TrackerError::Timeout(err.to_string())
        } else if err.is_connect() {
            TrackerError::Transient(err.to_string())
        } else {
            TrackerError::RemoteFailure {
                status: err.status().map_or(0, |s| s.as_u16()),
                message: err.to_string(),
            }
        }
    }
}
