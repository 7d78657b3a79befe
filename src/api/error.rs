//! HTTP error mapping.
//!
//! Validation failures render as 422 with a field-error list; authz
//! failures as 401/403; missing resources as 404. Store and serialisation
//! failures never leak details beyond their message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use crate::domain::errors::TrackerError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: Value,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "detail": detail.into() }),
        }
    }

    /// The 422 body shape: a list of `{field, message, type}` entries.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            body: json!({
                "detail": [{
                    "field": field.into(),
                    "message": message.into(),
                    "type": "validation_error",
                }]
            }),
        }
    }

    /// Malformed request body (JSON syntax or shape mismatch).
    pub fn bad_body(message: impl Into<String>) -> Self {
        Self::validation("body", message)
    }
}

impl From<TrackerError> for ApiError {
    fn from(err: TrackerError) -> Self {
        match err {
            TrackerError::Unauthorized(msg) => Self::new(StatusCode::UNAUTHORIZED, msg),
            TrackerError::Forbidden(msg) => Self::new(StatusCode::FORBIDDEN, msg),
            TrackerError::NotFound(what) => {
                Self::new(StatusCode::NOT_FOUND, format!("{what} not found"))
            }
            TrackerError::Conflict(msg) => Self::new(StatusCode::CONFLICT, msg),
            TrackerError::Validation { field, message } => Self::validation(field, message),
            TrackerError::Precondition(msg) => Self::new(StatusCode::BAD_REQUEST, msg),
            TrackerError::DependencyMissing(what) => {
                Self::new(StatusCode::NOT_FOUND, format!("{what} not found"))
            }
            TrackerError::RemoteFailure { status, message } => {
                let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
                Self::new(status, message)
            }
            TrackerError::Timeout(msg) => Self::new(StatusCode::GATEWAY_TIMEOUT, msg),
            TrackerError::Transient(msg) => Self::new(StatusCode::SERVICE_UNAVAILABLE, msg),
            TrackerError::Database(msg)
            | TrackerError::Serialization(msg)
            | TrackerError::Encryption(msg) => Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
