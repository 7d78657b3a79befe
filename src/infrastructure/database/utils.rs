//! Small row-mapping helpers shared by the store implementations.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::errors::{TrackerError, TrackerResult};

/// Serialize a value to its JSON column representation.
pub fn to_json<T: Serialize>(value: &T) -> TrackerResult<String> {
    serde_json::to_string(value).map_err(TrackerError::from)
}

/// Serialize an optional value; `None` maps to a NULL column.
pub fn to_json_opt<T: Serialize>(value: Option<&T>) -> TrackerResult<Option<String>> {
    value.map(|v| to_json(v)).transpose()
}

/// Deserialize a JSON column.
pub fn from_json<T: DeserializeOwned>(raw: &str) -> TrackerResult<T> {
    serde_json::from_str(raw).map_err(TrackerError::from)
}

/// Deserialize an optional JSON column; NULL and empty map to `None`.
pub fn from_json_opt<T: DeserializeOwned>(raw: Option<String>) -> TrackerResult<Option<T>> {
    match raw {
        None => Ok(None),
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => from_json(&s).map(Some),
    }
}

/// Deserialize a JSON column that defaults when NULL.
pub fn from_json_or_default<T: DeserializeOwned + Default>(
    raw: Option<String>,
) -> TrackerResult<T> {
    match raw {
        None => Ok(T::default()),
        Some(s) if s.is_empty() => Ok(T::default()),
        Some(s) => from_json(&s),
    }
}
