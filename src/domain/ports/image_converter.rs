//! Image conversion port.
//!
//! Recorded environment states may reference images by URL, data URI, or a
//! local filesystem path. Before persistence every reference is normalised
//! to a URL or data URI by a pluggable converter, keeping the core logic
//! deterministic in tests.

use async_trait::async_trait;

use crate::domain::errors::TrackerResult;

/// Normalises image references prior to persistence.
#[async_trait]
pub trait ImageConverter: Send + Sync {
    /// Convert each reference to a stable URL or data URI, preserving order.
    async fn convert_images(&self, images: Vec<String>) -> TrackerResult<Vec<String>>;
}

/// Converter that leaves every reference as-is. Used in tests and when no
/// object storage is configured.
pub struct NullImageConverter;

#[async_trait]
impl ImageConverter for NullImageConverter {
    async fn convert_images(&self, images: Vec<String>) -> TrackerResult<Vec<String>> {
        Ok(images)
    }
}
