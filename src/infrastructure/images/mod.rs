//! Inline image converter.
//!
//! Without object storage configured, image references are normalised in
//! place: URLs and data URIs pass through untouched, filesystem paths are
//! read and inlined as data URIs.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::domain::errors::{TrackerError, TrackerResult};
use crate::domain::ports::ImageConverter;

pub struct InlineImageConverter;

impl InlineImageConverter {
    fn mime_for(path: &str) -> &'static str {
        let lower = path.to_lowercase();
        if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
            "image/jpeg"
        } else if lower.ends_with(".gif") {
            "image/gif"
        } else if lower.ends_with(".webp") {
            "image/webp"
        } else {
            "image/png"
        }
    }
}

#[async_trait]
impl ImageConverter for InlineImageConverter {
    async fn convert_images(&self, images: Vec<String>) -> TrackerResult<Vec<String>> {
        let mut converted = Vec::with_capacity(images.len());
        for image in images {
            if image.starts_with("data:") || image.starts_with("http://") || image.starts_with("https://") {
                converted.push(image);
                continue;
            }
            let bytes = tokio::fs::read(&image).await.map_err(|e| {
                TrackerError::validation("images", format!("cannot read image '{image}': {e}"))
            })?;
            let mime = Self::mime_for(&image);
            converted.push(format!("data:{mime};base64,{}", BASE64.encode(bytes)));
        }
        Ok(converted)
    }
}
