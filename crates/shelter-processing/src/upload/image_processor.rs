//! Image upload processor: every image goes through the media codec.

use async_trait::async_trait;
use shelter_core::AppError;

use crate::image::normalize_image;
use crate::upload::traits::{ProcessedUpload, UploadProcessor};

/// Dimensions of the normalized image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadImageMetadata {
    pub width: u32,
    pub height: u32,
}

/// Image upload processor.
#[derive(Clone, Debug, Default)]
pub struct ImageUploadProcessor;

impl ImageUploadProcessor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl UploadProcessor for ImageUploadProcessor {
    type Metadata = UploadImageMetadata;

    async fn process(
        &self,
        data: Vec<u8>,
        content_type: String,
    ) -> Result<ProcessedUpload<UploadImageMetadata>, AppError> {
        let input_len = data.len();
        let normalized =
            tokio::task::spawn_blocking(move || normalize_image(&data, &content_type))
                .await
                .map_err(|e| AppError::Internal(format!("Image codec task failed: {}", e)))??;

        tracing::debug!(
            input_bytes = input_len,
            output_bytes = normalized.size_bytes,
            width = normalized.width,
            height = normalized.height,
            "Image normalized"
        );

        Ok(ProcessedUpload {
            data: normalized.data,
            content_type: normalized.content_type.to_string(),
            metadata: UploadImageMetadata {
                width: normalized.width,
                height: normalized.height,
            },
        })
    }
}
