//! Upload processors: the step between a raw upload and the storage backend.

#[cfg(feature = "document")]
mod document_processor;
#[cfg(feature = "image")]
mod image_processor;
mod traits;

#[cfg(feature = "document")]
pub use document_processor::{DocumentUploadProcessor, UploadDocumentMetadata};
#[cfg(feature = "image")]
pub use image_processor::{ImageUploadProcessor, UploadImageMetadata};
pub use traits::{ProcessedUpload, UploadProcessor};
