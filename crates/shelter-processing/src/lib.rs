//! Shelter Processing Library
//!
//! The media codec that normalizes every uploaded image to the canonical
//! encoding, and the upload processors that sit between an upload request and
//! the storage backend.

pub mod error;
#[cfg(feature = "image")]
pub mod image;
pub mod upload;

pub use error::CodecError;
#[cfg(feature = "image")]
pub use self::image::{normalize_image, target_dimensions, NormalizedImage};
pub use upload::{ProcessedUpload, UploadProcessor};
