//! Application-wide constants.

/// Longest edge, in pixels, an uploaded image may keep. Larger images are
/// downscaled so that their longer edge equals this value.
pub const MAX_IMAGE_EDGE: u32 = 1200;

/// JPEG quality used for the canonical re-encode of every uploaded image.
pub const JPEG_QUALITY: u8 = 85;

/// MIME type of the canonical image encoding.
pub const CANONICAL_IMAGE_CONTENT_TYPE: &str = "image/jpeg";

/// Path prefix served by the API for images stored in the database.
pub const IMAGE_ROUTE_PREFIX: &str = "/api/images";

/// Path prefix served by the API for protocol documents stored in the database.
pub const DOCUMENT_ROUTE_PREFIX: &str = "/api/documents";

/// Blob name prefix for images in object storage.
pub const IMAGE_BLOB_PREFIX: &str = "images";

/// Blob name prefix for protocol documents in object storage.
pub const DOCUMENT_BLOB_PREFIX: &str = "documents";
