//! Backend-agnostic descriptors of stored payloads.

use serde::{Deserialize, Serialize};

/// Result of a successful upload: enough to persist and later re-resolve the object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedObject {
    pub url: String,
    pub identifier: String,
}

/// A stored payload as seen by callers: opaque identifier, public URL, type and size.
///
/// Identifiers are never reused, so an identifier either resolves to the
/// same content or to "not found".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub identifier: String,
    pub url: String,
    pub content_type: String,
    pub size_bytes: u64,
}
