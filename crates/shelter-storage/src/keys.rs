//! Identifier, key and URL conventions shared by the backends.
//!
//! Object-storage identifiers are `{uuid}.{ext}`; the blob key prefixes them
//! with `images/` or `documents/`. Database identifiers are bare UUIDs that
//! appear as the last segment of an API route.

use shelter_core::constants::{
    DOCUMENT_BLOB_PREFIX, DOCUMENT_ROUTE_PREFIX, IMAGE_BLOB_PREFIX, IMAGE_ROUTE_PREFIX,
};
use uuid::Uuid;

use crate::traits::{StorageError, StorageResult};

const MAX_EXTENSION_LEN: usize = 10;

/// Lowercased MIME essence without parameters (`image/JPEG; q=1` → `image/jpeg`).
pub fn mime_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Extension for an image blob. Unknown types fall back to `jpg`, the
/// canonical encoding.
pub fn image_extension(content_type: &str) -> &'static str {
    match mime_essence(content_type).as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "jpg",
    }
}

/// Extension for a document blob: the filename's own extension when it has
/// a usable one, otherwise one derived from the MIME type, otherwise `bin`.
pub fn document_extension(filename: Option<&str>, content_type: &str) -> String {
    if let Some(ext) = filename.and_then(filename_extension) {
        return ext;
    }
    match mime_essence(content_type).as_str() {
        "application/pdf" => "pdf",
        "application/msword" => "doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "text/plain" => "txt",
        _ => "bin",
    }
    .to_string()
}

fn filename_extension(filename: &str) -> Option<String> {
    let name = filename.rsplit(['/', '\\']).next()?;
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty()
        || ext.is_empty()
        || ext.len() > MAX_EXTENSION_LEN
        || !ext.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// MIME type implied by the extension of an identifier, used when a stored
/// object carries no content type of its own.
pub fn mime_for_identifier(identifier: &str) -> &'static str {
    let ext = identifier
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Fresh object-storage identifier.
pub fn new_identifier(extension: &str) -> String {
    format!("{}.{}", Uuid::new_v4(), extension)
}

/// Reject identifiers that could escape their prefix.
pub fn validate_identifier(identifier: &str) -> StorageResult<()> {
    if identifier.is_empty()
        || identifier.contains('/')
        || identifier.contains('\\')
        || identifier.contains("..")
        || identifier.chars().any(|c| c.is_control())
    {
        return Err(StorageError::Validation(format!(
            "Invalid storage identifier: {:?}",
            identifier
        )));
    }
    Ok(())
}

pub fn image_blob_key(identifier: &str) -> String {
    format!("{}/{}", IMAGE_BLOB_PREFIX, identifier)
}

pub fn document_blob_key(identifier: &str) -> String {
    format!("{}/{}", DOCUMENT_BLOB_PREFIX, identifier)
}

pub fn image_route(identifier: &str) -> String {
    format!("{}/{}", IMAGE_ROUTE_PREFIX, identifier)
}

pub fn document_route(identifier: &str) -> String {
    format!("{}/{}", DOCUMENT_ROUTE_PREFIX, identifier)
}

/// Quote a filename for a `Content-Disposition` header.
pub fn inline_disposition(filename: Option<&str>, fallback: &str) -> String {
    let name: String = filename
        .and_then(|f| f.rsplit(['/', '\\']).next())
        .filter(|f| !f.trim().is_empty())
        .unwrap_or(fallback)
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("inline; filename=\"{}\"", name)
}
