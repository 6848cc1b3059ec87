//! Media storage contract
//!
//! This module defines the `MediaStorage` trait that both backends implement.
//! Callers only ever hold an `Arc<dyn MediaStorage>`; nothing backend-specific
//! (SQL errors, HTTP status codes, blob paths) crosses this boundary.

use std::collections::HashMap;

use async_trait::async_trait;
use shelter_core::models::UploadedObject;
use shelter_core::{AppError, ConfigError, StorageProvider};
use thiserror::Error;

use crate::context::OperationContext;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    /// Never uploaded, deleted, or stored without a payload. Callers cannot
    /// and need not tell these apart.
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Operation not supported by this backend: {0}")]
    Unsupported(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Storage operation cancelled")]
    Cancelled,

    #[error("Storage operation timed out")]
    Timeout,
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

impl From<ConfigError> for StorageError {
    fn from(err: ConfigError) -> Self {
        StorageError::Configuration(err.0)
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Configuration(msg) => AppError::Configuration(msg),
            StorageError::Validation(msg) => AppError::Validation(msg),
            StorageError::NotFound(msg) => AppError::NotFound(msg),
            StorageError::Unsupported(msg) => AppError::Internal(msg),
            other @ (StorageError::Backend(_) | StorageError::Cancelled | StorageError::Timeout) => {
                AppError::Storage(other.to_string())
            }
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A downloaded payload and the content type it was stored with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedObject {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// Media storage trait
///
/// Guarantees every implementation provides:
///
/// - `get_*` and `delete_*` on an identifier that was never issued, or whose
///   object was deleted, return [`StorageError::NotFound`].
/// - `upload_*` is all-or-nothing: a failed upload is never visible to `get_*`.
/// - Identifiers are globally unique and are never reused.
/// - `image_url`/`document_url` are pure and total.
///
/// **Inline backends:** when [`stores_inline`](MediaStorage::stores_inline)
/// returns `true`, the payload lives in the row that owns it. The caller
/// writes the bytes as part of its own insert and must not call `upload_*`,
/// which fails with [`StorageError::Unsupported`] on such backends.
#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Store an (already normalized) image.
    async fn upload_image(
        &self,
        ctx: &OperationContext,
        data: Vec<u8>,
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> StorageResult<UploadedObject>;

    /// Store a document. `filename` is the uploader's original filename and
    /// drives the stored extension when it has one.
    async fn upload_document(
        &self,
        ctx: &OperationContext,
        data: Vec<u8>,
        content_type: &str,
        filename: Option<&str>,
    ) -> StorageResult<UploadedObject>;

    async fn get_image(&self, ctx: &OperationContext, identifier: &str)
        -> StorageResult<FetchedObject>;

    async fn get_document(
        &self,
        ctx: &OperationContext,
        identifier: &str,
    ) -> StorageResult<FetchedObject>;

    async fn delete_image(&self, ctx: &OperationContext, identifier: &str) -> StorageResult<()>;

    async fn delete_document(&self, ctx: &OperationContext, identifier: &str)
        -> StorageResult<()>;

    /// Public URL of an image. No I/O.
    fn image_url(&self, identifier: &str) -> String;

    /// Public URL of a document. No I/O.
    fn document_url(&self, identifier: &str) -> String;

    /// Whether payloads are kept in the owning row instead of being uploaded.
    fn stores_inline(&self) -> bool;

    /// Which backend this is
    fn provider(&self) -> StorageProvider;
}
