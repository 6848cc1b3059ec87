//! Shelter Storage Library
//!
//! The media storage contract ([`MediaStorage`]) and its two backends: payloads
//! kept inline in Postgres rows, and payloads kept as blobs in an Azure
//! Storage container. A backend is chosen once at startup by [`create_storage`]
//! and handed to its callers as `Arc<dyn MediaStorage>`.
//!
//! # Identifiers and URLs
//!
//! - **Database**: the identifier is a bare UUID; URLs are
//!   `/api/images/{id}` and `/api/documents/{id}`.
//! - **Azure**: the identifier is `{uuid}.{ext}`; blobs live at
//!   `images/{identifier}` and `documents/{identifier}` inside the container.
//!
//! Key and URL derivation is centralized in the `keys` module.

pub mod context;
#[cfg(feature = "storage-azure")]
pub mod azure;
#[cfg(feature = "storage-database")]
pub mod database;
pub mod factory;
pub mod keys;
pub mod traits;

// Re-export commonly used types
pub use context::OperationContext;
#[cfg(feature = "storage-azure")]
pub use azure::{AzureBlobConfig, AzureBlobStorage, AzureCredentials};
#[cfg(feature = "storage-database")]
pub use database::DatabaseStorage;
pub use factory::create_storage;
#[cfg(feature = "storage-azure")]
pub use factory::validate_azure_settings;
pub use shelter_core::models::UploadedObject;
pub use shelter_core::StorageProvider;
pub use traits::{FetchedObject, MediaStorage, StorageError, StorageResult};
