//! Shelter Core Library
//!
//! Domain models, the application error taxonomy and configuration shared by
//! the storage, processing and database crates.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;

pub use config::{AzureBlobSettings, Config, ConfigError, StorageSettings};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use storage_types::StorageProvider;
