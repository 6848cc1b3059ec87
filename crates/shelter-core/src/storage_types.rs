use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::config::ConfigError;

/// Storage provider selector
///
/// Names the backend that holds media bytes. Parsed once from configuration;
/// only the storage factory matches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    /// Payloads live in `BYTEA` columns of the owning rows.
    Database,
    /// Payloads live in an Azure Blob Storage container.
    Azure,
}

impl FromStr for StorageProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "database" | "db" | "postgres" => Ok(StorageProvider::Database),
            "azure" | "azure_blob" | "azureblob" => Ok(StorageProvider::Azure),
            other => Err(ConfigError(format!(
                "Unknown storage provider '{}' (expected 'database' or 'azure')",
                other
            ))),
        }
    }
}

impl Display for StorageProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            StorageProvider::Database => write!(f, "database"),
            StorageProvider::Azure => write!(f, "azure"),
        }
    }
}
