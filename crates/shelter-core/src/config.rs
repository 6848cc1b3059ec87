//! Configuration module
//!
//! Process configuration is read once from the environment (and an optional
//! `.env` file). The storage section is a tagged value: `provider` picks the
//! backend and the remaining fields only matter for that backend.

use std::env;
use std::fmt;

use serde::Deserialize;

use crate::storage_types::StorageProvider;

const MAX_CONNECTIONS: u32 = 10;
const CONNECTION_TIMEOUT_SECS: u64 = 30;

/// A configuration value is missing or invalid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ConfigError(pub String);

/// Azure Blob Storage settings as provided by the operator.
///
/// Fields stay optional here so that the storage factory can report exactly
/// which one is missing before any client is built.
#[derive(Clone, Default, Deserialize, PartialEq, Eq)]
pub struct AzureBlobSettings {
    pub account: Option<String>,
    pub container: Option<String>,
    pub access_key: Option<String>,
    #[serde(default)]
    pub use_managed_identity: bool,
    /// Blob service endpoint override, e.g. `http://127.0.0.1:10000/devstoreaccount1`
    /// for the Azurite emulator.
    pub endpoint: Option<String>,
}

impl fmt::Debug for AzureBlobSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureBlobSettings")
            .field("account", &self.account)
            .field("container", &self.container)
            .field("access_key", &self.access_key.as_ref().map(|_| "<redacted>"))
            .field("use_managed_identity", &self.use_managed_identity)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Storage selector: exactly one backend is built from this at startup.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum StorageSettings {
    Database,
    Azure(AzureBlobSettings),
}

impl StorageSettings {
    pub fn provider(&self) -> StorageProvider {
        match self {
            StorageSettings::Database => StorageProvider::Database,
            StorageSettings::Azure(_) => StorageProvider::Azure,
        }
    }

    /// Read the storage section from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let provider = match env::var("STORAGE_PROVIDER") {
            Ok(value) => value.parse::<StorageProvider>()?,
            Err(_) => StorageProvider::Database,
        };

        Ok(match provider {
            StorageProvider::Database => StorageSettings::Database,
            StorageProvider::Azure => StorageSettings::Azure(AzureBlobSettings {
                account: non_empty_var("AZURE_STORAGE_ACCOUNT"),
                container: non_empty_var("AZURE_STORAGE_CONTAINER"),
                access_key: non_empty_var("AZURE_STORAGE_ACCESS_KEY"),
                use_managed_identity: parse_bool_var("AZURE_STORAGE_USE_MANAGED_IDENTITY")?
                    .unwrap_or(false),
                endpoint: non_empty_var("AZURE_STORAGE_ENDPOINT"),
            }),
        })
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub environment: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub storage: StorageSettings,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError("DATABASE_URL must be set".to_string()))?;

        let db_max_connections = env::var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
            .parse()
            .map_err(|_| ConfigError("DB_MAX_CONNECTIONS must be a valid number".to_string()))?;

        let db_timeout_seconds = env::var("DB_TIMEOUT_SECONDS")
            .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
            .parse()
            .map_err(|_| ConfigError("DB_TIMEOUT_SECONDS must be a valid number".to_string()))?;

        Ok(Config {
            environment,
            database_url,
            db_max_connections,
            db_timeout_seconds,
            storage: StorageSettings::from_env()?,
        })
    }

    pub fn is_production(&self) -> bool {
        matches!(self.environment.to_lowercase().as_str(), "production" | "prod")
    }

    pub fn storage_provider(&self) -> StorageProvider {
        self.storage.provider()
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_bool_var(name: &str) -> Result<Option<bool>, ConfigError> {
    match non_empty_var(name) {
        None => Ok(None),
        Some(v) => match v.to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(Some(true)),
            "false" | "0" | "no" => Ok(Some(false)),
            _ => Err(ConfigError(format!("{} must be true or false, got '{}'", name, v))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_tagged_database() {
        let settings: StorageSettings =
            serde_json::from_str(r#"{"provider":"database"}"#).unwrap();
        assert_eq!(settings, StorageSettings::Database);
        assert_eq!(settings.provider(), StorageProvider::Database);
    }

    #[test]
    fn test_deserialize_tagged_azure() {
        let settings: StorageSettings = serde_json::from_str(
            r#"{"provider":"azure","account":"shelterdev","container":"media","use_managed_identity":true}"#,
        )
        .unwrap();
        match settings {
            StorageSettings::Azure(azure) => {
                assert_eq!(azure.account.as_deref(), Some("shelterdev"));
                assert_eq!(azure.container.as_deref(), Some("media"));
                assert!(azure.use_managed_identity);
                assert!(azure.access_key.is_none());
            }
            other => panic!("expected azure settings, got {:?}", other),
        }
    }

    #[test]
    fn test_deserialize_unknown_provider_fails() {
        let result = serde_json::from_str::<StorageSettings>(r#"{"provider":"gcs"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_redacts_access_key() {
        let settings = AzureBlobSettings {
            account: Some("acct".to_string()),
            access_key: Some("c2VjcmV0".to_string()),
            ..Default::default()
        };
        let debug = format!("{:?}", settings);
        assert!(!debug.contains("c2VjcmV0"));
        assert!(debug.contains("<redacted>"));
    }
}
