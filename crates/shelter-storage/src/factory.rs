#[cfg(feature = "storage-azure")]
use crate::{AzureBlobConfig, AzureBlobStorage, AzureCredentials};
#[cfg(feature = "storage-database")]
use crate::DatabaseStorage;
use crate::{MediaStorage, OperationContext, StorageError, StorageResult};
use shelter_core::{AzureBlobSettings, StorageSettings};
use sqlx::PgPool;
use std::sync::Arc;
#[cfg(feature = "storage-azure")]
use std::time::Duration;

/// Upper bound on backend bootstrap (container creation) at startup.
#[cfg(feature = "storage-azure")]
pub const BOOTSTRAP_TIMEOUT: Duration = Duration::from_secs(30);

/// Create the storage backend selected by `settings`.
///
/// Called once at process start. The database backend needs `pool`; the Azure
/// backend ignores it. Container bootstrap runs under `ctx`, bounded by
/// [`BOOTSTRAP_TIMEOUT`].
pub async fn create_storage(
    settings: &StorageSettings,
    pool: Option<PgPool>,
    ctx: &OperationContext,
) -> StorageResult<Arc<dyn MediaStorage>> {
    match settings {
        #[cfg(feature = "storage-database")]
        StorageSettings::Database => {
            let pool = pool.ok_or_else(|| {
                StorageError::Configuration(
                    "database storage requires a database connection pool".to_string(),
                )
            })?;
            tracing::info!("Using database storage backend");
            Ok(Arc::new(DatabaseStorage::new(pool)))
        }

        #[cfg(not(feature = "storage-database"))]
        StorageSettings::Database => {
            drop(pool);
            Err(StorageError::Configuration(
                "Database storage backend not available (storage-database feature not enabled)"
                    .to_string(),
            ))
        }

        StorageSettings::Azure(azure) => create_azure_storage(azure, ctx).await,
    }
}

#[cfg(feature = "storage-azure")]
async fn create_azure_storage(
    settings: &AzureBlobSettings,
    ctx: &OperationContext,
) -> StorageResult<Arc<dyn MediaStorage>> {
    let config = validate_azure_settings(settings)?;
    let bootstrap_ctx = ctx.with_deadline_in(BOOTSTRAP_TIMEOUT);
    let storage = AzureBlobStorage::new(config, &bootstrap_ctx).await?;
    Ok(Arc::new(storage))
}

#[cfg(not(feature = "storage-azure"))]
async fn create_azure_storage(
    _settings: &AzureBlobSettings,
    _ctx: &OperationContext,
) -> StorageResult<Arc<dyn MediaStorage>> {
    Err(StorageError::Configuration(
        "Azure storage backend not available (storage-azure feature not enabled)".to_string(),
    ))
}

/// Check Azure settings without touching the network.
///
/// Account and container are always required. Credentials are either an
/// access key or an explicit opt-in to managed identity; an access key wins
/// when both are given.
#[cfg(feature = "storage-azure")]
pub fn validate_azure_settings(settings: &AzureBlobSettings) -> StorageResult<AzureBlobConfig> {
    let account = required(&settings.account, "AZURE_STORAGE_ACCOUNT")?;
    let container = required(&settings.container, "AZURE_STORAGE_CONTAINER")?;
    validate_container_name(&container)?;

    let credentials = match non_blank(&settings.access_key) {
        Some(key) => AzureCredentials::AccessKey(key),
        None if settings.use_managed_identity => AzureCredentials::ManagedIdentity,
        None => {
            return Err(StorageError::Configuration(
                "Azure storage needs AZURE_STORAGE_ACCESS_KEY or AZURE_STORAGE_USE_MANAGED_IDENTITY=true"
                    .to_string(),
            ))
        }
    };

    let endpoint = non_blank(&settings.endpoint);
    if let Some(ref endpoint) = endpoint {
        if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
            return Err(StorageError::Configuration(format!(
                "AZURE_STORAGE_ENDPOINT must be an http(s) URL, got '{}'",
                endpoint
            )));
        }
    }

    Ok(AzureBlobConfig {
        account,
        container,
        credentials,
        endpoint,
    })
}

#[cfg(feature = "storage-azure")]
fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

#[cfg(feature = "storage-azure")]
fn required(value: &Option<String>, name: &str) -> StorageResult<String> {
    non_blank(value).ok_or_else(|| StorageError::Configuration(format!("{} not configured", name)))
}

/// 3-63 characters of lowercase letters, digits and single dashes, starting
/// and ending with a letter or digit.
#[cfg(feature = "storage-azure")]
fn validate_container_name(name: &str) -> StorageResult<()> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    let valid = (3..=63).contains(&name.len())
        && valid_chars
        && !name.starts_with('-')
        && !name.ends_with('-')
        && !name.contains("--");
    if valid {
        Ok(())
    } else {
        Err(StorageError::Configuration(format!(
            "Invalid Azure container name '{}'",
            name
        )))
    }
}
