//! Azure Blob Storage backend
//!
//! Blobs are read and written through `object_store`'s Azure client. The
//! container is created on construction if it does not exist yet (see
//! [`container`]).

pub mod container;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, AttributeValue, Attributes, ObjectStore, ObjectStoreExt, PutOptions, PutPayload,
};
use shelter_core::models::UploadedObject;

use crate::context::OperationContext;
use crate::keys;
use crate::traits::{FetchedObject, MediaStorage, StorageError, StorageResult};
use crate::StorageProvider;
use container::{ContainerAuth, ContainerBootstrap};

/// How the backend authenticates against the storage account.
#[derive(Clone, PartialEq, Eq)]
pub enum AzureCredentials {
    AccessKey(String),
    /// Ambient credentials (Azure managed identity).
    ManagedIdentity,
}

impl fmt::Debug for AzureCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AzureCredentials::AccessKey(_) => f.write_str("AccessKey(<redacted>)"),
            AzureCredentials::ManagedIdentity => f.write_str("ManagedIdentity"),
        }
    }
}

/// Validated Azure settings. Built by the factory from
/// [`shelter_core::AzureBlobSettings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzureBlobConfig {
    pub account: String,
    pub container: String,
    pub credentials: AzureCredentials,
    /// Blob service endpoint including the account, for emulators and
    /// sovereign clouds.
    pub endpoint: Option<String>,
}

impl AzureBlobConfig {
    /// Blob service endpoint for the account, without a trailing slash.
    pub fn account_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}.blob.core.windows.net", self.account),
        }
    }

    /// Public base URL of the container; object URLs are built on top of it.
    pub fn container_url(&self) -> String {
        format!("{}/{}", self.account_url(), self.container)
    }
}

/// Object-storage backend
#[derive(Clone)]
pub struct AzureBlobStorage {
    store: Arc<dyn ObjectStore>,
    container: String,
    base_url: String,
}

impl AzureBlobStorage {
    /// Build the client and make sure the container exists.
    pub async fn new(config: AzureBlobConfig, ctx: &OperationContext) -> StorageResult<Self> {
        let mut builder = MicrosoftAzureBuilder::new()
            .with_account(config.account.clone())
            .with_container_name(config.container.clone());

        if let AzureCredentials::AccessKey(ref key) = config.credentials {
            builder = builder.with_access_key(key.clone());
        }

        if let Some(ref endpoint) = config.endpoint {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.trim_end_matches('/').to_string())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::Configuration(e.to_string()))?;

        let auth = match config.credentials {
            AzureCredentials::AccessKey(ref key) => ContainerAuth::SharedKey(key.clone()),
            AzureCredentials::ManagedIdentity => ContainerAuth::Token(store.credentials().clone()),
        };

        let bootstrap = ContainerBootstrap::new(
            reqwest::Client::new(),
            config.account.clone(),
            config.account_url(),
            config.container.clone(),
            auth,
        );
        bootstrap.ensure_container(ctx).await?;

        tracing::info!(
            account = %config.account,
            container = %config.container,
            managed_identity = matches!(config.credentials, AzureCredentials::ManagedIdentity),
            "Azure blob storage ready"
        );

        Ok(Self::with_store(
            Arc::new(store),
            config.container.clone(),
            config.container_url(),
        ))
    }

    /// Wrap an existing object store. No container bootstrap is performed.
    pub fn with_store(
        store: Arc<dyn ObjectStore>,
        container: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            container: container.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn map_error(&self, operation: &'static str, key: &str, err: ObjectStoreError) -> StorageError {
        match err {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.to_string()),
            other => {
                tracing::error!(
                    error = %other,
                    container = %self.container,
                    key = %key,
                    operation,
                    "Azure blob operation failed"
                );
                StorageError::Backend(format!("{} failed: {}", operation, other))
            }
        }
    }

    async fn put(
        &self,
        ctx: &OperationContext,
        key: &str,
        data: Vec<u8>,
        attributes: Attributes,
    ) -> StorageResult<()> {
        let size = data.len() as u64;
        let location = Path::from(key.to_string());
        let opts = PutOptions {
            attributes,
            ..Default::default()
        };
        let start = std::time::Instant::now();

        ctx.run(async {
            self.store
                .put_opts(&location, PutPayload::from(Bytes::from(data)), opts)
                .await
                .map_err(|e| self.map_error("upload", key, e))
        })
        .await?;

        tracing::info!(
            container = %self.container,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Azure upload successful"
        );
        Ok(())
    }

    async fn fetch(
        &self,
        ctx: &OperationContext,
        key: &str,
        identifier: &str,
    ) -> StorageResult<FetchedObject> {
        let location = Path::from(key.to_string());
        let start = std::time::Instant::now();

        let (data, content_type) = ctx
            .run(async {
                let result = self
                    .store
                    .get(&location)
                    .await
                    .map_err(|e| self.map_error("download", key, e))?;
                let content_type = result
                    .attributes
                    .get(&Attribute::ContentType)
                    .map(|value| {
                        let value: &str = value.as_ref();
                        value.to_string()
                    });
                let bytes = result
                    .bytes()
                    .await
                    .map_err(|e| self.map_error("download", key, e))?;
                Ok::<_, StorageError>((bytes, content_type))
            })
            .await?;

        tracing::debug!(
            container = %self.container,
            key = %key,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Azure download successful"
        );

        Ok(FetchedObject {
            data: data.to_vec(),
            content_type: content_type
                .filter(|ct| !ct.is_empty())
                .unwrap_or_else(|| keys::mime_for_identifier(identifier).to_string()),
        })
    }

    async fn remove(&self, ctx: &OperationContext, key: &str) -> StorageResult<()> {
        let location = Path::from(key.to_string());

        ctx.run(async {
            // Some stores treat deleting a missing object as success.
            self.store
                .head(&location)
                .await
                .map_err(|e| self.map_error("delete", key, e))?;
            self.store
                .delete(&location)
                .await
                .map_err(|e| self.map_error("delete", key, e))
        })
        .await?;

        tracing::info!(container = %self.container, key = %key, "Azure delete successful");
        Ok(())
    }
}

fn metadata_attributes(metadata: &HashMap<String, String>) -> StorageResult<Attributes> {
    let mut attributes = Attributes::new();
    for (name, value) in metadata {
        if !is_valid_metadata_name(name) {
            return Err(StorageError::Validation(format!(
                "Invalid blob metadata name: {:?}",
                name
            )));
        }
        attributes.insert(
            Attribute::Metadata(name.clone().into()),
            AttributeValue::from(value.clone()),
        );
    }
    Ok(attributes)
}

/// Blob metadata names must be valid C# identifiers.
fn is_valid_metadata_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

#[async_trait]
impl MediaStorage for AzureBlobStorage {
    async fn upload_image(
        &self,
        ctx: &OperationContext,
        data: Vec<u8>,
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> StorageResult<UploadedObject> {
        let mut attributes = metadata_attributes(metadata)?;
        attributes.insert(
            Attribute::ContentType,
            AttributeValue::from(keys::mime_essence(content_type)),
        );

        let identifier = keys::new_identifier(keys::image_extension(content_type));
        let key = keys::image_blob_key(&identifier);
        self.put(ctx, &key, data, attributes).await?;

        Ok(UploadedObject {
            url: self.image_url(&identifier),
            identifier,
        })
    }

    async fn upload_document(
        &self,
        ctx: &OperationContext,
        data: Vec<u8>,
        content_type: &str,
        filename: Option<&str>,
    ) -> StorageResult<UploadedObject> {
        let identifier = keys::new_identifier(&keys::document_extension(filename, content_type));
        let key = keys::document_blob_key(&identifier);

        let mut attributes = Attributes::new();
        attributes.insert(
            Attribute::ContentType,
            AttributeValue::from(keys::mime_essence(content_type)),
        );
        attributes.insert(
            Attribute::ContentDisposition,
            AttributeValue::from(keys::inline_disposition(filename, &identifier)),
        );
        self.put(ctx, &key, data, attributes).await?;

        Ok(UploadedObject {
            url: self.document_url(&identifier),
            identifier,
        })
    }

    async fn get_image(
        &self,
        ctx: &OperationContext,
        identifier: &str,
    ) -> StorageResult<FetchedObject> {
        keys::validate_identifier(identifier)?;
        self.fetch(ctx, &keys::image_blob_key(identifier), identifier)
            .await
    }

    async fn get_document(
        &self,
        ctx: &OperationContext,
        identifier: &str,
    ) -> StorageResult<FetchedObject> {
        keys::validate_identifier(identifier)?;
        self.fetch(ctx, &keys::document_blob_key(identifier), identifier)
            .await
    }

    async fn delete_image(&self, ctx: &OperationContext, identifier: &str) -> StorageResult<()> {
        keys::validate_identifier(identifier)?;
        self.remove(ctx, &keys::image_blob_key(identifier)).await
    }

    async fn delete_document(&self, ctx: &OperationContext, identifier: &str) -> StorageResult<()> {
        keys::validate_identifier(identifier)?;
        self.remove(ctx, &keys::document_blob_key(identifier)).await
    }

    fn image_url(&self, identifier: &str) -> String {
        format!("{}/{}", self.base_url, keys::image_blob_key(identifier))
    }

    fn document_url(&self, identifier: &str) -> String {
        format!("{}/{}", self.base_url, keys::document_blob_key(identifier))
    }

    fn stores_inline(&self) -> bool {
        false
    }

    fn provider(&self) -> StorageProvider {
        StorageProvider::Azure
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    const BASE_URL: &str = "https://shelterdev.blob.core.windows.net/animals";

    fn storage() -> (AzureBlobStorage, Arc<InMemory>) {
        let memory = Arc::new(InMemory::new());
        let storage = AzureBlobStorage::with_store(memory.clone(), "animals", BASE_URL);
        (storage, memory)
    }

    #[test]
    fn test_config_urls() {
        let config = AzureBlobConfig {
            account: "shelterdev".to_string(),
            container: "animals".to_string(),
            credentials: AzureCredentials::ManagedIdentity,
            endpoint: None,
        };
        assert_eq!(config.account_url(), "https://shelterdev.blob.core.windows.net");
        assert_eq!(config.container_url(), BASE_URL);

        let emulator = AzureBlobConfig {
            endpoint: Some("http://127.0.0.1:10000/devstoreaccount1/".to_string()),
            ..config
        };
        assert_eq!(
            emulator.container_url(),
            "http://127.0.0.1:10000/devstoreaccount1/animals"
        );
    }

    #[test]
    fn test_credentials_debug_redacts_key() {
        let debug = format!("{:?}", AzureCredentials::AccessKey("c2VjcmV0".to_string()));
        assert!(!debug.contains("c2VjcmV0"));
    }

    #[tokio::test]
    async fn test_image_round_trip() {
        let (storage, memory) = storage();
        let ctx = OperationContext::new();
        let payload = vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3];

        let uploaded = storage
            .upload_image(&ctx, payload.clone(), "image/jpeg", &HashMap::new())
            .await
            .unwrap();

        assert!(uploaded.identifier.ends_with(".jpg"));
        assert_eq!(
            uploaded.url,
            format!("{}/images/{}", BASE_URL, uploaded.identifier)
        );
        assert_eq!(uploaded.url, storage.image_url(&uploaded.identifier));

        let key = Path::from(format!("images/{}", uploaded.identifier));
        assert!(memory.head(&key).await.is_ok());

        let fetched = storage.get_image(&ctx, &uploaded.identifier).await.unwrap();
        assert_eq!(fetched.data, payload);
        assert_eq!(fetched.content_type, "image/jpeg");
    }

    #[tokio::test]
    async fn test_image_extension_follows_mime() {
        let (storage, _) = storage();
        let ctx = OperationContext::new();
        let png = storage
            .upload_image(&ctx, vec![1], "image/png", &HashMap::new())
            .await
            .unwrap();
        assert!(png.identifier.ends_with(".png"));

        let unknown = storage
            .upload_image(&ctx, vec![1], "image/x-unknown", &HashMap::new())
            .await
            .unwrap();
        assert!(unknown.identifier.ends_with(".jpg"));
        assert_ne!(png.identifier, unknown.identifier);
    }

    #[tokio::test]
    async fn test_metadata_is_attached() {
        let (storage, memory) = storage();
        let ctx = OperationContext::new();
        let mut metadata = HashMap::new();
        metadata.insert("animal_id".to_string(), "42".to_string());

        let uploaded = storage
            .upload_image(&ctx, vec![9, 9], "image/jpeg", &metadata)
            .await
            .unwrap();

        let key = Path::from(format!("images/{}", uploaded.identifier));
        let result = memory.get(&key).await.unwrap();
        let value = result
            .attributes
            .get(&Attribute::Metadata("animal_id".into()))
            .unwrap();
        let value: &str = value.as_ref();
        assert_eq!(value, "42");
    }

    #[tokio::test]
    async fn test_invalid_metadata_name_rejected_before_upload() {
        let (storage, memory) = storage();
        let mut metadata = HashMap::new();
        metadata.insert("x-bad-name".to_string(), "v".to_string());

        let result = storage
            .upload_image(&OperationContext::new(), vec![1], "image/jpeg", &metadata)
            .await;
        assert!(matches!(result, Err(StorageError::Validation(_))));
        assert!(memory.list_with_delimiter(None).await.unwrap().objects.is_empty());
    }

    #[tokio::test]
    async fn test_document_round_trip_with_disposition() {
        let (storage, memory) = storage();
        let ctx = OperationContext::new();
        let payload = b"%PDF-1.7 intake".to_vec();

        let uploaded = storage
            .upload_document(&ctx, payload.clone(), "application/pdf", Some("Intake.PDF"))
            .await
            .unwrap();
        assert!(uploaded.identifier.ends_with(".pdf"));
        assert_eq!(
            uploaded.url,
            format!("{}/documents/{}", BASE_URL, uploaded.identifier)
        );

        let key = Path::from(format!("documents/{}", uploaded.identifier));
        let raw = memory.get(&key).await.unwrap();
        let disposition: &str = raw
            .attributes
            .get(&Attribute::ContentDisposition)
            .unwrap()
            .as_ref();
        assert_eq!(disposition, "inline; filename=\"Intake.PDF\"");

        let fetched = storage.get_document(&ctx, &uploaded.identifier).await.unwrap();
        assert_eq!(fetched.data, payload);
        assert_eq!(fetched.content_type, "application/pdf");
    }

    #[tokio::test]
    async fn test_document_extension_falls_back_to_mime() {
        let (storage, _) = storage();
        let ctx = OperationContext::new();
        let doc = storage
            .upload_document(&ctx, vec![1], "application/msword", Some("protocol"))
            .await
            .unwrap();
        assert!(doc.identifier.ends_with(".doc"));

        let bin = storage
            .upload_document(&ctx, vec![1], "application/zip", None)
            .await
            .unwrap();
        assert!(bin.identifier.ends_with(".bin"));
    }

    #[tokio::test]
    async fn test_missing_content_type_falls_back_to_extension() {
        let (storage, memory) = storage();
        let identifier = "0b0e7a1c-4c8e-4f7b-9a0e-1f2d3c4b5a69.png";
        memory
            .put(
                &Path::from(format!("images/{}", identifier)),
                PutPayload::from(Bytes::from_static(b"png")),
            )
            .await
            .unwrap();

        let fetched = storage
            .get_image(&OperationContext::new(), identifier)
            .await
            .unwrap();
        assert_eq!(fetched.content_type, "image/png");
    }

    #[tokio::test]
    async fn test_not_found_is_uniform() {
        let (storage, _) = storage();
        let ctx = OperationContext::new();

        let never = "6a1f4c0e-0000-4000-8000-000000000000.jpg";
        assert!(matches!(
            storage.get_image(&ctx, never).await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            storage.delete_image(&ctx, never).await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            storage.get_document(&ctx, "6a1f4c0e-0000-4000-8000-000000000000.pdf").await,
            Err(StorageError::NotFound(_))
        ));

        let uploaded = storage
            .upload_image(&ctx, vec![1, 2], "image/jpeg", &HashMap::new())
            .await
            .unwrap();
        storage.delete_image(&ctx, &uploaded.identifier).await.unwrap();

        assert!(matches!(
            storage.get_image(&ctx, &uploaded.identifier).await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            storage.delete_image(&ctx, &uploaded.identifier).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_document_and_image_namespaces_are_separate() {
        let (storage, _) = storage();
        let ctx = OperationContext::new();
        let uploaded = storage
            .upload_image(&ctx, vec![1], "image/jpeg", &HashMap::new())
            .await
            .unwrap();
        assert!(matches!(
            storage.get_document(&ctx, &uploaded.identifier).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_traversal_identifier_rejected() {
        let (storage, _) = storage();
        let result = storage
            .get_image(&OperationContext::new(), "../documents/x.pdf")
            .await;
        assert!(matches!(result, Err(StorageError::Validation(_))));
    }

    #[tokio::test]
    async fn test_cancelled_upload_leaves_nothing_behind() {
        let (storage, memory) = storage();
        let ctx = OperationContext::new();
        ctx.cancel();

        let result = storage
            .upload_image(&ctx, vec![1, 2, 3], "image/jpeg", &HashMap::new())
            .await;
        assert!(matches!(result, Err(StorageError::Cancelled)));
        assert!(memory.list_with_delimiter(None).await.unwrap().objects.is_empty());
    }

    #[test]
    fn test_urls_are_pure() {
        let (storage, _) = storage();
        assert_eq!(
            storage.image_url("a.jpg"),
            "https://shelterdev.blob.core.windows.net/animals/images/a.jpg"
        );
        assert_eq!(
            storage.document_url("b.pdf"),
            "https://shelterdev.blob.core.windows.net/animals/documents/b.pdf"
        );
        assert!(!storage.stores_inline());
        assert_eq!(storage.provider(), StorageProvider::Azure);
    }
}
