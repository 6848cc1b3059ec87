//! Container bootstrap for Azure Blob Storage.
//!
//! `object_store` reads and writes blobs but cannot create containers, so the
//! `Create Container` call is issued directly with `reqwest`. Both "created"
//! and "already exists" count as success, which lets several processes start
//! against a fresh account at the same time.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use object_store::azure::{AzureCredential, AzureCredentialProvider};
use object_store::CredentialProvider;
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH};
use reqwest::StatusCode;
use sha2::Sha256;

use crate::context::OperationContext;
use crate::traits::{StorageError, StorageResult};

type HmacSha256 = Hmac<Sha256>;

const MS_VERSION: &str = "2021-08-06";
const RFC1123_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// How the bootstrap request authenticates.
#[derive(Clone)]
pub enum ContainerAuth {
    /// Storage account shared key (base64, as shown in the portal).
    SharedKey(String),
    /// Bearer token from a credential provider, e.g. managed identity.
    Token(AzureCredentialProvider),
}

impl fmt::Debug for ContainerAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerAuth::SharedKey(_) => f.write_str("SharedKey(<redacted>)"),
            ContainerAuth::Token(_) => f.write_str("Token(..)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStatus {
    Created,
    AlreadyExists,
}

#[derive(Debug, Clone)]
pub struct ContainerBootstrap {
    client: reqwest::Client,
    account: String,
    account_url: String,
    container: String,
    auth: ContainerAuth,
}

impl ContainerBootstrap {
    /// `account_url` is the blob service endpoint for the account, e.g.
    /// `https://{account}.blob.core.windows.net` or an emulator URL that
    /// already includes the account segment.
    pub fn new(
        client: reqwest::Client,
        account: impl Into<String>,
        account_url: impl Into<String>,
        container: impl Into<String>,
        auth: ContainerAuth,
    ) -> Self {
        Self {
            client,
            account: account.into(),
            account_url: account_url.into().trim_end_matches('/').to_string(),
            container: container.into(),
            auth,
        }
    }

    fn container_url(&self) -> String {
        format!("{}/{}", self.account_url, self.container)
    }

    /// Create the container unless it already exists.
    pub async fn ensure_container(&self, ctx: &OperationContext) -> StorageResult<ContainerStatus> {
        ctx.run(self.create_container()).await
    }

    async fn create_container(&self) -> StorageResult<ContainerStatus> {
        let container_url = format!("{}?restype=container", self.container_url());
        let url = reqwest::Url::parse(&container_url).map_err(|e| {
            StorageError::Configuration(format!("Invalid container URL {}: {}", container_url, e))
        })?;

        let date = chrono::Utc::now().format(RFC1123_FORMAT).to_string();
        let authorization = self.authorization(url.path(), &date).await?;

        let response = self
            .client
            .put(url)
            .header("x-ms-date", &date)
            .header("x-ms-version", MS_VERSION)
            .header(CONTENT_LENGTH, 0)
            .header(AUTHORIZATION, authorization)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    container = %self.container,
                    "Create container request failed"
                );
                StorageError::Backend(format!("Create container request failed: {}", e))
            })?;

        let status = response.status();
        match status {
            StatusCode::CREATED => {
                tracing::info!(container = %self.container, "Blob container created");
                Ok(ContainerStatus::Created)
            }
            StatusCode::CONFLICT => {
                let body = response.text().await.unwrap_or_default();
                if body.contains("ContainerBeingDeleted") {
                    return Err(StorageError::Backend(format!(
                        "Container {} is being deleted",
                        self.container
                    )));
                }
                tracing::debug!(container = %self.container, "Blob container already exists");
                Ok(ContainerStatus::AlreadyExists)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                let body = response.text().await.unwrap_or_default();
                tracing::error!(
                    status = status.as_u16(),
                    container = %self.container,
                    "Create container was rejected"
                );
                Err(StorageError::Configuration(format!(
                    "Not authorized to create container {} ({}): {}",
                    self.container, status, body
                )))
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                tracing::error!(
                    status = status.as_u16(),
                    container = %self.container,
                    "Create container failed"
                );
                Err(StorageError::Backend(format!(
                    "Create container {} failed with {}: {}",
                    self.container, status, body
                )))
            }
        }
    }

    async fn authorization(&self, url_path: &str, date: &str) -> StorageResult<String> {
        match &self.auth {
            ContainerAuth::SharedKey(key) => {
                let string_to_sign = create_container_string_to_sign(&self.account, url_path, date);
                let signature = sign(key, &string_to_sign)?;
                Ok(format!("SharedKey {}:{}", self.account, signature))
            }
            ContainerAuth::Token(provider) => {
                let credential = provider.get_credential().await.map_err(|e| {
                    StorageError::Configuration(format!("Failed to obtain Azure credential: {}", e))
                })?;
                match credential.as_ref() {
                    AzureCredential::BearerToken(token) => Ok(format!("Bearer {}", token)),
                    _ => Err(StorageError::Configuration(
                        "Credential provider did not return a bearer token".to_string(),
                    )),
                }
            }
        }
    }
}

/// StringToSign for `PUT {container}?restype=container` with no body.
///
/// The eleven standard headers are all empty (a zero Content-Length is
/// signed as empty), followed by the `x-ms-*` headers in order and the
/// canonicalized resource.
fn create_container_string_to_sign(account: &str, url_path: &str, date: &str) -> String {
    format!(
        "PUT\n\n\n\n\n\n\n\n\n\n\n\nx-ms-date:{}\nx-ms-version:{}\n/{}{}\nrestype:container",
        date, MS_VERSION, account, url_path
    )
}

fn sign(access_key: &str, string_to_sign: &str) -> StorageResult<String> {
    let key = STANDARD
        .decode(access_key.trim())
        .map_err(|e| StorageError::Configuration(format!("Access key is not valid base64: {}", e)))?;
    let mut mac = HmacSha256::new_from_slice(&key)
        .map_err(|e| StorageError::Configuration(format!("Invalid access key: {}", e)))?;
    mac.update(string_to_sign.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}
