//! Payloads stored inline in Postgres rows.
//!
//! Images live in `animal_images.image_data`, protocol documents in
//! `animals.protocol_document`. Rows are looked up by the URL derived from the
//! identifier, so this backend only reads and resolves. Writing and deleting
//! payloads is part of the owning row's lifecycle.

use std::collections::HashMap;

use async_trait::async_trait;
use shelter_core::models::UploadedObject;
use sqlx::PgPool;

use crate::context::OperationContext;
use crate::keys;
use crate::traits::{FetchedObject, MediaStorage, StorageError, StorageResult};
use crate::StorageProvider;

const DEFAULT_DOCUMENT_MIME: &str = "application/octet-stream";

/// Relational blob backend
#[derive(Clone)]
pub struct DatabaseStorage {
    pool: PgPool,
}

impl DatabaseStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn backend_error(operation: &'static str, identifier: &str, err: sqlx::Error) -> StorageError {
        tracing::error!(
            error = %err,
            identifier = %identifier,
            operation,
            "Database storage query failed"
        );
        StorageError::Backend(format!("{} failed: {}", operation, err))
    }

    async fn image_row_exists(&self, ctx: &OperationContext, url: &str) -> StorageResult<bool> {
        ctx.run(async {
            sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM animal_images WHERE image_url = $1 AND deleted_at IS NULL)",
            )
            .bind(url)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Self::backend_error("image lookup", url, e))
        })
        .await
    }

    async fn document_row_exists(&self, ctx: &OperationContext, url: &str) -> StorageResult<bool> {
        ctx.run(async {
            sqlx::query_scalar::<_, bool>(
                r#"
                SELECT EXISTS (
                    SELECT 1 FROM animals
                    WHERE protocol_document_url = $1
                      AND protocol_document IS NOT NULL
                      AND deleted_at IS NULL
                )
                "#,
            )
            .bind(url)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Self::backend_error("document lookup", url, e))
        })
        .await
    }
}

#[async_trait]
impl MediaStorage for DatabaseStorage {
    async fn upload_image(
        &self,
        _ctx: &OperationContext,
        _data: Vec<u8>,
        _content_type: &str,
        _metadata: &HashMap<String, String>,
    ) -> StorageResult<UploadedObject> {
        Err(StorageError::Unsupported(
            "database storage keeps image bytes in the animal_images row; insert them with the row"
                .to_string(),
        ))
    }

    async fn upload_document(
        &self,
        _ctx: &OperationContext,
        _data: Vec<u8>,
        _content_type: &str,
        _filename: Option<&str>,
    ) -> StorageResult<UploadedObject> {
        Err(StorageError::Unsupported(
            "database storage keeps documents in the animals row; write them with the row"
                .to_string(),
        ))
    }

    async fn get_image(
        &self,
        ctx: &OperationContext,
        identifier: &str,
    ) -> StorageResult<FetchedObject> {
        let url = self.image_url(identifier);
        let start = std::time::Instant::now();

        let row = ctx
            .run(async {
                sqlx::query_as::<_, (Option<Vec<u8>>, String)>(
                    "SELECT image_data, mime_type FROM animal_images WHERE image_url = $1 AND deleted_at IS NULL",
                )
                .bind(&url)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| Self::backend_error("image fetch", identifier, e))
            })
            .await?;

        match row {
            Some((Some(data), content_type)) => {
                tracing::debug!(
                    identifier = %identifier,
                    size_bytes = data.len(),
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Image loaded from database"
                );
                Ok(FetchedObject { data, content_type })
            }
            _ => Err(StorageError::NotFound(identifier.to_string())),
        }
    }

    async fn get_document(
        &self,
        ctx: &OperationContext,
        identifier: &str,
    ) -> StorageResult<FetchedObject> {
        let url = self.document_url(identifier);

        let row = ctx
            .run(async {
                sqlx::query_as::<_, (Option<Vec<u8>>, Option<String>)>(
                    r#"
                    SELECT protocol_document, protocol_document_mime
                    FROM animals
                    WHERE protocol_document_url = $1 AND deleted_at IS NULL
                    "#,
                )
                .bind(&url)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| Self::backend_error("document fetch", identifier, e))
            })
            .await?;

        match row {
            Some((Some(data), content_type)) => Ok(FetchedObject {
                data,
                content_type: content_type.unwrap_or_else(|| DEFAULT_DOCUMENT_MIME.to_string()),
            }),
            _ => Err(StorageError::NotFound(identifier.to_string())),
        }
    }

    /// Nothing is removed here: the row's soft delete hides the payload. An
    /// identifier no live row owns is still reported as not found.
    async fn delete_image(&self, ctx: &OperationContext, identifier: &str) -> StorageResult<()> {
        let url = self.image_url(identifier);
        if self.image_row_exists(ctx, &url).await? {
            Ok(())
        } else {
            Err(StorageError::NotFound(identifier.to_string()))
        }
    }

    async fn delete_document(&self, ctx: &OperationContext, identifier: &str) -> StorageResult<()> {
        let url = self.document_url(identifier);
        if self.document_row_exists(ctx, &url).await? {
            Ok(())
        } else {
            Err(StorageError::NotFound(identifier.to_string()))
        }
    }

    fn image_url(&self, identifier: &str) -> String {
        keys::image_route(identifier)
    }

    fn document_url(&self, identifier: &str) -> String {
        keys::document_route(identifier)
    }

    fn stores_inline(&self) -> bool {
        true
    }

    fn provider(&self) -> StorageProvider {
        StorageProvider::Database
    }
}
