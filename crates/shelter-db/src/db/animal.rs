use std::sync::Arc;

use shelter_core::models::Animal;
use shelter_core::AppError;
use shelter_processing::upload::DocumentUploadProcessor;
use shelter_processing::UploadProcessor;
use shelter_storage::{FetchedObject, MediaStorage, OperationContext, StorageError};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::transaction::TransactionGuard;

const ANIMAL_COLUMNS: &str = "id, name, image_url, protocol_document_key, protocol_document_url, \
     protocol_document_mime, protocol_document_name, created_at, updated_at, deleted_at";

/// Animal rows and the one protocol document each animal may carry.
#[derive(Clone)]
pub struct AnimalRepository {
    pool: PgPool,
    storage: Arc<dyn MediaStorage>,
}

/// Where a protocol document's bytes live.
enum DocumentPayload<'a> {
    Inline(&'a [u8]),
    Stored,
}

impl AnimalRepository {
    pub fn new(pool: PgPool, storage: Arc<dyn MediaStorage>) -> Self {
        Self { pool, storage }
    }

    #[tracing::instrument(skip(self), fields(db.table = "animals", db.operation = "insert"))]
    pub async fn create(&self, name: &str) -> Result<Animal, AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Animal name must not be empty".to_string()));
        }

        let animal = sqlx::query_as::<Postgres, Animal>(&format!(
            "INSERT INTO animals (id, name) VALUES ($1, $2) RETURNING {}",
            ANIMAL_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(animal_id = %animal.id, "Animal created");
        Ok(animal)
    }

    #[tracing::instrument(skip(self), fields(db.table = "animals", db.operation = "select"))]
    pub async fn get(&self, id: Uuid) -> Result<Option<Animal>, AppError> {
        let animal = sqlx::query_as::<Postgres, Animal>(&format!(
            "SELECT {} FROM animals WHERE id = $1 AND deleted_at IS NULL",
            ANIMAL_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(animal)
    }

    /// Attach a protocol document, replacing any previous one.
    ///
    /// Document bytes are stored as uploaded. With an object-storage backend
    /// the new object is uploaded first and the replaced object is removed
    /// only after the row update commits; a failed update removes the new
    /// object again.
    #[tracing::instrument(
        skip(self, ctx, data),
        fields(db.table = "animals", db.operation = "update", size_bytes = data.len())
    )]
    pub async fn set_protocol_document(
        &self,
        ctx: &OperationContext,
        animal_id: Uuid,
        data: Vec<u8>,
        content_type: &str,
        filename: Option<&str>,
    ) -> Result<Animal, AppError> {
        let processor = match filename {
            Some(name) => DocumentUploadProcessor::with_filename(name),
            None => DocumentUploadProcessor::new(),
        };
        let processed = processor.process(data, content_type.to_string()).await?;

        if self.storage.stores_inline() {
            let identifier = Uuid::new_v4().to_string();
            let url = self.storage.document_url(&identifier);
            let (animal, _) = self
                .replace_document(
                    animal_id,
                    &identifier,
                    &url,
                    &processed.content_type,
                    filename,
                    DocumentPayload::Inline(&processed.data),
                )
                .await?;
            return Ok(animal);
        }

        let uploaded = self
            .storage
            .upload_document(ctx, processed.data, &processed.content_type, filename)
            .await?;

        let replaced = self
            .replace_document(
                animal_id,
                &uploaded.identifier,
                &uploaded.url,
                &processed.content_type,
                filename,
                DocumentPayload::Stored,
            )
            .await;

        match replaced {
            Ok((animal, previous)) => {
                if let Some(previous) = previous {
                    self.discard_document(ctx, &previous).await;
                }
                Ok(animal)
            }
            Err(e) => {
                self.discard_document(ctx, &uploaded.identifier).await;
                Err(e)
            }
        }
    }

    /// Update the document columns under the row lock. Returns the updated
    /// animal and the identifier of the document it replaced, if any.
    async fn replace_document(
        &self,
        animal_id: Uuid,
        identifier: &str,
        url: &str,
        mime: &str,
        filename: Option<&str>,
        payload: DocumentPayload<'_>,
    ) -> Result<(Animal, Option<String>), AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;
        let result = async {
            let previous = lock_document_key(&mut tx, animal_id).await?;
            let inline = match payload {
                DocumentPayload::Inline(bytes) => Some(bytes),
                DocumentPayload::Stored => None,
            };

            let animal = sqlx::query_as::<Postgres, Animal>(&format!(
                r#"
                UPDATE animals
                SET protocol_document = $2,
                    protocol_document_key = $3,
                    protocol_document_url = $4,
                    protocol_document_mime = $5,
                    protocol_document_name = $6,
                    updated_at = NOW()
                WHERE id = $1
                RETURNING {}
                "#,
                ANIMAL_COLUMNS
            ))
            .bind(animal_id)
            .bind(inline)
            .bind(identifier)
            .bind(url)
            .bind(mime)
            .bind(filename)
            .fetch_one(&mut **tx)
            .await?;

            Ok::<_, AppError>((animal, previous))
        }
        .await;
        tx.finish(result).await
    }

    /// Detach the protocol document. Missing documents are not an error.
    #[tracing::instrument(skip(self, ctx), fields(db.table = "animals", db.operation = "update"))]
    pub async fn remove_protocol_document(
        &self,
        ctx: &OperationContext,
        animal_id: Uuid,
    ) -> Result<(), AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;
        let result = async {
            let previous = lock_document_key(&mut tx, animal_id).await?;
            sqlx::query(
                r#"
                UPDATE animals
                SET protocol_document = NULL,
                    protocol_document_key = NULL,
                    protocol_document_url = NULL,
                    protocol_document_mime = NULL,
                    protocol_document_name = NULL,
                    updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(animal_id)
            .execute(&mut **tx)
            .await?;
            Ok::<_, AppError>(previous)
        }
        .await;
        let previous = tx.finish(result).await?;

        if let Some(previous) = previous {
            if !self.storage.stores_inline() {
                self.discard_document(ctx, &previous).await;
            }
        }
        Ok(())
    }

    /// Bytes and content type of the animal's protocol document.
    pub async fn get_protocol_document(
        &self,
        ctx: &OperationContext,
        animal_id: Uuid,
    ) -> Result<FetchedObject, AppError> {
        let animal = self
            .get(animal_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Animal {} not found", animal_id)))?;
        let key = animal.protocol_document_key.ok_or_else(|| {
            AppError::NotFound(format!("Animal {} has no protocol document", animal_id))
        })?;
        Ok(self.storage.get_document(ctx, &key).await?)
    }

    async fn discard_document(&self, ctx: &OperationContext, identifier: &str) {
        if self.storage.stores_inline() {
            return;
        }
        match self.storage.delete_document(ctx, identifier).await {
            Ok(()) | Err(StorageError::NotFound(_)) => {}
            Err(e) => tracing::warn!(
                error = %e,
                identifier = %identifier,
                "Failed to remove protocol document from storage"
            ),
        }
    }
}

async fn lock_document_key(
    tx: &mut Transaction<'_, Postgres>,
    animal_id: Uuid,
) -> Result<Option<String>, AppError> {
    sqlx::query_scalar::<_, Option<String>>(
        "SELECT protocol_document_key FROM animals WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
    )
    .bind(animal_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Animal {} not found", animal_id)))
}
