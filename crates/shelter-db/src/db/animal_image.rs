use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use shelter_core::models::AnimalImage;
use shelter_core::AppError;
use shelter_processing::upload::ImageUploadProcessor;
use shelter_processing::UploadProcessor;
use shelter_storage::{FetchedObject, MediaStorage, OperationContext, StorageError, UploadedObject};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

/// Bound on removing an orphaned upload. Cleanup does not follow the
/// request's cancellation, which may be the reason it is needed.
const CLEANUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Columns selected into [`AnimalImage`]; the payload column is never loaded here.
pub(crate) const IMAGE_COLUMNS: &str = "id, animal_id, uploaded_by, storage_key, image_url, \
     mime_type, width, height, file_size, is_profile_picture, created_at, updated_at, deleted_at";

/// Images attached to animals
///
/// Uploads always pass through the media codec. Whether the normalized bytes
/// go to the storage backend or into the row depends on
/// [`MediaStorage::stores_inline`]. New images are never the profile picture;
/// use [`ProfilePictureCoordinator`](super::ProfilePictureCoordinator) to promote one.
#[derive(Clone)]
pub struct AnimalImageRepository {
    pool: PgPool,
    storage: Arc<dyn MediaStorage>,
    processor: ImageUploadProcessor,
}

impl AnimalImageRepository {
    pub fn new(pool: PgPool, storage: Arc<dyn MediaStorage>) -> Self {
        Self {
            pool,
            storage,
            processor: ImageUploadProcessor::new(),
        }
    }

    #[tracing::instrument(
        skip(self, ctx, data),
        fields(db.table = "animal_images", db.operation = "insert", size_bytes = data.len())
    )]
    pub async fn create_image(
        &self,
        ctx: &OperationContext,
        animal_id: Uuid,
        uploaded_by: Uuid,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<AnimalImage, AppError> {
        if !self.animal_exists(ctx, animal_id).await? {
            return Err(AppError::NotFound(format!("Animal {} not found", animal_id)));
        }

        let processed = ctx
            .run(async {
                Ok::<_, StorageError>(self.processor.process(data, content_type.to_string()).await)
            })
            .await??;
        let id = Uuid::new_v4();
        let width = processed.metadata.width as i32;
        let height = processed.metadata.height as i32;
        let file_size = processed.size_bytes() as i64;

        if self.storage.stores_inline() {
            let identifier = id.to_string();
            let url = self.storage.image_url(&identifier);
            let inserted = self
                .insert(
                    ctx,
                    id,
                    animal_id,
                    uploaded_by,
                    &identifier,
                    &url,
                    Some(&processed.data),
                    &processed.content_type,
                    (width, height, file_size),
                )
                .await?;
            return inserted
                .ok_or_else(|| AppError::NotFound(format!("Animal {} not found", animal_id)));
        }

        let mut metadata = HashMap::new();
        metadata.insert("animal_id".to_string(), animal_id.to_string());
        metadata.insert("uploaded_by".to_string(), uploaded_by.to_string());

        let UploadedObject { url, identifier } = self
            .storage
            .upload_image(ctx, processed.data, &processed.content_type, &metadata)
            .await?;

        let inserted = self
            .insert(
                ctx,
                id,
                animal_id,
                uploaded_by,
                &identifier,
                &url,
                None,
                &processed.content_type,
                (width, height, file_size),
            )
            .await;

        match inserted {
            Ok(Some(image)) => Ok(image),
            Ok(None) => {
                self.discard_upload(&identifier).await;
                Err(AppError::NotFound(format!("Animal {} not found", animal_id)))
            }
            Err(e) => {
                self.discard_upload(&identifier).await;
                Err(e)
            }
        }
    }

    /// Insert the row if the animal is still live. `None` means it is not.
    #[allow(clippy::too_many_arguments)]
    async fn insert(
        &self,
        ctx: &OperationContext,
        id: Uuid,
        animal_id: Uuid,
        uploaded_by: Uuid,
        identifier: &str,
        url: &str,
        payload: Option<&[u8]>,
        mime_type: &str,
        (width, height, file_size): (i32, i32, i64),
    ) -> Result<Option<AnimalImage>, AppError> {
        let query = format!(
            r#"
            INSERT INTO animal_images (
                id, animal_id, uploaded_by, storage_key, image_url, image_data,
                mime_type, width, height, file_size, is_profile_picture
            )
            SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, FALSE
            WHERE EXISTS (SELECT 1 FROM animals WHERE id = $2 AND deleted_at IS NULL)
            RETURNING {}
            "#,
            IMAGE_COLUMNS
        );
        let row = ctx
            .run(async {
                Ok::<_, StorageError>(
                    sqlx::query_as::<Postgres, AnimalImage>(&query)
                        .bind(id)
                        .bind(animal_id)
                        .bind(uploaded_by)
                        .bind(identifier)
                        .bind(url)
                        .bind(payload)
                        .bind(mime_type)
                        .bind(width)
                        .bind(height)
                        .bind(file_size)
                        .fetch_optional(&self.pool)
                        .await,
                )
            })
            .await??;

        if let Some(ref image) = row {
            tracing::info!(
                image_id = %image.id,
                animal_id = %animal_id,
                storage_key = %image.storage_key,
                provider = %self.storage.provider(),
                "Animal image stored"
            );
        }
        Ok(row)
    }

    async fn discard_upload(&self, identifier: &str) {
        let ctx = OperationContext::with_timeout(CLEANUP_TIMEOUT);
        if let Err(e) = self.storage.delete_image(&ctx, identifier).await {
            tracing::warn!(
                error = %e,
                identifier = %identifier,
                "Failed to remove uploaded image after insert failure"
            );
        }
    }

    async fn animal_exists(
        &self,
        ctx: &OperationContext,
        animal_id: Uuid,
    ) -> Result<bool, AppError> {
        let exists = ctx
            .run(async {
                Ok::<_, StorageError>(
                    sqlx::query_scalar::<_, bool>(
                        "SELECT EXISTS (SELECT 1 FROM animals WHERE id = $1 AND deleted_at IS NULL)",
                    )
                    .bind(animal_id)
                    .fetch_one(&self.pool)
                    .await,
                )
            })
            .await??;
        Ok(exists)
    }

    #[tracing::instrument(skip(self), fields(db.table = "animal_images", db.operation = "select"))]
    pub async fn get(&self, image_id: Uuid) -> Result<Option<AnimalImage>, AppError> {
        let image = sqlx::query_as::<Postgres, AnimalImage>(&format!(
            "SELECT {} FROM animal_images WHERE id = $1 AND deleted_at IS NULL",
            IMAGE_COLUMNS
        ))
        .bind(image_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(image)
    }

    #[tracing::instrument(skip(self), fields(db.table = "animal_images", db.operation = "select"))]
    pub async fn list_for_animal(&self, animal_id: Uuid) -> Result<Vec<AnimalImage>, AppError> {
        let images = sqlx::query_as::<Postgres, AnimalImage>(&format!(
            r#"
            SELECT {} FROM animal_images
            WHERE animal_id = $1 AND deleted_at IS NULL
            ORDER BY created_at ASC, id ASC
            "#,
            IMAGE_COLUMNS
        ))
        .bind(animal_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(images)
    }

    #[tracing::instrument(skip(self), fields(db.table = "animal_images", db.operation = "select"))]
    pub async fn active_profile_picture(
        &self,
        animal_id: Uuid,
    ) -> Result<Option<AnimalImage>, AppError> {
        let image = sqlx::query_as::<Postgres, AnimalImage>(&format!(
            r#"
            SELECT {} FROM animal_images
            WHERE animal_id = $1 AND is_profile_picture AND deleted_at IS NULL
            "#,
            IMAGE_COLUMNS
        ))
        .bind(animal_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(image)
    }

    /// Bytes and content type of a live image, from whichever backend holds them.
    pub async fn fetch_image_bytes(
        &self,
        ctx: &OperationContext,
        image_id: Uuid,
    ) -> Result<FetchedObject, AppError> {
        let image = self
            .get(image_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Image {} not found", image_id)))?;
        let fetched = self.storage.get_image(ctx, &image.storage_key).await?;
        Ok(fetched)
    }
}
