//! Profile picture coordinator
//!
//! Each animal has at most one live image with `is_profile_picture = true`,
//! and `animals.image_url` mirrors that image's URL. Every change to either
//! goes through [`ProfilePictureCoordinator`], which locks the animal row
//! for the duration of its transaction. Two concurrent promotions for the same
//! animal therefore run one after the other; the second one sees the first
//! one's result when it clears the currently active image. The partial unique
//! index on `animal_images` backs this up at the schema level.

use std::sync::Arc;

use shelter_core::models::AnimalImage;
use shelter_core::AppError;
use shelter_storage::{MediaStorage, OperationContext, StorageError};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::animal_image::IMAGE_COLUMNS;
use super::transaction::TransactionGuard;

#[derive(Clone)]
pub struct ProfilePictureCoordinator {
    pool: PgPool,
    storage: Arc<dyn MediaStorage>,
}

impl ProfilePictureCoordinator {
    pub fn new(pool: PgPool, storage: Arc<dyn MediaStorage>) -> Self {
        Self { pool, storage }
    }

    /// Make `image_id` the profile picture of `animal_id`.
    ///
    /// Promoting the image that is already active is a no-op that still
    /// succeeds. Fails with `NotFound` if the animal or the image does not
    /// exist, is deleted, or the image belongs to another animal.
    #[tracing::instrument(
        skip(self),
        fields(db.table = "animal_images", db.operation = "promote")
    )]
    pub async fn promote(&self, animal_id: Uuid, image_id: Uuid) -> Result<AnimalImage, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;
        let result = Self::promote_in(&mut tx, animal_id, image_id).await;
        let image = tx.finish(result).await?;

        tracing::info!(
            animal_id = %animal_id,
            image_id = %image_id,
            "Profile picture updated"
        );
        Ok(image)
    }

    async fn promote_in(
        tx: &mut Transaction<'_, Postgres>,
        animal_id: Uuid,
        image_id: Uuid,
    ) -> Result<AnimalImage, AppError> {
        lock_animal(tx, animal_id).await?;
        let image = live_image_of(tx, animal_id, image_id).await?;

        sqlx::query(
            r#"
            UPDATE animal_images
            SET is_profile_picture = FALSE, updated_at = NOW()
            WHERE animal_id = $1
              AND is_profile_picture
              AND deleted_at IS NULL
              AND id <> $2
            "#,
        )
        .bind(animal_id)
        .bind(image_id)
        .execute(&mut **tx)
        .await?;

        let promoted = sqlx::query_as::<Postgres, AnimalImage>(&format!(
            r#"
            UPDATE animal_images
            SET is_profile_picture = TRUE, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            IMAGE_COLUMNS
        ))
        .bind(image.id)
        .fetch_one(&mut **tx)
        .await?;

        sqlx::query("UPDATE animals SET image_url = $2, updated_at = NOW() WHERE id = $1")
            .bind(animal_id)
            .bind(&promoted.image_url)
            .execute(&mut **tx)
            .await?;

        Ok(promoted)
    }

    /// Delete an image that is not the active profile picture.
    ///
    /// The active profile picture is rejected with `Conflict`; promote another
    /// image first. The row is soft-deleted in one transaction; stored bytes
    /// are removed through the storage backend only after that commits, so a
    /// failed delete never leaves a live row without its bytes. Bytes that are
    /// already missing are fine.
    #[tracing::instrument(
        skip(self, ctx),
        fields(db.table = "animal_images", db.operation = "delete")
    )]
    pub async fn delete_image(
        &self,
        ctx: &OperationContext,
        animal_id: Uuid,
        image_id: Uuid,
    ) -> Result<(), AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;
        let result = Self::delete_in(&mut tx, animal_id, image_id).await;
        let storage_key = tx.finish(result).await?;

        if !self.storage.stores_inline() {
            self.discard_bytes(ctx, &storage_key).await;
        }

        tracing::info!(animal_id = %animal_id, image_id = %image_id, "Image deleted");
        Ok(())
    }

    /// Soft-delete the row and hand back its storage key.
    async fn delete_in(
        tx: &mut Transaction<'_, Postgres>,
        animal_id: Uuid,
        image_id: Uuid,
    ) -> Result<String, AppError> {
        lock_animal(tx, animal_id).await?;
        let image = live_image_of(tx, animal_id, image_id).await?;

        if image.is_profile_picture {
            return Err(AppError::Conflict(
                "Cannot delete the active profile picture; promote another image first"
                    .to_string(),
            ));
        }

        sqlx::query(
            r#"
            UPDATE animal_images
            SET deleted_at = NOW(), updated_at = NOW(), image_data = NULL
            WHERE id = $1
            "#,
        )
        .bind(image.id)
        .execute(&mut **tx)
        .await?;

        Ok(image.storage_key)
    }

    /// Remove bytes of an already soft-deleted image. Failures are logged; the
    /// row is gone either way.
    async fn discard_bytes(&self, ctx: &OperationContext, storage_key: &str) {
        match self.storage.delete_image(ctx, storage_key).await {
            Ok(()) => {}
            Err(StorageError::NotFound(_)) => {
                tracing::warn!(
                    storage_key = %storage_key,
                    provider = %self.storage.provider(),
                    "Image bytes already missing from storage"
                );
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    storage_key = %storage_key,
                    provider = %self.storage.provider(),
                    "Failed to remove image bytes after delete"
                );
            }
        }
    }
}

/// Take the per-animal lock that serializes profile picture changes.
async fn lock_animal(tx: &mut Transaction<'_, Postgres>, animal_id: Uuid) -> Result<(), AppError> {
    sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM animals WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
    )
    .bind(animal_id)
    .fetch_optional(&mut **tx)
    .await?
    .map(|_| ())
    .ok_or_else(|| AppError::NotFound(format!("Animal {} not found", animal_id)))
}

async fn live_image_of(
    tx: &mut Transaction<'_, Postgres>,
    animal_id: Uuid,
    image_id: Uuid,
) -> Result<AnimalImage, AppError> {
    sqlx::query_as::<Postgres, AnimalImage>(&format!(
        "SELECT {} FROM animal_images WHERE id = $1 AND animal_id = $2 AND deleted_at IS NULL",
        IMAGE_COLUMNS
    ))
    .bind(image_id)
    .bind(animal_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Image {} not found", image_id)))
}
