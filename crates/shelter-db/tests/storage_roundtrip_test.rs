#[path = "helpers/mod.rs"]
mod helpers;

use helpers::{decoded_dimensions, png, setup_test_db, Repos};
use object_store::path::Path;
use object_store::{ObjectStore, ObjectStoreExt};
use shelter_core::AppError;
use shelter_storage::{OperationContext, StorageError, StorageProvider};
use uuid::Uuid;

#[tokio::test]
async fn test_database_backend_image_roundtrip() {
    let Some(db) = setup_test_db().await else { return };
    let repos = Repos::database(&db.pool);
    let ctx = OperationContext::new();

    let animal = repos.animals.create("Paula").await.unwrap();
    let image = repos
        .images
        .create_image(&ctx, animal.id, Uuid::new_v4(), png(2400, 1600), "image/png")
        .await
        .unwrap();

    assert_eq!(repos.storage.provider(), StorageProvider::Database);
    assert_eq!(image.mime_type, "image/jpeg");
    assert_eq!((image.width, image.height), (1200, 800));
    assert_eq!(image.storage_key, image.id.to_string());
    assert_eq!(image.image_url, format!("/api/images/{}", image.id));
    assert!(!image.is_profile_picture);

    let fetched = repos.images.fetch_image_bytes(&ctx, image.id).await.unwrap();
    assert_eq!(fetched.content_type, "image/jpeg");
    assert_eq!(fetched.data.len() as i64, image.file_size);
    assert_eq!(decoded_dimensions(&fetched.data), (1200, 800));
}

#[tokio::test]
async fn test_blob_backend_image_roundtrip() {
    let Some(db) = setup_test_db().await else { return };
    let (repos, memory) = Repos::in_memory_blob(&db.pool);
    let ctx = OperationContext::new();

    let animal = repos.animals.create("Bruno").await.unwrap();
    let image = repos
        .images
        .create_image(&ctx, animal.id, Uuid::new_v4(), png(300, 200), "image/png")
        .await
        .unwrap();

    assert_eq!(repos.storage.provider(), StorageProvider::Azure);
    assert!(image.storage_key.ends_with(".jpg"));
    assert_eq!(
        image.image_url,
        format!("{}/images/{}", helpers::BLOB_BASE_URL, image.storage_key)
    );

    // Bytes live in the blob store, not in the row.
    let inline: Option<Vec<u8>> =
        sqlx::query_scalar("SELECT image_data FROM animal_images WHERE id = $1")
            .bind(image.id)
            .fetch_one(&db.pool)
            .await
            .unwrap();
    assert!(inline.is_none());
    let blob = memory
        .head(&Path::from(format!("images/{}", image.storage_key)))
        .await
        .unwrap();
    assert_eq!(blob.size as i64, image.file_size);

    let fetched = repos.images.fetch_image_bytes(&ctx, image.id).await.unwrap();
    assert_eq!(fetched.content_type, "image/jpeg");
    assert_eq!(decoded_dimensions(&fetched.data), (300, 200));
}

#[tokio::test]
async fn test_upload_for_missing_animal_is_not_found() {
    let Some(db) = setup_test_db().await else { return };
    let (repos, memory) = Repos::in_memory_blob(&db.pool);
    let ctx = OperationContext::new();

    let err = repos
        .images
        .create_image(&ctx, Uuid::new_v4(), Uuid::new_v4(), png(10, 10), "image/png")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let listed = memory.list_with_delimiter(None).await.unwrap();
    assert!(listed.objects.is_empty() && listed.common_prefixes.is_empty());
}

#[tokio::test]
async fn test_undecodable_upload_stores_nothing() {
    let Some(db) = setup_test_db().await else { return };
    let repos = Repos::database(&db.pool);
    let ctx = OperationContext::new();

    let animal = repos.animals.create("Kira").await.unwrap();
    let err = repos
        .images
        .create_image(&ctx, animal.id, Uuid::new_v4(), b"not an image".to_vec(), "image/png")
        .await
        .unwrap_err();
    assert!(!matches!(err, AppError::NotFound(_) | AppError::Conflict(_)));
    assert!(repos.images.list_for_animal(animal.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_not_found_is_uniform_on_database_backend() {
    let Some(db) = setup_test_db().await else { return };
    let repos = Repos::database(&db.pool);
    let ctx = OperationContext::new();

    let animal = repos.animals.create("Nala").await.unwrap();
    let image = repos
        .images
        .create_image(&ctx, animal.id, Uuid::new_v4(), png(12, 12), "image/png")
        .await
        .unwrap();
    repos
        .coordinator
        .delete_image(&ctx, animal.id, image.id)
        .await
        .unwrap();

    let never_issued = Uuid::new_v4().to_string();
    for identifier in [never_issued.as_str(), image.storage_key.as_str()] {
        let err = repos.storage.get_image(&ctx, identifier).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)), "{}: {:?}", identifier, err);
        let err = repos.storage.delete_image(&ctx, identifier).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)), "{}: {:?}", identifier, err);
    }

    let err = repos.images.fetch_image_bytes(&ctx, image.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_not_found_is_uniform_on_blob_backend() {
    let Some(db) = setup_test_db().await else { return };
    let (repos, memory) = Repos::in_memory_blob(&db.pool);
    let ctx = OperationContext::new();

    let animal = repos.animals.create("Simba").await.unwrap();
    let image = repos
        .images
        .create_image(&ctx, animal.id, Uuid::new_v4(), png(12, 12), "image/png")
        .await
        .unwrap();
    repos
        .coordinator
        .delete_image(&ctx, animal.id, image.id)
        .await
        .unwrap();

    assert!(memory
        .head(&Path::from(format!("images/{}", image.storage_key)))
        .await
        .is_err());

    let never_issued = format!("{}.jpg", Uuid::new_v4());
    for identifier in [never_issued.as_str(), image.storage_key.as_str()] {
        let err = repos.storage.get_image(&ctx, identifier).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)), "{}: {:?}", identifier, err);
        let err = repos.storage.delete_image(&ctx, identifier).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)), "{}: {:?}", identifier, err);
    }
}

#[tokio::test]
async fn test_delete_tolerates_bytes_already_gone() {
    let Some(db) = setup_test_db().await else { return };
    let (repos, memory) = Repos::in_memory_blob(&db.pool);
    let ctx = OperationContext::new();

    let animal = repos.animals.create("Ghost").await.unwrap();
    let image = repos
        .images
        .create_image(&ctx, animal.id, Uuid::new_v4(), png(12, 12), "image/png")
        .await
        .unwrap();

    memory
        .delete(&Path::from(format!("images/{}", image.storage_key)))
        .await
        .unwrap();

    repos
        .coordinator
        .delete_image(&ctx, animal.id, image.id)
        .await
        .unwrap();
    assert!(repos.images.get(image.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_cancelled_upload_writes_no_row() {
    let Some(db) = setup_test_db().await else { return };
    let repos = Repos::database(&db.pool);

    let animal = repos.animals.create("Fips").await.unwrap();
    let ctx = OperationContext::new();
    ctx.cancel();

    let err = repos
        .images
        .create_image(&ctx, animal.id, Uuid::new_v4(), png(40, 30), "image/png")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Storage(_)), "{:?}", err);
    assert!(repos.images.list_for_animal(animal.id).await.unwrap().is_empty());
}
