use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::storage::StoredObject;

/// An image attached to an animal.
///
/// `is_profile_picture` is only ever written by the profile-picture
/// coordinator. Rows are soft-deleted through `deleted_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct AnimalImage {
    pub id: Uuid,
    pub animal_id: Uuid,
    pub uploaded_by: Uuid,
    pub storage_key: String,
    pub image_url: String,
    pub mime_type: String,
    pub width: i32,
    pub height: i32,
    pub file_size: i64,
    pub is_profile_picture: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl AnimalImage {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn stored_object(&self) -> StoredObject {
        StoredObject {
            identifier: self.storage_key.clone(),
            url: self.image_url.clone(),
            content_type: self.mime_type.clone(),
            size_bytes: self.file_size.max(0) as u64,
        }
    }
}
