use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An animal record, the subject that owns images and one protocol document.
///
/// `image_url` mirrors the URL of the current profile picture. The document
/// payload itself is never loaded into this struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Animal {
    pub id: Uuid,
    pub name: String,
    pub image_url: Option<String>,
    pub protocol_document_key: Option<String>,
    pub protocol_document_url: Option<String>,
    pub protocol_document_mime: Option<String>,
    pub protocol_document_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Animal {
    pub fn has_protocol_document(&self) -> bool {
        self.protocol_document_key.is_some()
    }
}
