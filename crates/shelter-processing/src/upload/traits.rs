use async_trait::async_trait;
use shelter_core::AppError;

/// Payload ready to be handed to a storage backend, plus whatever the
/// processor learned about it.
#[derive(Clone, Debug)]
pub struct ProcessedUpload<M> {
    pub data: Vec<u8>,
    pub content_type: String,
    pub metadata: M,
}

impl<M> ProcessedUpload<M> {
    pub fn size_bytes(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Turns an uploaded payload into the bytes that get stored.
#[async_trait]
pub trait UploadProcessor: Send + Sync {
    type Metadata: Send;

    async fn process(
        &self,
        data: Vec<u8>,
        content_type: String,
    ) -> Result<ProcessedUpload<Self::Metadata>, AppError>;
}
