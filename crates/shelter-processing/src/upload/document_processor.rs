//! Document upload processor. Documents are stored exactly as uploaded.

use async_trait::async_trait;
use shelter_core::AppError;

use crate::upload::traits::{ProcessedUpload, UploadProcessor};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadDocumentMetadata {
    pub filename: Option<String>,
}

/// Document upload processor.
#[derive(Clone, Debug, Default)]
pub struct DocumentUploadProcessor {
    filename: Option<String>,
}

impl DocumentUploadProcessor {
    pub fn new() -> Self {
        Self { filename: None }
    }

    pub fn with_filename(filename: impl Into<String>) -> Self {
        Self {
            filename: Some(filename.into()),
        }
    }
}

#[async_trait]
impl UploadProcessor for DocumentUploadProcessor {
    type Metadata = UploadDocumentMetadata;

    async fn process(
        &self,
        data: Vec<u8>,
        content_type: String,
    ) -> Result<ProcessedUpload<UploadDocumentMetadata>, AppError> {
        if data.is_empty() {
            return Err(AppError::Validation("Document is empty".to_string()));
        }
        Ok(ProcessedUpload {
            data,
            content_type,
            metadata: UploadDocumentMetadata {
                filename: self.filename.clone(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_document_bytes_pass_through_unchanged() {
        let payload = b"%PDF-1.4 protocol".to_vec();
        let out = DocumentUploadProcessor::with_filename("protocol.pdf")
            .process(payload.clone(), "application/pdf".to_string())
            .await
            .unwrap();
        assert_eq!(out.data, payload);
        assert_eq!(out.content_type, "application/pdf");
        assert_eq!(out.metadata.filename.as_deref(), Some("protocol.pdf"));
        assert_eq!(out.size_bytes(), payload.len() as u64);
    }

    #[tokio::test]
    async fn test_empty_document_rejected() {
        let err = DocumentUploadProcessor::new()
            .process(Vec::new(), "application/pdf".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
