use shelter_core::AppError;

/// Media codec errors
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The input is not a decodable image. Client error; do not retry.
    #[error("Unsupported or malformed image: {0}")]
    Decode(String),

    /// Resizing or re-encoding failed. Fatal for the request.
    #[error("Failed to encode image: {0}")]
    Encode(String),
}

impl From<CodecError> for AppError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Decode(msg) => AppError::Decode(msg),
            CodecError::Encode(msg) => AppError::Internal(format!("Image encoding failed: {}", msg)),
        }
    }
}
