//! Storage error types.

use thiserror::Error;

/// Errors produced by storage backends and the facade.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("invalid URL signature: {0}")]
    InvalidSignature(String),

    #[error("signed URL expired")]
    UrlExpired,

    #[error("max update size is 100MB")]
    UpdateTooLarge,

    #[error("operation not supported by this provider: {0}")]
    Unsupported(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("s3 error: {0}")]
    S3(String),

    #[error("storage error: {0}")]
    Internal(String),
}

/// Result type alias for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
