//! Metadata store error types.

use thiserror::Error;

/// Errors produced by the metadata store.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("metadata error: {0}")]
    Internal(String),
}

/// Result type alias for metadata operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;
