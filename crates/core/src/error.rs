//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid runtime version: {0}")]
    InvalidRuntimeVersion(String),

    #[error("invalid asset path: {0}")]
    InvalidAssetPath(String),

    #[error("invalid asset extension: {0}")]
    InvalidAssetExtension(String),

    #[error("invalid object key: {0}")]
    InvalidObjectKey(String),

    #[error("invalid bundle metadata: {0}")]
    InvalidBundleMetadata(String),

    #[error("invalid deployment key: {0}")]
    InvalidDeploymentKey(String),

    #[error("invalid hash: {0}")]
    InvalidHash(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
