//! Service-level error types.

use thiserror::Error;
use uuid::Uuid;

/// Errors produced by the update lifecycle services and the processor.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("update not found")]
    UpdateNotFound,

    #[error("tried to rollback non-published update")]
    UpdateNotPublished,

    #[error("update is not pending")]
    UpdateNotPending,

    /// The processing message arrived before the commit's status write;
    /// retry until the update turns `pending`.
    #[error("update is not yet committed")]
    UpdateNotReady,

    #[error("no launch asset found for update {0}")]
    LaunchAssetMissing(Uuid),

    #[error("no assets found for update {0}")]
    NoAssets(Uuid),

    #[error("failed to parse some assets: {0}")]
    AssetProcessing(String),

    #[error(transparent)]
    Core(#[from] updraft_core::Error),

    #[error(transparent)]
    Storage(#[from] updraft_storage::StorageError),

    #[error(transparent)]
    Metadata(#[from] updraft_metadata::MetadataError),

    #[error(transparent)]
    Queue(#[from] updraft_queue::QueueError),
}

/// Result type alias for service operations.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
