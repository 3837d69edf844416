//! Metadata store trait, composed from per-entity repositories.

use crate::error::MetadataResult;
use crate::models::{
    NewUpdate, NewUpdateAsset, ProjectRow, UpdateAssetRow, UpdateListFilter, UpdateRow,
    UpdateToInstallRow, UpdateWithProtocolRow,
};
use async_trait::async_trait;
use updraft_core::{UpdateProtocol, UpdateStatus};
use uuid::Uuid;

/// Project persistence.
#[async_trait]
pub trait ProjectRepo: Send + Sync {
    async fn create_project(
        &self,
        id: Uuid,
        name: &str,
        update_protocol: UpdateProtocol,
    ) -> MetadataResult<ProjectRow>;

    async fn get_project(&self, id: Uuid) -> MetadataResult<Option<ProjectRow>>;
}

/// Update persistence and resolution queries.
#[async_trait]
pub trait UpdateRepo: Send + Sync {
    /// Insert a new update (status `empty`) and, when supplied, its Expo
    /// app config in one transaction.
    async fn create_update(
        &self,
        update: &NewUpdate,
        expo_app_config: Option<&serde_json::Value>,
    ) -> MetadataResult<()>;

    /// Set an update's status, returning the updated row.
    async fn set_update_status(
        &self,
        update_id: Uuid,
        status: UpdateStatus,
    ) -> MetadataResult<UpdateRow>;

    /// Fetch an update scoped to its project.
    async fn get_update(
        &self,
        project_id: Uuid,
        update_id: Uuid,
    ) -> MetadataResult<Option<UpdateRow>>;

    /// Fetch an update joined to its project's protocol.
    async fn get_update_with_protocol(
        &self,
        update_id: Uuid,
    ) -> MetadataResult<Option<UpdateWithProtocolRow>>;

    /// Last `limit` updates of a project, newest first.
    async fn list_updates(
        &self,
        project_id: Uuid,
        filter: &UpdateListFilter,
        limit: i64,
    ) -> MetadataResult<Vec<UpdateRow>>;

    /// The most recent `published` and the most recent `canceled` update
    /// matching the scope, each joined to the content hash of its
    /// archive-preferred asset for `platform`. At most one row per
    /// status.
    async fn latest_published_and_canceled(
        &self,
        project_id: Uuid,
        runtime_version: &str,
        channel: &str,
        platform: &str,
    ) -> MetadataResult<Vec<UpdateToInstallRow>>;
}

/// Update asset persistence.
#[async_trait]
pub trait AssetRepo: Send + Sync {
    /// Bulk insert ingested assets. Re-ingestion of the same object path
    /// refreshes the stored hashes instead of duplicating the row.
    async fn insert_assets(&self, assets: &[NewUpdateAsset]) -> MetadataResult<u64>;

    /// All assets of an update for one platform.
    async fn assets_by_platform(
        &self,
        update_id: Uuid,
        platform: &str,
    ) -> MetadataResult<Vec<UpdateAssetRow>>;

    /// The asset a device downloads: the archive when one exists,
    /// otherwise the launch bundle.
    async fn launch_asset_or_archive(
        &self,
        update_id: Uuid,
        platform: &str,
    ) -> MetadataResult<Option<UpdateAssetRow>>;
}

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore: ProjectRepo + UpdateRepo + AssetRepo + Send + Sync {
    /// Apply the embedded schema.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity.
    async fn health_check(&self) -> MetadataResult<()>;
}
