//! Database models mapping to the metadata schema.
//!
//! Enum-typed columns travel as their text form; the core crate owns the
//! parsed representations.

use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// A project owning updates for one mobile application.
#[derive(Debug, Clone, FromRow)]
pub struct ProjectRow {
    pub id: Uuid,
    pub name: String,
    pub update_protocol: String,
    pub created_at: OffsetDateTime,
}

/// One update of a project.
#[derive(Debug, Clone, FromRow)]
pub struct UpdateRow {
    pub id: Uuid,
    pub project_id: Uuid,
    pub runtime_version: String,
    pub channel: String,
    pub message: Option<String>,
    pub status: String,
    pub created_at: OffsetDateTime,
}

/// Insert parameters for a new update. Status always starts at `empty`.
#[derive(Debug, Clone)]
pub struct NewUpdate {
    pub id: Uuid,
    pub project_id: Uuid,
    pub runtime_version: String,
    pub channel: String,
    pub message: Option<String>,
}

/// An update joined to its project's device protocol.
#[derive(Debug, Clone, FromRow)]
pub struct UpdateWithProtocolRow {
    #[sqlx(flatten)]
    pub update: UpdateRow,
    pub update_protocol: String,
}

/// One ingested asset of an update.
#[derive(Debug, Clone, FromRow)]
pub struct UpdateAssetRow {
    pub id: Uuid,
    pub update_id: Uuid,
    pub storage_object_path: String,
    pub content_type: String,
    pub extension: String,
    pub content_md5: String,
    pub content_sha256: String,
    pub is_launch_asset: bool,
    pub is_archive: bool,
    pub platform: String,
    pub content_length: i64,
    pub created_at: OffsetDateTime,
}

/// Insert parameters for an ingested asset.
#[derive(Debug, Clone)]
pub struct NewUpdateAsset {
    pub id: Uuid,
    pub update_id: Uuid,
    pub storage_object_path: String,
    pub content_type: String,
    pub extension: String,
    pub content_md5: String,
    pub content_sha256: String,
    pub is_launch_asset: bool,
    pub is_archive: bool,
    pub platform: String,
    pub content_length: i64,
}

/// Resolution query row: an update plus the content hash of its
/// archive-preferred asset for the requested platform.
#[derive(Debug, Clone, FromRow)]
pub struct UpdateToInstallRow {
    #[sqlx(flatten)]
    pub update: UpdateRow,
    pub content_sha256: Option<String>,
}

/// Optional filters for listing a project's updates.
#[derive(Debug, Clone, Default)]
pub struct UpdateListFilter {
    pub status: Option<String>,
    pub runtime_version: Option<String>,
    pub channel: Option<String>,
}
