//! Expo manifest and directive responses.

use crate::error::{ServiceError, ServiceResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::OffsetDateTime;
use updraft_core::ContentHash;
use updraft_metadata::models::UpdateRow;
use updraft_metadata::MetadataStore;
use updraft_storage::Storage;
use uuid::Uuid;

/// Multipart part name for a manifest response.
pub const PART_MANIFEST: &str = "manifest";

/// Multipart part name for a directive response.
pub const PART_DIRECTIVE: &str = "directive";

/// One asset of an Expo manifest.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestAsset {
    /// SHA-256 of the content, unpadded base64url.
    pub hash: String,
    /// Client-side cache key; the content MD5.
    pub key: String,
    pub file_extension: String,
    pub content_type: String,
    /// Signed download URL.
    pub url: String,
}

/// An Expo update manifest.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub id: String,
    pub created_at: String,
    pub runtime_version: String,
    pub assets: Vec<ManifestAsset>,
    pub launch_asset: ManifestAsset,
}

/// An Expo device response: one multipart part, either a manifest or a
/// directive. Serializable so the resolution cache can store it whole.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpoUpdateResponse {
    pub part_name: String,
    pub payload: serde_json::Value,
}

impl ExpoUpdateResponse {
    pub fn manifest(manifest: &Manifest) -> ServiceResult<Self> {
        Ok(Self {
            part_name: PART_MANIFEST.to_string(),
            payload: serde_json::to_value(manifest)
                .map_err(|e| updraft_core::Error::Serialization(e.to_string()))?,
        })
    }

    /// Directive telling the device to revert to the embedded build.
    pub fn roll_back_to_embedded(now: OffsetDateTime) -> Self {
        Self {
            part_name: PART_DIRECTIVE.to_string(),
            payload: serde_json::json!({
                "type": "rollBackToEmbedded",
                "parameters": { "commitTime": commit_time(now) },
            }),
        }
    }

    pub fn no_update_available() -> Self {
        Self {
            part_name: PART_DIRECTIVE.to_string(),
            payload: serde_json::json!({ "type": "noUpdateAvailable" }),
        }
    }
}

/// Render the rollback commit time: UTC, one fractional digit.
fn commit_time(now: OffsetDateTime) -> String {
    let format = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:1]Z"
    );
    now.to_offset(time::UtcOffset::UTC)
        .format(&format)
        .unwrap_or_else(|_| String::new())
}

/// Cache key for one resolution query.
pub fn resolution_cache_key(
    project_id: Uuid,
    channel: &str,
    runtime_version: &str,
    platform: &str,
    current_update_id: Option<Uuid>,
) -> String {
    let current = current_update_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "none".to_string());
    format!("pt:update:{project_id}:{channel}:{runtime_version}:{platform}:{current}")
        .to_lowercase()
}

/// Key prefix covering every cached resolution response of a project.
pub fn resolution_cache_prefix(project_id: Uuid) -> String {
    format!("pt:update:{project_id}:").to_lowercase()
}

/// Builds Expo manifests for published updates.
#[derive(Clone)]
pub struct ExpoService {
    store: Arc<dyn MetadataStore>,
    storage: Storage,
}

impl ExpoService {
    pub fn new(store: Arc<dyn MetadataStore>, storage: Storage) -> Self {
        Self { store, storage }
    }

    /// Build the manifest for one update and platform. Every asset gets
    /// a signed download URL; exactly one launch asset must exist.
    pub async fn update_manifest(
        &self,
        update: &UpdateRow,
        platform: &str,
    ) -> ServiceResult<Manifest> {
        let update_assets = self
            .store
            .assets_by_platform(update.id, platform)
            .await?;
        if update_assets.is_empty() {
            return Err(ServiceError::NoAssets(update.id));
        }

        let mut launch_asset = None;
        let mut assets = Vec::new();
        for asset in update_assets.iter().filter(|a| !a.is_archive) {
            let hash = ContentHash::from_hex(&asset.content_sha256)?.to_base64url();
            let url = self
                .storage
                .signed_download_url(&asset.storage_object_path)
                .await?;

            let manifest_asset = ManifestAsset {
                hash,
                key: asset.content_md5.clone(),
                file_extension: asset.extension.clone(),
                content_type: asset.content_type.clone(),
                url,
            };
            if asset.is_launch_asset {
                launch_asset = Some(manifest_asset);
            } else {
                assets.push(manifest_asset);
            }
        }

        let launch_asset =
            launch_asset.ok_or(ServiceError::LaunchAssetMissing(update.id))?;

        Ok(Manifest {
            id: update.id.to_string(),
            created_at: update
                .created_at
                .to_offset(time::UtcOffset::UTC)
                .format(&Rfc3339)
                .unwrap_or_else(|_| String::new()),
            runtime_version: update.runtime_version.clone(),
            assets,
            launch_asset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn commit_time_uses_utc_with_one_fractional_digit() {
        let now = datetime!(2024-03-05 17:42:09.35 UTC);
        assert_eq!(commit_time(now), "2024-03-05T17:42:09.3Z");
    }

    #[test]
    fn cache_key_is_lowercased_and_scoped() {
        let project = Uuid::nil();
        let key = resolution_cache_key(project, "Production", "1.0.0", "IOS", None);
        assert_eq!(
            key,
            format!("pt:update:{project}:production:1.0.0:ios:none")
        );
        assert!(key.starts_with(&resolution_cache_prefix(project)));
    }

    #[test]
    fn cache_key_includes_current_update() {
        let project = Uuid::nil();
        let current = Uuid::now_v7();
        let key = resolution_cache_key(project, "production", "1.0.0", "ios", Some(current));
        assert!(key.ends_with(&current.to_string().to_lowercase()));
    }

    #[test]
    fn directive_payload_shapes() {
        let rollback = ExpoUpdateResponse::roll_back_to_embedded(datetime!(2024-01-01 00:00:00 UTC));
        assert_eq!(rollback.part_name, PART_DIRECTIVE);
        assert_eq!(rollback.payload["type"], "rollBackToEmbedded");
        assert_eq!(
            rollback.payload["parameters"]["commitTime"],
            "2024-01-01T00:00:00.0Z"
        );

        let noop = ExpoUpdateResponse::no_update_available();
        assert_eq!(noop.part_name, PART_DIRECTIVE);
        assert_eq!(noop.payload["type"], "noUpdateAvailable");
    }

    #[test]
    fn manifest_serializes_camel_case() {
        let asset = ManifestAsset {
            hash: "aGFzaA".to_string(),
            key: "md5".to_string(),
            file_extension: ".bundle".to_string(),
            content_type: "application/javascript".to_string(),
            url: "http://example.com/asset".to_string(),
        };
        let manifest = Manifest {
            id: Uuid::nil().to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
            runtime_version: "1.0.0".to_string(),
            assets: vec![],
            launch_asset: asset,
        };
        let value = serde_json::to_value(&manifest).unwrap();
        assert!(value.get("runtimeVersion").is_some());
        assert!(value.get("launchAsset").is_some());
        assert!(value["launchAsset"].get("fileExtension").is_some());
        assert!(value["launchAsset"].get("contentType").is_some());
    }
}
