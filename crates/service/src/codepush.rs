//! CodePush deployment keys and update-check responses.

use crate::error::{ServiceError, ServiceResult};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use updraft_core::Error as CoreError;
use updraft_metadata::models::UpdateRow;
use updraft_metadata::MetadataStore;
use updraft_storage::Storage;
use uuid::Uuid;

/// Parse a deployment key: a URL-encoded `projectId/platform/channel`
/// triple sent by CodePush clients.
pub fn parse_deployment_key(deployment_key: &str) -> updraft_core::Result<(Uuid, String, String)> {
    let decoded = percent_decode_str(deployment_key)
        .decode_utf8()
        .map_err(|e| CoreError::InvalidDeploymentKey(e.to_string()))?;

    let mut parts = decoded.splitn(3, '/');
    let (Some(project), Some(platform), Some(channel)) =
        (parts.next(), parts.next(), parts.next())
    else {
        return Err(CoreError::InvalidDeploymentKey(format!(
            "expected projectId/platform/channel, got: {decoded}"
        )));
    };

    let project_id = Uuid::parse_str(project)
        .map_err(|e| CoreError::InvalidDeploymentKey(format!("invalid project id: {e}")))?;
    Ok((project_id, platform.to_string(), channel.to_string()))
}

/// The `updateInfo` object of a CodePush update-check response.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodePushUpdate {
    #[serde(rename = "downloadURL")]
    pub download_url: String,
    pub description: String,
    pub is_available: bool,
    pub is_mandatory: bool,
    pub app_version: String,
    pub package_hash: String,
    pub label: String,
    pub package_size: i64,
    pub update_app_version: bool,
    pub should_run_binary_version: bool,
    pub target_binary_range: String,
}

impl CodePushUpdate {
    /// Response for a device that has nothing to install: run what the
    /// binary shipped with.
    pub fn not_available() -> Self {
        Self {
            download_url: String::new(),
            description: String::new(),
            is_available: false,
            is_mandatory: false,
            app_version: String::new(),
            package_hash: String::new(),
            label: String::new(),
            package_size: 0,
            update_app_version: false,
            should_run_binary_version: true,
            target_binary_range: String::new(),
        }
    }
}

/// Builds CodePush update-check responses.
#[derive(Clone)]
pub struct CodePushService {
    store: Arc<dyn MetadataStore>,
    storage: Storage,
}

impl CodePushService {
    pub fn new(store: Arc<dyn MetadataStore>, storage: Storage) -> Self {
        Self { store, storage }
    }

    /// Build the response for an update the resolver selected. The
    /// device downloads the per-platform archive when one exists,
    /// otherwise the launch bundle.
    pub async fn update_to_install(
        &self,
        update: &UpdateRow,
        platform: &str,
    ) -> ServiceResult<CodePushUpdate> {
        let asset = self
            .store
            .launch_asset_or_archive(update.id, platform)
            .await?
            .ok_or(ServiceError::LaunchAssetMissing(update.id))?;

        let download_url = self
            .storage
            .signed_download_url(&asset.storage_object_path)
            .await?;

        Ok(CodePushUpdate {
            download_url,
            description: update.message.clone().unwrap_or_default(),
            is_available: true,
            is_mandatory: true,
            app_version: update.runtime_version.clone(),
            package_hash: asset.content_sha256,
            label: update.id.to_string(),
            package_size: asset.content_length,
            update_app_version: false,
            should_run_binary_version: false,
            target_binary_range: update.runtime_version.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_deployment_key() {
        let project = Uuid::now_v7();
        let key = format!("{project}/ios/production");
        let (parsed, platform, channel) = parse_deployment_key(&key).unwrap();
        assert_eq!(parsed, project);
        assert_eq!(platform, "ios");
        assert_eq!(channel, "production");
    }

    #[test]
    fn parses_url_encoded_deployment_key() {
        let project = Uuid::now_v7();
        let key = format!("{project}%2Fandroid%2Fstaging");
        let (parsed, platform, channel) = parse_deployment_key(&key).unwrap();
        assert_eq!(parsed, project);
        assert_eq!(platform, "android");
        assert_eq!(channel, "staging");
    }

    #[test]
    fn rejects_malformed_deployment_keys() {
        assert!(parse_deployment_key("not-a-uuid/ios/production").is_err());
        assert!(parse_deployment_key("only/two").is_err());
        assert!(parse_deployment_key("").is_err());
    }

    #[test]
    fn channel_may_contain_slashes() {
        // splitn(3) leaves the remainder in the channel, like the
        // deployment key convention expects.
        let project = Uuid::now_v7();
        let key = format!("{project}/ios/release/candidate");
        let (_, _, channel) = parse_deployment_key(&key).unwrap();
        assert_eq!(channel, "release/candidate");
    }

    #[test]
    fn not_available_shape() {
        let resp = CodePushUpdate::not_available();
        assert!(!resp.is_available);
        assert!(resp.should_run_binary_version);
        assert!(resp.download_url.is_empty());

        let value = serde_json::to_value(&resp).unwrap();
        assert!(value.get("downloadURL").is_some());
        assert!(value.get("shouldRunBinaryVersion").is_some());
        assert!(value.get("isAvailable").is_some());
    }
}
