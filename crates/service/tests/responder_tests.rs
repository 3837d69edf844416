mod common;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use common::{memory_storage, MockStore};
use std::sync::Arc;
use updraft_core::{ContentHash, UpdateProtocol, UpdateStatus};
use updraft_metadata::models::{NewUpdate, NewUpdateAsset};
use updraft_metadata::{AssetRepo, ProjectRepo, UpdateRepo};
use updraft_service::{CodePushService, ExpoService, ServiceError};
use uuid::Uuid;

async fn seed_update(store: &MockStore, protocol: UpdateProtocol) -> (Uuid, Uuid) {
    let project = store
        .create_project(Uuid::now_v7(), "test", protocol)
        .await
        .unwrap()
        .id;
    let update = Uuid::now_v7();
    store
        .create_update(
            &NewUpdate {
                id: update,
                project_id: project,
                runtime_version: "1.0.0".to_string(),
                channel: "production".to_string(),
                message: Some("release notes".to_string()),
            },
            None,
        )
        .await
        .unwrap();
    store
        .set_update_status(update, UpdateStatus::Published)
        .await
        .unwrap();
    (project, update)
}

fn asset(
    update_id: Uuid,
    path: &str,
    sha256: &str,
    is_launch: bool,
    is_archive: bool,
) -> NewUpdateAsset {
    NewUpdateAsset {
        id: Uuid::now_v7(),
        update_id,
        storage_object_path: path.to_string(),
        content_type: if is_archive {
            "application/zip".to_string()
        } else if is_launch {
            "application/javascript".to_string()
        } else {
            "image/png".to_string()
        },
        extension: if is_archive {
            ".zip".to_string()
        } else if is_launch {
            ".jsbundle".to_string()
        } else {
            ".png".to_string()
        },
        content_md5: "0123456789abcdef0123456789abcdef".to_string(),
        content_sha256: sha256.to_string(),
        is_launch_asset: is_launch,
        is_archive,
        platform: "ios".to_string(),
        content_length: 2048,
    }
}

fn sha_hex(data: &[u8]) -> String {
    ContentHash::compute(data).to_hex()
}

#[tokio::test]
async fn builds_manifest_with_signed_urls_and_base64url_hashes() {
    let store = Arc::new(MockStore::new());
    let (_, storage) = memory_storage();
    let expo = ExpoService::new(store.clone(), storage);

    let (project, update_id) = seed_update(&store, UpdateProtocol::Expo).await;
    let bundle_sha = sha_hex(b"bundle");
    let icon_sha = sha_hex(b"icon");
    store
        .insert_assets(&[
            asset(
                update_id,
                &format!("{project}/{update_id}/ios/main.jsbundle"),
                &bundle_sha,
                true,
                false,
            ),
            asset(
                update_id,
                &format!("{project}/{update_id}/ios/assets/icon.png"),
                &icon_sha,
                false,
                false,
            ),
        ])
        .await
        .unwrap();

    let update = store.get_update(project, update_id).await.unwrap().unwrap();
    let manifest = expo.update_manifest(&update, "ios").await.unwrap();

    assert_eq!(manifest.id, update_id.to_string());
    assert_eq!(manifest.runtime_version, "1.0.0");
    assert_eq!(manifest.assets.len(), 1);
    assert!(manifest.launch_asset.url.starts_with("memory://"));
    assert!(manifest.launch_asset.url.contains("method=GET"));
    assert_eq!(manifest.launch_asset.key, "0123456789abcdef0123456789abcdef");
    assert_eq!(manifest.launch_asset.file_extension, ".jsbundle");

    // hash = base64url(hex-decode(sha256)), and it decodes back.
    let decoded = URL_SAFE_NO_PAD
        .decode(manifest.launch_asset.hash.as_bytes())
        .unwrap();
    let rehexed: String = decoded.iter().map(|b| format!("{b:02x}")).collect();
    assert_eq!(rehexed, bundle_sha);

    // RFC3339 UTC timestamp.
    assert!(manifest.created_at.ends_with('Z'));
}

#[tokio::test]
async fn manifest_requires_assets_and_a_launch_asset() {
    let store = Arc::new(MockStore::new());
    let (_, storage) = memory_storage();
    let expo = ExpoService::new(store.clone(), storage);

    let (project, update_id) = seed_update(&store, UpdateProtocol::Expo).await;
    let update = store.get_update(project, update_id).await.unwrap().unwrap();

    let err = expo.update_manifest(&update, "ios").await.unwrap_err();
    assert!(matches!(err, ServiceError::NoAssets(_)));

    store
        .insert_assets(&[asset(
            update_id,
            &format!("{project}/{update_id}/ios/assets/icon.png"),
            &sha_hex(b"icon"),
            false,
            false,
        )])
        .await
        .unwrap();
    let err = expo.update_manifest(&update, "ios").await.unwrap_err();
    assert!(matches!(err, ServiceError::LaunchAssetMissing(_)));
}

#[tokio::test]
async fn codepush_response_prefers_archive_download() {
    let store = Arc::new(MockStore::new());
    let (_, storage) = memory_storage();
    let codepush = CodePushService::new(store.clone(), storage);

    let (project, update_id) = seed_update(&store, UpdateProtocol::Codepush).await;
    let bundle_sha = sha_hex(b"bundle");
    let archive_sha = sha_hex(b"archive");
    store
        .insert_assets(&[
            asset(
                update_id,
                &format!("{project}/{update_id}/ios/main.jsbundle"),
                &bundle_sha,
                true,
                false,
            ),
            asset(
                update_id,
                &format!("{project}/archives/{update_id}/ios.zip"),
                &archive_sha,
                false,
                true,
            ),
        ])
        .await
        .unwrap();

    let update = store.get_update(project, update_id).await.unwrap().unwrap();
    let info = codepush.update_to_install(&update, "ios").await.unwrap();

    assert!(info.is_available);
    assert!(info.is_mandatory);
    assert!(!info.should_run_binary_version);
    assert!(!info.update_app_version);
    assert_eq!(info.package_hash, archive_sha);
    assert_eq!(info.label, update_id.to_string());
    assert_eq!(info.app_version, "1.0.0");
    assert_eq!(info.target_binary_range, "1.0.0");
    assert_eq!(info.description, "release notes");
    assert_eq!(info.package_size, 2048);
    assert!(info
        .download_url
        .contains(&format!("archives/{update_id}/ios.zip")));
}

#[tokio::test]
async fn codepush_response_falls_back_to_launch_bundle() {
    let store = Arc::new(MockStore::new());
    let (_, storage) = memory_storage();
    let codepush = CodePushService::new(store.clone(), storage);

    let (project, update_id) = seed_update(&store, UpdateProtocol::Codepush).await;
    let bundle_sha = sha_hex(b"bundle");
    store
        .insert_assets(&[asset(
            update_id,
            &format!("{project}/{update_id}/ios/main.jsbundle"),
            &bundle_sha,
            true,
            false,
        )])
        .await
        .unwrap();

    let update = store.get_update(project, update_id).await.unwrap().unwrap();
    let info = codepush.update_to_install(&update, "ios").await.unwrap();
    assert_eq!(info.package_hash, bundle_sha);
    assert!(info.download_url.contains("main.jsbundle"));
}

#[tokio::test]
async fn codepush_response_requires_a_downloadable_asset() {
    let store = Arc::new(MockStore::new());
    let (_, storage) = memory_storage();
    let codepush = CodePushService::new(store.clone(), storage);

    let (project, update_id) = seed_update(&store, UpdateProtocol::Codepush).await;
    let update = store.get_update(project, update_id).await.unwrap().unwrap();

    let err = codepush.update_to_install(&update, "ios").await.unwrap_err();
    assert!(matches!(err, ServiceError::LaunchAssetMissing(_)));
}
