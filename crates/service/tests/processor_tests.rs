mod common;

use bytes::Bytes;
use common::{memory_storage, MemoryBackend, MockStore};
use std::sync::Arc;
use std::time::Duration;
use updraft_cache::{Cache, MemoryCache};
use updraft_core::object_key::{archive_object_key, asset_object_key};
use updraft_core::package_hash::archive_package_hash;
use updraft_core::{Platform, UpdateProtocol, UpdateStatus};
use updraft_metadata::models::NewUpdate;
use updraft_metadata::{AssetRepo, ProjectRepo, UpdateRepo};
use updraft_service::{Processor, ServiceError};
use updraft_storage::Storage;
use uuid::Uuid;

struct Harness {
    store: Arc<MockStore>,
    backend: Arc<MemoryBackend>,
    storage: Storage,
    cache: Arc<MemoryCache>,
    processor: Processor,
}

fn harness() -> Harness {
    let store = Arc::new(MockStore::new());
    let (backend, storage) = memory_storage();
    let cache = Arc::new(MemoryCache::new());
    let processor = Processor::new(store.clone(), storage.clone(), cache.clone());
    Harness {
        store,
        backend,
        storage,
        cache,
        processor,
    }
}

async fn seed_project(h: &Harness, protocol: UpdateProtocol) -> Uuid {
    h.store
        .create_project(Uuid::now_v7(), "test", protocol)
        .await
        .unwrap()
        .id
}

async fn seed_update(h: &Harness, project_id: Uuid, status: UpdateStatus) -> Uuid {
    let id = Uuid::now_v7();
    h.store
        .create_update(
            &NewUpdate {
                id,
                project_id,
                runtime_version: "1.0.0".to_string(),
                channel: "production".to_string(),
                message: None,
            },
            None,
        )
        .await
        .unwrap();
    if status != UpdateStatus::Empty {
        h.store.set_update_status(id, status).await.unwrap();
    }
    id
}

async fn put_object(h: &Harness, project: Uuid, update: Uuid, path: &str, data: &[u8]) {
    h.storage
        .put(
            &asset_object_key(project, update, path),
            Bytes::copy_from_slice(data),
            None,
        )
        .await
        .unwrap();
}

const ANDROID_ONLY_METADATA: &str = r#"{
    "version": 0,
    "bundler": "metro",
    "fileMetadata": {
        "android": {
            "bundle": "bundles/index.android.bundle",
            "assets": [{"path": "android/assets/icon.png", "ext": ".png"}]
        }
    }
}"#;

const IOS_CODEPUSH_METADATA: &str = r#"{
    "version": 0,
    "bundler": "metro",
    "fileMetadata": {
        "ios": {
            "bundle": "ios/main.jsbundle",
            "assets": [
                {"path": "ios/assets/icon.png", "ext": ".png"},
                {"path": "ios/assets/font.ttf", "ext": ".ttf"}
            ]
        },
        "android": {
            "bundle": "android/index.android.bundle",
            "assets": []
        }
    }
}"#;

async fn seed_android_upload(h: &Harness, project: Uuid, update: Uuid) {
    put_object(h, project, update, "metadata.json", ANDROID_ONLY_METADATA.as_bytes()).await;
    put_object(h, project, update, "bundles/index.android.bundle", b"bundle bytes").await;
    put_object(h, project, update, "android/assets/icon.png", b"png bytes").await;
}

async fn seed_ios_codepush_upload(h: &Harness, project: Uuid, update: Uuid) {
    put_object(h, project, update, "metadata.json", IOS_CODEPUSH_METADATA.as_bytes()).await;
    put_object(h, project, update, "ios/main.jsbundle", b"ios bundle").await;
    put_object(h, project, update, "ios/assets/icon.png", b"icon").await;
    put_object(h, project, update, "ios/assets/font.ttf", b"font").await;
    put_object(h, project, update, "android/index.android.bundle", b"android bundle").await;
}

#[tokio::test]
async fn publishes_expo_update_after_ingestion() {
    let h = harness();
    let project = seed_project(&h, UpdateProtocol::Expo).await;
    let update = seed_update(&h, project, UpdateStatus::Pending).await;
    seed_android_upload(&h, project, update).await;

    h.processor.process_update(update).await.unwrap();

    assert_eq!(
        h.store.status_of(update).as_deref(),
        Some(UpdateStatus::Published.as_str())
    );

    let assets = h.store.assets_by_platform(update, "android").await.unwrap();
    assert_eq!(assets.len(), 2);

    let launch: Vec<_> = assets.iter().filter(|a| a.is_launch_asset).collect();
    assert_eq!(launch.len(), 1);
    assert_eq!(launch[0].content_type, "application/javascript");
    assert_eq!(launch[0].extension, ".bundle");
    assert_eq!(launch[0].content_length, b"bundle bytes".len() as i64);
    assert_eq!(launch[0].content_sha256.len(), 64);
    assert_eq!(launch[0].content_md5.len(), 32);

    let regular: Vec<_> = assets
        .iter()
        .filter(|a| !a.is_launch_asset && !a.is_archive)
        .collect();
    assert_eq!(regular.len(), 1);
    assert_eq!(regular[0].content_type, "image/png");
    assert_eq!(regular[0].extension, ".png");

    // Expo projects never get archives.
    assert!(assets.iter().all(|a| !a.is_archive));
}

#[tokio::test]
async fn builds_codepush_archive_per_platform_with_assets() {
    let h = harness();
    let project = seed_project(&h, UpdateProtocol::Codepush).await;
    let update = seed_update(&h, project, UpdateStatus::Pending).await;
    seed_ios_codepush_upload(&h, project, update).await;

    h.processor.process_update(update).await.unwrap();

    // ios has assets: bundle + 2 assets + archive.
    let ios_assets = h.store.assets_by_platform(update, "ios").await.unwrap();
    assert_eq!(ios_assets.len(), 4);
    let archive = ios_assets
        .iter()
        .find(|a| a.is_archive)
        .expect("ios archive row");
    assert_eq!(archive.content_type, "application/zip");
    assert_eq!(archive.extension, ".zip");
    assert!(!archive.is_launch_asset);
    assert_eq!(archive.content_md5.len(), 32);

    // android has an empty asset list: no archive.
    let android_assets = h.store.assets_by_platform(update, "android").await.unwrap();
    assert_eq!(android_assets.len(), 1);
    assert!(android_assets.iter().all(|a| !a.is_archive));

    // The package hash covers the platform-prefixed path tails of the
    // archived assets, sorted, independent of zip bytes.
    let expected_hash = archive_package_hash(
        ios_assets
            .iter()
            .filter(|a| !a.is_archive)
            .map(|a| {
                let tail = a
                    .storage_object_path
                    .splitn(3, '/')
                    .nth(2)
                    .unwrap()
                    .to_string();
                (tail, a.content_sha256.clone())
            }),
    )
    .unwrap();
    assert_eq!(archive.content_sha256, expected_hash);

    // The stored zip mirrors the build layout with the platform prefix
    // stripped, and includes the launch bundle.
    let archive_key = archive_object_key(project, update, Platform::Ios);
    assert!(h.backend.contains(&archive_key));
    let zip_bytes = h.storage.get(&archive_key).await.unwrap();
    let mut zip = zip::ZipArchive::new(std::io::Cursor::new(zip_bytes.to_vec())).unwrap();
    assert_eq!(zip.len(), 3);
    assert!(zip.by_name("main.jsbundle").is_ok());
    assert!(zip.by_name("assets/icon.png").is_ok());
    assert!(zip.by_name("assets/font.ttf").is_ok());
}

#[tokio::test]
async fn squelches_redelivery_after_status_advanced() {
    let h = harness();
    let project = seed_project(&h, UpdateProtocol::Expo).await;
    for status in [
        UpdateStatus::Processing,
        UpdateStatus::Published,
        UpdateStatus::Failed,
        UpdateStatus::Canceled,
    ] {
        let update = seed_update(&h, project, status).await;
        let err = h.processor.process_update(update).await.unwrap_err();
        assert!(
            matches!(err, ServiceError::UpdateNotPending),
            "status {status:?}"
        );
    }
}

#[tokio::test]
async fn retries_when_commit_status_write_has_not_landed() {
    let h = harness();
    let project = seed_project(&h, UpdateProtocol::Expo).await;
    let update = seed_update(&h, project, UpdateStatus::Empty).await;

    let err = h.processor.process_update(update).await.unwrap_err();
    assert!(matches!(err, ServiceError::UpdateNotReady));
    // The status is untouched; the API will flip it to pending.
    assert_eq!(
        h.store.status_of(update).as_deref(),
        Some(UpdateStatus::Empty.as_str())
    );
}

#[tokio::test]
async fn persists_parsed_assets_before_failing_on_partial_errors() {
    let h = harness();
    let project = seed_project(&h, UpdateProtocol::Expo).await;
    let update = seed_update(&h, project, UpdateStatus::Pending).await;

    // Bundle uploaded, referenced asset missing.
    put_object(&h, project, update, "metadata.json", ANDROID_ONLY_METADATA.as_bytes()).await;
    put_object(&h, project, update, "bundles/index.android.bundle", b"bundle bytes").await;

    let err = h.processor.process_update(update).await.unwrap_err();
    assert!(matches!(err, ServiceError::AssetProcessing(_)));

    // The bundle row survived so the retry only re-reads blobs.
    let assets = h.store.assets_by_platform(update, "android").await.unwrap();
    assert_eq!(assets.len(), 1);
    assert!(assets[0].is_launch_asset);

    // The status is left at processing; the delivery loop resets it to
    // pending before the NAK.
    assert_eq!(
        h.store.status_of(update).as_deref(),
        Some(UpdateStatus::Processing.as_str())
    );

    // Upload the missing asset and retry the full cycle.
    put_object(&h, project, update, "android/assets/icon.png", b"png").await;
    h.store
        .set_update_status(update, UpdateStatus::Pending)
        .await
        .unwrap();
    h.processor.process_update(update).await.unwrap();
    assert_eq!(
        h.store.status_of(update).as_deref(),
        Some(UpdateStatus::Published.as_str())
    );
    assert_eq!(h.store.asset_count(update), 2);
}

#[tokio::test]
async fn reprocessing_does_not_duplicate_asset_rows() {
    let h = harness();
    let project = seed_project(&h, UpdateProtocol::Codepush).await;
    let update = seed_update(&h, project, UpdateStatus::Pending).await;
    seed_ios_codepush_upload(&h, project, update).await;

    h.processor.process_update(update).await.unwrap();
    let first_count = h.store.asset_count(update);

    // A duplicate delivery raced the first one and the status check let
    // it through after a manual requeue.
    h.store
        .set_update_status(update, UpdateStatus::Pending)
        .await
        .unwrap();
    h.processor.process_update(update).await.unwrap();

    assert_eq!(h.store.asset_count(update), first_count);
}

#[tokio::test]
async fn missing_metadata_json_is_a_retryable_failure() {
    let h = harness();
    let project = seed_project(&h, UpdateProtocol::Expo).await;
    let update = seed_update(&h, project, UpdateStatus::Pending).await;

    let err = h.processor.process_update(update).await.unwrap_err();
    assert!(matches!(err, ServiceError::Storage(_)));
}

#[tokio::test]
async fn dead_letter_marks_update_failed() {
    let h = harness();
    let project = seed_project(&h, UpdateProtocol::Expo).await;
    let update = seed_update(&h, project, UpdateStatus::Pending).await;

    let payload = serde_json::json!({ "update_id": update }).to_string();
    h.processor.handle_dead_letter(payload.as_bytes()).await;

    assert_eq!(
        h.store.status_of(update).as_deref(),
        Some(UpdateStatus::Failed.as_str())
    );
}

#[tokio::test]
async fn publish_invalidates_cached_resolutions() {
    let h = harness();
    let project = seed_project(&h, UpdateProtocol::Expo).await;
    let update = seed_update(&h, project, UpdateStatus::Pending).await;
    seed_android_upload(&h, project, update).await;

    let key = format!("pt:update:{project}:production:1.0.0:android:none");
    h.cache
        .set(&key, "stale", Duration::from_secs(600))
        .await
        .unwrap();

    h.processor.process_update(update).await.unwrap();
    assert_eq!(h.cache.get(&key).await.unwrap(), None);
}
