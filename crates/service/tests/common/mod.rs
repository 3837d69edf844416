//! Shared in-memory test doubles for the service crate.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use md5::{Digest, Md5};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use time::OffsetDateTime;
use updraft_core::config::StorageProvider;
use updraft_core::{UpdateProtocol, UpdateStatus};
use updraft_metadata::models::{
    NewUpdate, NewUpdateAsset, ProjectRow, UpdateAssetRow, UpdateListFilter, UpdateRow,
    UpdateToInstallRow, UpdateWithProtocolRow,
};
use updraft_metadata::{AssetRepo, MetadataError, MetadataResult, MetadataStore, ProjectRepo, UpdateRepo};
use updraft_queue::{QueueError, QueueResult};
use updraft_service::UpdateQueue;
use updraft_storage::{
    ByteStream, ObjectMeta, ObjectStore, SignedUrlOptions, Storage, StorageError, StorageResult,
};
use uuid::Uuid;

// ===== metadata store =====

#[derive(Default)]
struct StoreInner {
    projects: Vec<ProjectRow>,
    updates: Vec<UpdateRow>,
    assets: Vec<UpdateAssetRow>,
    app_configs: Vec<(Uuid, serde_json::Value)>,
    ticks: i64,
}

/// In-memory `MetadataStore` with the same observable behavior as the
/// SQL queries the services run.
#[derive(Default)]
pub struct MockStore {
    inner: Mutex<StoreInner>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn app_configs(&self) -> Vec<(Uuid, serde_json::Value)> {
        self.lock().app_configs.clone()
    }

    pub fn asset_count(&self, update_id: Uuid) -> usize {
        self.lock()
            .assets
            .iter()
            .filter(|a| a.update_id == update_id)
            .count()
    }

    pub fn status_of(&self, update_id: Uuid) -> Option<String> {
        self.lock()
            .updates
            .iter()
            .find(|u| u.id == update_id)
            .map(|u| u.status.clone())
    }
}

#[async_trait]
impl ProjectRepo for MockStore {
    async fn create_project(
        &self,
        id: Uuid,
        name: &str,
        update_protocol: UpdateProtocol,
    ) -> MetadataResult<ProjectRow> {
        let row = ProjectRow {
            id,
            name: name.to_string(),
            update_protocol: update_protocol.as_str().to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        self.lock().projects.push(row.clone());
        Ok(row)
    }

    async fn get_project(&self, id: Uuid) -> MetadataResult<Option<ProjectRow>> {
        Ok(self.lock().projects.iter().find(|p| p.id == id).cloned())
    }
}

#[async_trait]
impl UpdateRepo for MockStore {
    async fn create_update(
        &self,
        update: &NewUpdate,
        expo_app_config: Option<&serde_json::Value>,
    ) -> MetadataResult<()> {
        let mut inner = self.lock();
        inner.ticks += 1;
        let created_at = OffsetDateTime::from_unix_timestamp(1_700_000_000 + inner.ticks)
            .map_err(|e| MetadataError::Internal(e.to_string()))?;
        inner.updates.push(UpdateRow {
            id: update.id,
            project_id: update.project_id,
            runtime_version: update.runtime_version.clone(),
            channel: update.channel.clone(),
            message: update.message.clone(),
            status: UpdateStatus::Empty.as_str().to_string(),
            created_at,
        });
        if let Some(config) = expo_app_config {
            inner.app_configs.push((update.id, config.clone()));
        }
        Ok(())
    }

    async fn set_update_status(
        &self,
        update_id: Uuid,
        status: UpdateStatus,
    ) -> MetadataResult<UpdateRow> {
        let mut inner = self.lock();
        let row = inner
            .updates
            .iter_mut()
            .find(|u| u.id == update_id)
            .ok_or_else(|| MetadataError::NotFound(format!("update {update_id}")))?;
        row.status = status.as_str().to_string();
        Ok(row.clone())
    }

    async fn get_update(
        &self,
        project_id: Uuid,
        update_id: Uuid,
    ) -> MetadataResult<Option<UpdateRow>> {
        Ok(self
            .lock()
            .updates
            .iter()
            .find(|u| u.id == update_id && u.project_id == project_id)
            .cloned())
    }

    async fn get_update_with_protocol(
        &self,
        update_id: Uuid,
    ) -> MetadataResult<Option<UpdateWithProtocolRow>> {
        let inner = self.lock();
        let Some(update) = inner.updates.iter().find(|u| u.id == update_id).cloned() else {
            return Ok(None);
        };
        let protocol = inner
            .projects
            .iter()
            .find(|p| p.id == update.project_id)
            .map(|p| p.update_protocol.clone())
            .ok_or_else(|| MetadataError::NotFound(format!("project {}", update.project_id)))?;
        Ok(Some(UpdateWithProtocolRow {
            update,
            update_protocol: protocol,
        }))
    }

    async fn list_updates(
        &self,
        project_id: Uuid,
        filter: &UpdateListFilter,
        limit: i64,
    ) -> MetadataResult<Vec<UpdateRow>> {
        let inner = self.lock();
        let mut rows: Vec<_> = inner
            .updates
            .iter()
            .filter(|u| u.project_id == project_id)
            .filter(|u| filter.status.as_deref().is_none_or(|s| u.status == s))
            .filter(|u| {
                filter
                    .runtime_version
                    .as_deref()
                    .is_none_or(|v| u.runtime_version == v)
            })
            .filter(|u| filter.channel.as_deref().is_none_or(|c| u.channel == c))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn latest_published_and_canceled(
        &self,
        project_id: Uuid,
        runtime_version: &str,
        channel: &str,
        platform: &str,
    ) -> MetadataResult<Vec<UpdateToInstallRow>> {
        let inner = self.lock();
        let mut rows = Vec::new();
        for status in [UpdateStatus::Published, UpdateStatus::Canceled] {
            let latest = inner
                .updates
                .iter()
                .filter(|u| {
                    u.project_id == project_id
                        && u.runtime_version == runtime_version
                        && u.channel == channel
                        && u.status == status.as_str()
                })
                .max_by_key(|u| u.created_at);
            if let Some(update) = latest {
                let content_sha256 = inner
                    .assets
                    .iter()
                    .filter(|a| {
                        a.update_id == update.id
                            && a.platform == platform
                            && (a.is_archive || a.is_launch_asset)
                    })
                    .max_by_key(|a| a.is_archive)
                    .map(|a| a.content_sha256.clone());
                rows.push(UpdateToInstallRow {
                    update: update.clone(),
                    content_sha256,
                });
            }
        }
        Ok(rows)
    }
}

#[async_trait]
impl AssetRepo for MockStore {
    async fn insert_assets(&self, assets: &[NewUpdateAsset]) -> MetadataResult<u64> {
        let mut inner = self.lock();
        for asset in assets {
            let row = UpdateAssetRow {
                id: asset.id,
                update_id: asset.update_id,
                storage_object_path: asset.storage_object_path.clone(),
                content_type: asset.content_type.clone(),
                extension: asset.extension.clone(),
                content_md5: asset.content_md5.clone(),
                content_sha256: asset.content_sha256.clone(),
                is_launch_asset: asset.is_launch_asset,
                is_archive: asset.is_archive,
                platform: asset.platform.clone(),
                content_length: asset.content_length,
                created_at: OffsetDateTime::now_utc(),
            };
            if let Some(existing) = inner.assets.iter_mut().find(|a| {
                a.update_id == asset.update_id
                    && a.storage_object_path == asset.storage_object_path
            }) {
                *existing = row;
            } else {
                inner.assets.push(row);
            }
        }
        Ok(assets.len() as u64)
    }

    async fn assets_by_platform(
        &self,
        update_id: Uuid,
        platform: &str,
    ) -> MetadataResult<Vec<UpdateAssetRow>> {
        Ok(self
            .lock()
            .assets
            .iter()
            .filter(|a| a.update_id == update_id && a.platform == platform)
            .cloned()
            .collect())
    }

    async fn launch_asset_or_archive(
        &self,
        update_id: Uuid,
        platform: &str,
    ) -> MetadataResult<Option<UpdateAssetRow>> {
        Ok(self
            .lock()
            .assets
            .iter()
            .filter(|a| {
                a.update_id == update_id
                    && a.platform == platform
                    && (a.is_archive || a.is_launch_asset)
            })
            .max_by_key(|a| a.is_archive)
            .cloned())
    }
}

#[async_trait]
impl MetadataStore for MockStore {
    async fn migrate(&self) -> MetadataResult<()> {
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        Ok(())
    }
}

// ===== object store =====

/// In-memory `ObjectStore`. Signed URLs are fake but deterministic.
#[derive(Default)]
pub struct MemoryBackend {
    objects: Mutex<HashMap<String, (Bytes, Option<String>)>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }
}

#[async_trait]
impl ObjectStore for MemoryBackend {
    async fn head(&self, key: &str) -> StorageResult<ObjectMeta> {
        let objects = self.objects.lock().unwrap_or_else(PoisonError::into_inner);
        let (data, content_type) = objects
            .get(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        let mut md5 = Md5::new();
        md5.update(data);
        Ok(ObjectMeta {
            size: data.len() as u64,
            content_type: content_type.clone(),
            md5: Some(md5.finalize().to_vec()),
        })
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let objects = self.objects.lock().unwrap_or_else(PoisonError::into_inner);
        objects
            .get(key)
            .map(|(data, _)| data.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream> {
        let data = self.get(key).await?;
        Ok(Box::pin(futures::stream::iter([Ok::<_, StorageError>(data)])))
    }

    async fn put(&self, key: &str, data: Bytes, content_type: Option<&str>) -> StorageResult<()> {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), (data, content_type.map(str::to_string)));
        Ok(())
    }

    async fn signed_url(&self, key: &str, opts: &SignedUrlOptions) -> StorageResult<String> {
        Ok(format!("memory://{key}?method={}", opts.method.as_str()))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Storage facade over a fresh in-memory backend.
pub fn memory_storage() -> (Arc<MemoryBackend>, Storage) {
    let backend = Arc::new(MemoryBackend::new());
    let storage = Storage::with_store(StorageProvider::Local, backend.clone(), None);
    (backend, storage)
}

// ===== queue =====

/// `UpdateQueue` double that records published update ids.
#[derive(Default)]
pub struct MockQueue {
    published: Mutex<Vec<Uuid>>,
    fail: bool,
}

impl MockQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn published(&self) -> Vec<Uuid> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl UpdateQueue for MockQueue {
    async fn publish_process_update(&self, update_id: Uuid) -> QueueResult<()> {
        if self.fail {
            return Err(QueueError::Publish("queue unavailable".to_string()));
        }
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(update_id);
        Ok(())
    }
}
