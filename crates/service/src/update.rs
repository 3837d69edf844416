//! Transactional update lifecycle operations and the resolution query.

use crate::error::{ServiceError, ServiceResult};
use crate::expo::resolution_cache_prefix;
use async_trait::async_trait;
use std::sync::Arc;
use updraft_cache::Cache;
use updraft_core::{PrepareUpdateRequest, UpdateStatus, UploadUrl, DEFAULT_CHANNEL};
use updraft_metadata::models::{
    NewUpdate, UpdateListFilter, UpdateRow, UpdateToInstallRow,
};
use updraft_metadata::MetadataStore;
use updraft_queue::QueueResult;
use updraft_storage::Storage;
use uuid::Uuid;

/// The slice of the work queue the update service publishes to.
#[async_trait]
pub trait UpdateQueue: Send + Sync {
    async fn publish_process_update(&self, update_id: Uuid) -> QueueResult<()>;
}

#[async_trait]
impl UpdateQueue for updraft_queue::Connection {
    async fn publish_process_update(&self, update_id: Uuid) -> QueueResult<()> {
        updraft_queue::Connection::publish_process_update(self, update_id).await
    }
}

/// What the device reports as currently installed: Expo supplies the
/// update id, CodePush the package hash.
#[derive(Clone, Debug, Default)]
pub struct CurrentUpdateFilter {
    pub id: Option<Uuid>,
    pub sha256: Option<String>,
}

/// Update lifecycle operations shared by the API and the worker.
#[derive(Clone)]
pub struct UpdateService {
    store: Arc<dyn MetadataStore>,
    storage: Storage,
    queue: Arc<dyn UpdateQueue>,
    cache: Arc<dyn Cache>,
}

impl UpdateService {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        storage: Storage,
        queue: Arc<dyn UpdateQueue>,
        cache: Arc<dyn Cache>,
    ) -> Self {
        Self {
            store,
            storage,
            queue,
            cache,
        }
    }

    /// Reserve an update id and mint one signed upload URL per object.
    ///
    /// URL minting is pure computation, so it happens before the insert;
    /// a minting failure leaves no row behind, and an insert failure
    /// leaves only unusable URLs.
    pub async fn prepare_update(
        &self,
        project_id: Uuid,
        request: PrepareUpdateRequest,
    ) -> ServiceResult<(Uuid, Vec<UploadUrl>)> {
        let update_id = Uuid::now_v7();
        let upload_urls = self
            .storage
            .upload_urls(project_id, update_id, &request.file_metadata)
            .await?;

        let update = NewUpdate {
            id: update_id,
            project_id,
            runtime_version: request.runtime_version,
            channel: request
                .channel
                .unwrap_or_else(|| DEFAULT_CHANNEL.to_string()),
            message: request.message,
        };
        self.store
            .create_update(&update, request.expo_app_config.as_ref())
            .await?;

        tracing::info!(update_id = %update_id, "update prepared");
        Ok((update_id, upload_urls))
    }

    /// Hand the update to the worker: enqueue the processing message,
    /// then flip the status to `pending`.
    ///
    /// Publish comes first so a crash between the two steps cannot leave
    /// a pending update without a message; the worker retries deliveries
    /// that arrive before the status write.
    pub async fn commit_update(&self, update_id: Uuid) -> ServiceResult<()> {
        self.queue.publish_process_update(update_id).await?;
        self.store
            .set_update_status(update_id, UpdateStatus::Pending)
            .await
            .map_err(map_not_found)?;
        tracing::info!(update_id = %update_id, "update committed to processing queue");
        Ok(())
    }

    /// Roll a published update back, signaling devices to revert to the
    /// embedded build.
    pub async fn rollback_update(&self, project_id: Uuid, update_id: Uuid) -> ServiceResult<()> {
        let update = self
            .update_by_id(project_id, update_id)
            .await?
            .ok_or(ServiceError::UpdateNotFound)?;

        if update.status != UpdateStatus::Published.as_str() {
            tracing::debug!(
                update_id = %update_id,
                status = %update.status,
                "tried to rollback non-published update"
            );
            return Err(ServiceError::UpdateNotPublished);
        }

        self.store
            .set_update_status(update_id, UpdateStatus::Canceled)
            .await
            .map_err(map_not_found)?;

        // Cached resolution responses for this project are stale now.
        if let Err(e) = self
            .cache
            .delete_prefix(&resolution_cache_prefix(project_id))
            .await
        {
            tracing::error!(error = %e, "failed to invalidate resolution cache");
        }
        Ok(())
    }

    pub async fn update_by_id(
        &self,
        project_id: Uuid,
        update_id: Uuid,
    ) -> ServiceResult<Option<UpdateRow>> {
        Ok(self.store.get_update(project_id, update_id).await?)
    }

    /// Last 10 updates of a project, newest first.
    pub async fn find_updates(
        &self,
        project_id: Uuid,
        filter: &UpdateListFilter,
    ) -> ServiceResult<Vec<UpdateRow>> {
        Ok(self.store.list_updates(project_id, filter, 10).await?)
    }

    /// Decide what a device should install, if anything.
    ///
    /// The query returns at most the newest `published` and the newest
    /// `canceled` update for the scope. A published update wins whenever
    /// the device doesn't already run it; a canceled update is only
    /// returned to the device that runs it, as a rollback instruction.
    pub async fn update_to_install(
        &self,
        project_id: Uuid,
        runtime_version: &str,
        channel: &str,
        platform: &str,
        current: &CurrentUpdateFilter,
    ) -> ServiceResult<Option<UpdateToInstallRow>> {
        let rows = self
            .store
            .latest_published_and_canceled(project_id, runtime_version, channel, platform)
            .await?;

        let is_current = |row: &UpdateToInstallRow| {
            let id_matches = current.id.is_some_and(|id| id == row.update.id);
            let sha_matches = match (&current.sha256, &row.content_sha256) {
                (Some(filter_sha), Some(row_sha)) => filter_sha == row_sha,
                _ => false,
            };
            id_matches || sha_matches
        };

        let published = rows
            .iter()
            .find(|r| r.update.status == UpdateStatus::Published.as_str());
        let canceled = rows
            .iter()
            .find(|r| r.update.status == UpdateStatus::Canceled.as_str());

        match (published, canceled) {
            // A published update exists: install it unless the device
            // already runs it. A newer canceled update never shadows it.
            (Some(p), _) => {
                if is_current(p) {
                    Ok(None)
                } else {
                    Ok(Some(p.clone()))
                }
            }
            // Only a canceled update: the device running it rolls back
            // to the embedded build; everyone else has nothing to do.
            (None, Some(c)) => {
                if is_current(c) {
                    Ok(Some(c.clone()))
                } else {
                    Ok(None)
                }
            }
            (None, None) => Ok(None),
        }
    }
}

fn map_not_found(err: updraft_metadata::MetadataError) -> ServiceError {
    match err {
        updraft_metadata::MetadataError::NotFound(_) => ServiceError::UpdateNotFound,
        other => ServiceError::Metadata(other),
    }
}
