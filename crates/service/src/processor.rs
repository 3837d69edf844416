//! The asset ingestion worker.
//!
//! Consumes process-update messages, drives the update state machine
//! `pending → processing → published`, hashes and indexes uploaded
//! objects, and builds CodePush per-platform archives. Redelivery and
//! dead-lettering are the queue's job; the `pending` status check is the
//! idempotency barrier against duplicate deliveries.

use crate::error::{ServiceError, ServiceResult};
use crate::expo::resolution_cache_prefix;
use bytes::Bytes;
use futures::StreamExt;
use md5::Md5;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use updraft_cache::Cache;
use updraft_core::object_key::{
    archive_object_key, asset_object_key, asset_object_key_segments, bundle_extension,
};
use updraft_core::{
    BundleMetadata, Platform, UpdateProtocol, UpdateStatus, PLATFORMS,
};
use updraft_metadata::models::{NewUpdateAsset, UpdateRow};
use updraft_metadata::MetadataStore;
use updraft_queue::connection::{Delivery, Disposition};
use updraft_queue::{Connection, ProcessUpdateMessage};
use updraft_storage::Storage;
use uuid::Uuid;

/// Delay before a failed delivery is offered again; the consumer's
/// backoff schedule takes over from there.
const NAK_DELAY: Duration = Duration::from_secs(5);

/// Object key tail of the bundle metadata document.
const METADATA_JSON: &str = "metadata.json";

/// How to settle a delivery and whether to push the status back first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct DeliveryPlan {
    disposition: Disposition,
    reset_to_pending: bool,
}

fn delivery_plan(result: &ServiceResult<()>) -> DeliveryPlan {
    match result {
        Ok(()) => DeliveryPlan {
            disposition: Disposition::Ack,
            reset_to_pending: false,
        },
        // Out-of-cycle redelivery after the status advanced past
        // pending; the work is already done or dead.
        Err(ServiceError::UpdateNotPending) => DeliveryPlan {
            disposition: Disposition::Term,
            reset_to_pending: false,
        },
        // The message beat the commit's status write; retry without
        // touching the status.
        Err(ServiceError::UpdateNotReady) => DeliveryPlan {
            disposition: Disposition::Retry(NAK_DELAY),
            reset_to_pending: false,
        },
        Err(_) => DeliveryPlan {
            disposition: Disposition::Retry(NAK_DELAY),
            reset_to_pending: true,
        },
    }
}

/// The worker-side update processor.
#[derive(Clone)]
pub struct Processor {
    store: Arc<dyn MetadataStore>,
    storage: Storage,
    cache: Arc<dyn Cache>,
}

impl Processor {
    pub fn new(store: Arc<dyn MetadataStore>, storage: Storage, cache: Arc<dyn Cache>) -> Self {
        Self {
            store,
            storage,
            cache,
        }
    }

    /// Consume deliveries and dead-letter advisories until the stream or
    /// the process ends. One message is in flight at a time.
    pub async fn run(&self, queue: &Connection) -> ServiceResult<()> {
        let dlq = {
            let this = self.clone();
            let queue = queue.clone();
            tokio::spawn(async move {
                let handler = |payload: Vec<u8>| {
                    let this = this.clone();
                    async move { this.handle_dead_letter(&payload).await }
                };
                if let Err(e) = queue.run_dlq_subscriber(handler).await {
                    tracing::error!(error = %e, "dlq subscriber stopped");
                }
            })
        };

        tracing::info!("worker started");
        let mut deliveries = queue.process_update_deliveries().await?;
        while let Some(delivery) = deliveries.next().await {
            match delivery {
                Ok(delivery) => self.handle_delivery(delivery).await,
                Err(e) => tracing::error!(error = %e, "failed to receive delivery"),
            }
        }

        dlq.abort();
        Ok(())
    }

    async fn handle_delivery(&self, delivery: Delivery) {
        let payload = match ProcessUpdateMessage::parse(delivery.payload()) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "failed to unmarshal payload");
                if let Err(e) = delivery.settle(Disposition::Term).await {
                    tracing::error!(error = %e, "failed to terminate message");
                }
                return;
            }
        };
        let update_id = payload.update_id;

        tracing::info!(update_id = %update_id, "processing update");
        let result = self.process_update(update_id).await;

        match &result {
            Ok(()) => tracing::info!(update_id = %update_id, "update processed successfully"),
            Err(ServiceError::UpdateNotPending) => {
                tracing::error!(update_id = %update_id, "update is not pending, dropping")
            }
            Err(ServiceError::UpdateNotReady) => {
                tracing::warn!(update_id = %update_id, "update not yet committed, retrying")
            }
            Err(e) => {
                tracing::error!(update_id = %update_id, error = %e, "failed to process update, retrying in a few sec")
            }
        }

        let plan = delivery_plan(&result);
        if plan.reset_to_pending {
            if let Err(e) = self
                .store
                .set_update_status(update_id, UpdateStatus::Pending)
                .await
            {
                tracing::error!(update_id = %update_id, error = %e, "failed to set update status back to pending");
            }
        }
        if let Err(e) = delivery.settle(plan.disposition).await {
            tracing::error!(update_id = %update_id, error = %e, "failed to settle message");
        }
    }

    /// Dead-letter handler: delivery attempts are exhausted, mark the
    /// update failed.
    pub async fn handle_dead_letter(&self, payload: &[u8]) {
        let payload = match ProcessUpdateMessage::parse(payload) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "failed to unmarshal dead-lettered payload");
                return;
            }
        };

        tracing::error!(update_id = %payload.update_id, "max retry attempts reached, dropping message");
        if let Err(e) = self
            .store
            .set_update_status(payload.update_id, UpdateStatus::Failed)
            .await
        {
            tracing::error!(update_id = %payload.update_id, error = %e, "failed to set update status to failed");
        }
    }

    /// Ingest one update end to end.
    pub async fn process_update(&self, update_id: Uuid) -> ServiceResult<()> {
        let with_protocol = self
            .store
            .get_update_with_protocol(update_id)
            .await?
            .ok_or(ServiceError::UpdateNotFound)?;

        match with_protocol.update.status.parse::<UpdateStatus>()? {
            UpdateStatus::Pending => {}
            UpdateStatus::Empty => return Err(ServiceError::UpdateNotReady),
            _ => return Err(ServiceError::UpdateNotPending),
        }
        let protocol: UpdateProtocol = with_protocol.update_protocol.parse()?;

        let update = self
            .store
            .set_update_status(update_id, UpdateStatus::Processing)
            .await?;
        tracing::info!(update_id = %update_id, project_id = %update.project_id, "set update status to processing");

        let metadata_key = asset_object_key(update.project_id, update.id, METADATA_JSON);
        let metadata_bytes = self.storage.get(&metadata_key).await?;
        let metadata = BundleMetadata::parse(&metadata_bytes)?;

        let (parsed_assets, parse_errors) = self.parse_assets(&update, &metadata).await;
        tracing::info!(
            update_id = %update_id,
            parsed = parsed_assets.len(),
            errors = parse_errors.len(),
            "processed files"
        );

        let saved = self.store.insert_assets(&parsed_assets).await?;
        tracing::info!(update_id = %update_id, saved, "saved parsed assets to db");

        // Persist what parsed, then fail so the queue retries the rest.
        if !parse_errors.is_empty() {
            return Err(ServiceError::AssetProcessing(parse_errors.join("; ")));
        }

        let mut archived_assets = Vec::new();
        for platform in PLATFORMS {
            let Some(files) = metadata.platform(platform) else {
                tracing::warn!(platform = %platform, "missing platform metadata, skipping");
                continue;
            };
            if protocol == UpdateProtocol::Codepush && !files.assets.is_empty() {
                archived_assets.push(self.archive_platform(&update, platform).await?);
            }
        }

        let saved = self.store.insert_assets(&archived_assets).await?;
        tracing::info!(update_id = %update_id, saved, "saved archive assets to db");

        self.store
            .set_update_status(update.id, UpdateStatus::Published)
            .await?;
        tracing::info!(update_id = %update_id, "set update status to published");

        // The project's cached resolution responses are stale now.
        if let Err(e) = self
            .cache
            .delete_prefix(&resolution_cache_prefix(update.project_id))
            .await
        {
            tracing::error!(error = %e, "failed to invalidate resolution cache");
        }

        Ok(())
    }

    /// Hash and index every file the bundle metadata names. Per-asset
    /// failures are collected so one broken object doesn't abandon the
    /// rest of the ingestion.
    async fn parse_assets(
        &self,
        update: &UpdateRow,
        metadata: &BundleMetadata,
    ) -> (Vec<NewUpdateAsset>, Vec<String>) {
        let mut parsed = Vec::new();
        let mut errors = Vec::new();

        for platform in PLATFORMS {
            let Some(files) = metadata.platform(platform) else {
                tracing::warn!(platform = %platform, "missing platform metadata, skipping");
                continue;
            };

            let bundle_spec = AssetSpec {
                extension: bundle_extension(&files.bundle),
                content_type: "application/javascript".to_string(),
                is_launch_asset: true,
                platform,
            };
            match self.parse_asset(update, &files.bundle, bundle_spec).await {
                Ok(asset) => {
                    tracing::info!(platform = %platform, "processed bundle");
                    parsed.push(asset);
                }
                Err(e) => {
                    errors.push(format!("failed to process bundle: {e}"));
                    continue;
                }
            }

            for entry in &files.assets {
                let spec = AssetSpec {
                    extension: entry.ext.clone(),
                    content_type: content_type_by_extension(&entry.ext),
                    is_launch_asset: false,
                    platform,
                };
                match self.parse_asset(update, &entry.path, spec).await {
                    Ok(asset) => {
                        tracing::info!(path = %entry.path, "processed asset");
                        parsed.push(asset);
                    }
                    Err(e) => errors.push(format!("failed to process asset: {e}")),
                }
            }
        }

        (parsed, errors)
    }

    /// Stream one uploaded object through SHA-256 and MD5 and produce
    /// its asset row.
    async fn parse_asset(
        &self,
        update: &UpdateRow,
        file_path: &str,
        spec: AssetSpec,
    ) -> ServiceResult<NewUpdateAsset> {
        let object_key = asset_object_key(update.project_id, update.id, file_path);
        let mut stream = self.storage.get_stream(&object_key).await?;

        let mut sha256 = Sha256::new();
        let mut md5 = Md5::new();
        let mut content_length = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            sha256.update(&chunk);
            md5.update(&chunk);
            content_length += chunk.len() as u64;
        }

        Ok(NewUpdateAsset {
            id: Uuid::now_v7(),
            update_id: update.id,
            storage_object_path: object_key,
            content_type: spec.content_type,
            extension: spec.extension,
            content_md5: to_hex(&md5.finalize()),
            content_sha256: to_hex(&sha256.finalize()),
            is_launch_asset: spec.is_launch_asset,
            is_archive: false,
            platform: spec.platform.as_str().to_string(),
            content_length: content_length as i64,
        })
    }

    /// Build the per-platform CodePush archive: a zip of the platform's
    /// ingested assets with the platform prefix stripped from entry
    /// names, stored under the archive key and indexed with the
    /// order-insensitive package hash.
    async fn archive_platform(
        &self,
        update: &UpdateRow,
        platform: Platform,
    ) -> ServiceResult<NewUpdateAsset> {
        let assets: Vec<_> = self
            .store
            .assets_by_platform(update.id, platform.as_str())
            .await?
            .into_iter()
            .filter(|asset| !asset.is_archive)
            .collect();
        if assets.is_empty() {
            return Err(ServiceError::NoAssets(update.id));
        }

        let platform_prefix = format!("{platform}/");
        let mut entries = Vec::with_capacity(assets.len());
        let mut hash_tokens = Vec::with_capacity(assets.len());
        for asset in &assets {
            let (_, _, tail) = asset_object_key_segments(&asset.storage_object_path)?;
            // Bundlers stage files under a platform folder; entry names
            // inside the archive match the original build layout.
            let path_in_zip = tail
                .strip_prefix(&platform_prefix)
                .unwrap_or(tail.as_str())
                .to_string();
            let data = self.storage.get(&asset.storage_object_path).await?;
            entries.push((path_in_zip, data));
            hash_tokens.push((tail, asset.content_sha256.clone()));
        }

        let archive_bytes = tokio::task::spawn_blocking(move || build_zip(entries))
            .await
            .map_err(|e| ServiceError::AssetProcessing(format!("archive task failed: {e}")))??;
        tracing::info!(platform = %platform, archived = assets.len(), "archived assets");

        let object_key = archive_object_key(update.project_id, update.id, platform);
        self.storage
            .put(&object_key, archive_bytes, Some("application/zip"))
            .await?;

        let attrs = self.storage.head(&object_key).await?;
        let content_sha256 = updraft_core::package_hash::archive_package_hash(
            hash_tokens.iter().map(|(path, sha)| (path.as_str(), sha.as_str())),
        )?;

        Ok(NewUpdateAsset {
            id: Uuid::now_v7(),
            update_id: update.id,
            storage_object_path: object_key,
            content_type: "application/zip".to_string(),
            extension: ".zip".to_string(),
            content_md5: attrs.md5.as_deref().map(to_hex).unwrap_or_default(),
            content_sha256,
            is_launch_asset: false,
            is_archive: true,
            platform: platform.as_str().to_string(),
            content_length: attrs.size as i64,
        })
    }
}

struct AssetSpec {
    extension: String,
    content_type: String,
    is_launch_asset: bool,
    platform: Platform,
}

fn build_zip(entries: Vec<(String, Bytes)>) -> ServiceResult<Bytes> {
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (path, data) in &entries {
        writer
            .start_file(path.as_str(), options)
            .map_err(|e| ServiceError::AssetProcessing(format!("failed to create file in zip: {e}")))?;
        writer
            .write_all(data)
            .map_err(|e| ServiceError::AssetProcessing(format!("failed to copy asset to zip: {e}")))?;
    }
    let cursor = writer
        .finish()
        .map_err(|e| ServiceError::AssetProcessing(format!("failed to close zip writer: {e}")))?;
    Ok(Bytes::from(cursor.into_inner()))
}

/// MIME type for an asset extension, empty when unknown.
fn content_type_by_extension(ext: &str) -> String {
    mime_guess::from_ext(ext.trim_start_matches('.'))
        .first_raw()
        .map(str::to_string)
        .unwrap_or_default()
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
