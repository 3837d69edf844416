//! Storage facade: upload policy, object keys and signed URL minting.

use crate::backends::{FilesystemBackend, S3Backend};
use crate::error::{StorageError, StorageResult};
use crate::signer::{ensure_secret_key_file, UrlSigner};
use crate::traits::{ByteStream, ObjectMeta, ObjectStore, SignedUrlOptions, UrlMethod};
use bytes::Bytes;
use std::sync::Arc;
use updraft_core::config::{StorageConfig, StorageProvider};
use updraft_core::object_key::{asset_object_key, clean_path};
use updraft_core::{StorageObject, UploadUrl};
use updraft_core::{DOWNLOAD_URL_EXPIRY, MAX_UPDATE_TOTAL_SIZE, UPLOAD_URL_EXPIRY};
use url::Url;
use uuid::Uuid;

/// Facade over the configured blob backend.
///
/// Owns the upload policy: total-size cap, key construction from client
/// paths, and the upload/download URL expiries.
#[derive(Clone)]
pub struct Storage {
    provider: StorageProvider,
    store: Arc<dyn ObjectStore>,
    signer: Option<Arc<UrlSigner>>,
}

impl Storage {
    /// Initialize the provider selected by configuration.
    pub async fn from_config(config: &StorageConfig) -> StorageResult<Self> {
        config
            .validate()
            .map_err(|e| StorageError::Internal(e.to_string()))?;

        match config.provider() {
            StorageProvider::External => {
                let driver_url = config.driver_url.as_deref().unwrap_or_default();
                let backend = S3Backend::from_driver_url(driver_url).await?;
                tracing::info!("initialized external storage");
                Ok(Self {
                    provider: StorageProvider::External,
                    store: Arc::new(backend),
                    signer: None,
                })
            }
            StorageProvider::Local => {
                // validate() guarantees both are present for the local provider.
                let secret_key_path = config.secret_key_path.as_deref().ok_or_else(|| {
                    StorageError::Internal("missing secret_key_path".to_string())
                })?;
                let api_public_url = config.api_public_url.as_deref().ok_or_else(|| {
                    StorageError::Internal("missing api_public_url".to_string())
                })?;

                ensure_secret_key_file(secret_key_path)?;
                let signer = Arc::new(UrlSigner::new(api_public_url, secret_key_path)?);
                let backend =
                    FilesystemBackend::new(&config.local_path, signer.clone()).await?;
                tracing::info!(path = %config.local_path, "initialized local storage");
                Ok(Self {
                    provider: StorageProvider::Local,
                    store: Arc::new(backend),
                    signer: Some(signer),
                })
            }
        }
    }

    /// Build a facade over an explicit backend. Used by tests and by
    /// anything that already owns a configured store.
    pub fn with_store(
        provider: StorageProvider,
        store: Arc<dyn ObjectStore>,
        signer: Option<Arc<UrlSigner>>,
    ) -> Self {
        Self {
            provider,
            store,
            signer,
        }
    }

    pub fn provider(&self) -> StorageProvider {
        self.provider
    }

    /// Mint one PUT URL per object, after checking the update size cap.
    pub async fn upload_urls(
        &self,
        project_id: Uuid,
        update_id: Uuid,
        objects: &[StorageObject],
    ) -> StorageResult<Vec<UploadUrl>> {
        let total: u64 = objects.iter().map(|o| o.content_length).sum();
        if total > MAX_UPDATE_TOTAL_SIZE {
            return Err(StorageError::UpdateTooLarge);
        }

        let mut urls = Vec::with_capacity(objects.len());
        for object in objects {
            let key = asset_object_key(project_id, update_id, &clean_path(&object.path));
            tracing::info!(
                object = %key,
                content_type = %object.content_type,
                "creating signed url for upload"
            );
            let url = self
                .store
                .signed_url(
                    &key,
                    &SignedUrlOptions {
                        method: UrlMethod::Put,
                        expiry: UPLOAD_URL_EXPIRY,
                        content_type: Some(object.content_type.clone()),
                    },
                )
                .await?;
            urls.push(UploadUrl {
                path: object.path.clone(),
                url,
            });
        }
        Ok(urls)
    }

    /// Mint a GET URL for a stored object.
    pub async fn signed_download_url(&self, key: &str) -> StorageResult<String> {
        self.store
            .signed_url(
                key,
                &SignedUrlOptions {
                    method: UrlMethod::Get,
                    expiry: DOWNLOAD_URL_EXPIRY,
                    content_type: None,
                },
            )
            .await
    }

    /// Recover and verify the object key of a signed `/assets` URL.
    /// Local provider only.
    pub fn object_key_from_url(&self, url: &Url, method: UrlMethod) -> StorageResult<String> {
        match &self.signer {
            Some(signer) => signer.key_from_url(url, method),
            None => Err(StorageError::Unsupported(
                "signed asset URLs are only served by the local provider".to_string(),
            )),
        }
    }

    pub async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.store.get(key).await
    }

    pub async fn get_stream(&self, key: &str) -> StorageResult<ByteStream> {
        self.store.get_stream(key).await
    }

    pub async fn head(&self, key: &str) -> StorageResult<ObjectMeta> {
        self.store.head(key).await
    }

    pub async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> StorageResult<()> {
        self.store.put(key, data, content_type).await
    }

    pub async fn health_check(&self) -> StorageResult<()> {
        self.store.health_check().await
    }
}
