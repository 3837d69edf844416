//! Local filesystem storage backend.
//!
//! Signed URLs for this backend come from the shared [`UrlSigner`] and
//! resolve to the API process's `/assets` endpoints.

use crate::error::{StorageError, StorageResult};
use crate::signer::UrlSigner;
use crate::traits::{ByteStream, ObjectMeta, ObjectStore, SignedUrlOptions};
use async_trait::async_trait;
use bytes::Bytes;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use uuid::Uuid;

/// Chunk size for streaming reads (64 KiB).
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Suffix of the attribute sidecar written next to each object.
const ATTRS_SUFFIX: &str = ".attrs";

/// Attributes stored alongside each object.
#[derive(Debug, Serialize, Deserialize)]
struct SidecarAttrs {
    content_type: Option<String>,
    md5: String,
}

/// Filesystem-backed object store.
pub struct FilesystemBackend {
    root: PathBuf,
    signer: Arc<UrlSigner>,
}

impl FilesystemBackend {
    /// Create a new filesystem backend rooted at `root`.
    pub async fn new(root: impl AsRef<Path>, signer: Arc<UrlSigner>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root, signer })
    }

    /// Resolve a key to a path, rejecting anything that could escape the
    /// storage root.
    fn key_path(&self, key: &str) -> StorageResult<PathBuf> {
        if key.is_empty() || key.contains("..") || key.starts_with('/') || key.starts_with('\\') {
            return Err(StorageError::InvalidKey(format!(
                "path traversal not allowed: {key}"
            )));
        }
        for component in Path::new(key).components() {
            match component {
                std::path::Component::Normal(_) => {}
                _ => {
                    return Err(StorageError::InvalidKey(format!(
                        "contains unsafe path component: {key}"
                    )));
                }
            }
        }
        Ok(self.root.join(key))
    }

    fn attrs_path(path: &Path) -> PathBuf {
        let mut os = path.as_os_str().to_os_string();
        os.push(ATTRS_SUFFIX);
        PathBuf::from(os)
    }

    async fn ensure_parent(path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    async fn read_attrs(path: &Path) -> Option<SidecarAttrs> {
        let data = fs::read(Self::attrs_path(path)).await.ok()?;
        serde_json::from_slice(&data).ok()
    }
}

#[async_trait]
impl ObjectStore for FilesystemBackend {
    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn head(&self, key: &str) -> StorageResult<ObjectMeta> {
        let path = self.key_path(key)?;
        let metadata = fs::metadata(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(key.to_string())
            } else {
                StorageError::Io(e)
            }
        })?;

        let attrs = Self::read_attrs(&path).await;
        let md5 = attrs
            .as_ref()
            .and_then(|a| decode_hex(&a.md5));

        Ok(ObjectMeta {
            size: metadata.len(),
            content_type: attrs.and_then(|a| a.content_type),
            md5,
        })
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let path = self.key_path(key)?;
        let data = fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(key.to_string())
            } else {
                StorageError::Io(e)
            }
        })?;
        Ok(Bytes::from(data))
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream> {
        use tokio::io::AsyncReadExt;

        let path = self.key_path(key)?;
        let file = fs::File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(key.to_string())
            } else {
                StorageError::Io(e)
            }
        })?;

        let stream = async_stream::try_stream! {
            let mut file = file;
            let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
            loop {
                let n = file.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                yield Bytes::copy_from_slice(&buf[..n]);
            }
        };

        Ok(Box::pin(stream))
    }

    #[instrument(skip(self, data), fields(backend = "filesystem", size = data.len()))]
    async fn put(&self, key: &str, data: Bytes, content_type: Option<&str>) -> StorageResult<()> {
        let path = self.key_path(key)?;
        Self::ensure_parent(&path).await?;

        let md5 = {
            let mut hasher = Md5::new();
            hasher.update(&data);
            hasher
                .finalize()
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect::<String>()
        };

        // Temp file + rename keeps concurrent writers from exposing
        // partial objects.
        let temp_path = path.with_file_name(format!(".tmp.{}", Uuid::new_v4()));
        {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
        }
        fs::rename(&temp_path, &path).await?;

        let attrs = SidecarAttrs {
            content_type: content_type.map(str::to_string),
            md5,
        };
        let encoded = serde_json::to_vec(&attrs)
            .map_err(|e| StorageError::Internal(format!("attrs encoding: {e}")))?;
        fs::write(Self::attrs_path(&path), encoded).await?;

        Ok(())
    }

    async fn signed_url(&self, key: &str, opts: &SignedUrlOptions) -> StorageResult<String> {
        self.signer.signed_url(key, opts)
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn health_check(&self) -> StorageResult<()> {
        let metadata = fs::metadata(&self.root).await.map_err(|e| {
            StorageError::Io(std::io::Error::new(
                e.kind(),
                format!("storage root not accessible: {e}"),
            ))
        })?;
        if !metadata.is_dir() {
            return Err(StorageError::Internal(format!(
                "storage root is not a directory: {}",
                self.root.display()
            )));
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    s.as_bytes()
        .chunks(2)
        .map(|pair| {
            let hex = std::str::from_utf8(pair).ok()?;
            u8::from_str_radix(hex, 16).ok()
        })
        .collect()
}
