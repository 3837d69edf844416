//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::time::Duration;

/// A boxed stream of bytes for streaming reads.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// HTTP method a signed URL authorizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UrlMethod {
    Get,
    Put,
}

impl UrlMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(Self::Get),
            "PUT" => Some(Self::Put),
            _ => None,
        }
    }
}

/// Options for minting a signed URL.
#[derive(Clone, Debug)]
pub struct SignedUrlOptions {
    pub method: UrlMethod,
    pub expiry: Duration,
    /// Content type the URL is bound to (upload URLs only).
    pub content_type: Option<String>,
}

/// Metadata about a stored object.
#[derive(Clone, Debug)]
pub struct ObjectMeta {
    /// Object size in bytes.
    pub size: u64,
    /// Content type recorded at write time (if available).
    pub content_type: Option<String>,
    /// MD5 of the content (if the backend can provide it).
    pub md5: Option<Vec<u8>>,
}

/// Object store abstraction shared by the local and external providers.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Get an object's metadata without fetching content.
    async fn head(&self, key: &str) -> StorageResult<ObjectMeta>;

    /// Get an object's full content.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Get an object as a byte stream.
    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream>;

    /// Put an object atomically.
    async fn put(&self, key: &str, data: Bytes, content_type: Option<&str>) -> StorageResult<()>;

    /// Mint a signed URL for direct client access to an object.
    async fn signed_url(&self, key: &str, opts: &SignedUrlOptions) -> StorageResult<String>;

    /// Verify backend connectivity.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }

    /// Static identifier for logging.
    fn backend_name(&self) -> &'static str;
}
