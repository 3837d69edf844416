//! String-keyed key/value cache with TTL.
//!
//! Two drivers behind one trait: an in-process TTL map and Redis.
//! Cache failures must never fail a request; callers log and move on.

pub mod memory;
pub mod redis_driver;

pub use memory::MemoryCache;
pub use redis_driver::RedisCache;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use updraft_core::config::{CacheConfig, CacheDriver};

/// Errors produced by cache drivers.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    Connect(String),

    #[error("cache error: {0}")]
    Backend(String),
}

/// Result type alias for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// A string-keyed key/value store with per-entry TTL.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Look up a key. Missing and expired entries return `None`.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Store a value that expires after `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    /// Remove a key.
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Remove every key starting with `prefix`. Used to invalidate
    /// cached resolution responses on state transitions.
    async fn delete_prefix(&self, prefix: &str) -> CacheResult<()>;
}

/// Build the cache driver selected by configuration.
pub async fn from_config(config: &CacheConfig) -> CacheResult<Arc<dyn Cache>> {
    match config.driver {
        CacheDriver::Memory => {
            tracing::info!("initializing in-memory cache");
            Ok(Arc::new(MemoryCache::new()))
        }
        CacheDriver::Redis => {
            tracing::info!("initializing redis cache");
            let url = config
                .redis_url
                .as_deref()
                .ok_or_else(|| CacheError::Connect("cache.redis_url is not set".to_string()))?;
            Ok(Arc::new(RedisCache::connect(url).await?))
        }
    }
}
