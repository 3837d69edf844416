//! Redis cache driver.

use crate::{Cache, CacheError, CacheResult};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

/// Cache backed by a Redis server.
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    /// Connect to Redis from a connection URL.
    pub async fn connect(url: &str) -> CacheResult<Self> {
        let client =
            redis::Client::open(url).map_err(|e| CacheError::Connect(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::Connect(e.to_string()))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(key)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs())
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))
    }

    async fn delete_prefix(&self, prefix: &str) -> CacheResult<()> {
        use futures::StreamExt;

        let pattern = format!("{}*", prefix.replace('*', "\\*").replace('?', "\\?"));
        let mut scan_conn = self.conn.clone();
        let keys: Vec<String> = {
            let mut iter = scan_conn
                .scan_match::<_, String>(&pattern)
                .await
                .map_err(|e| CacheError::Backend(e.to_string()))?;
            let mut keys = Vec::new();
            while let Some(key) = iter.next().await {
                keys.push(key);
            }
            keys
        };

        if !keys.is_empty() {
            let mut conn = self.conn.clone();
            conn.del::<_, ()>(keys)
                .await
                .map_err(|e| CacheError::Backend(e.to_string()))?;
        }
        Ok(())
    }
}
