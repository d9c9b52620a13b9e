use crate::error::{Result, TidegateError};
use crate::lock::RedisLocks;
use crate::traits::cache::Cache;
use async_trait::async_trait;
use std::time::Duration;

/// Redis session backend
///
/// Lets several proxy instances share sessions. Pair it with
/// [`RedisCache::locks`] so refreshes are coordinated on the same server.
#[derive(Clone)]
pub struct RedisCache {
    client: redis::Client,
    default_ttl: Duration,
}

impl RedisCache {
    /// Create a new Redis backend from a connection URL
    pub fn new(url: &str, default_ttl: Duration) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| TidegateError::store(format!("Failed to create Redis client: {}", e)))?;

        Ok(Self {
            client,
            default_ttl,
        })
    }

    /// Lock provider sharing this backend's connection settings
    pub fn locks(&self) -> RedisLocks {
        RedisLocks::new(self.client.clone())
    }

    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| TidegateError::store(format!("Failed to get Redis connection: {}", e)))
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.get_connection().await?;

        redis::cmd("GET")
            .arg(key)
            .query_async::<Option<Vec<u8>>>(&mut conn)
            .await
            .map_err(|e| TidegateError::store(format!("Redis GET failed: {}", e)))
    }

    async fn set_bytes(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.get_connection().await?;
        let ttl_ms = ttl.unwrap_or(self.default_ttl).as_millis().max(1) as u64;

        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_ms)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| TidegateError::store(format!("Redis SET failed: {}", e)))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.get_connection().await?;

        redis::cmd("DEL")
            .arg(key)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| TidegateError::store(format!("Redis DEL failed: {}", e)))
    }

    fn is_healthy(&self) -> bool {
        // Best effort: a synchronous connect is the only check available here
        self.client.get_connection().is_ok()
    }
}
