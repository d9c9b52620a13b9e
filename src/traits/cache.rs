//! Cache trait for key-value storage
//!
//! Backing storage for server-side sessions. Implementations must honor the
//! per-entry TTL so abandoned sessions age out on their own.

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Key-value storage with optional TTL
#[async_trait]
#[allow(async_fn_in_trait)] // async_trait macro handles Send/Sync bounds
pub trait Cache: Send + Sync {
    /// Get a value from the cache
    ///
    /// Returns `Ok(None)` if the key doesn't exist or has expired.
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Set a value in the cache with optional TTL
    ///
    /// If `ttl` is `None`, the backend's default TTL applies.
    async fn set_bytes(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    /// Delete a value from the cache
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if the cache backend is healthy
    fn is_healthy(&self) -> bool;
}
