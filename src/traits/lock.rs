//! Refresh lock traits
//!
//! A [`Lock`] is an exclusive lease over one session's refresh, identified by
//! the session's storage key. Backends shared between proxy instances make
//! the lease hold across processes.

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Exclusive, time-bounded lease
///
/// A lease expires on its own after the granted duration, so a holder that
/// crashes before [`Lock::release`] cannot block the key forever.
#[async_trait]
pub trait Lock: Send + Sync {
    /// Take the lease for `expiration`
    ///
    /// Fails with [`TidegateError::LockNotObtained`] while any unexpired lease
    /// exists for the key.
    ///
    /// [`TidegateError::LockNotObtained`]: crate::TidegateError::LockNotObtained
    async fn obtain(&self, expiration: Duration) -> Result<()>;

    /// Whether any holder currently owns the lease
    async fn peek(&self) -> Result<bool>;

    /// Extend a lease this handle holds
    async fn refresh(&self, expiration: Duration) -> Result<()>;

    /// End a lease this handle holds
    ///
    /// Fails with [`TidegateError::NotLocked`] when this handle does not hold
    /// the lease; the actual holder's lease is left untouched.
    ///
    /// [`TidegateError::NotLocked`]: crate::TidegateError::NotLocked
    async fn release(&self) -> Result<()>;
}

/// Hands out lock handles by key
pub trait LockProvider: Send + Sync {
    /// Create a handle for the lease on `key`
    ///
    /// Each handle has its own holder identity: two handles for the same key
    /// compete for the lease.
    fn lock(&self, key: &str) -> Box<dyn Lock>;
}
