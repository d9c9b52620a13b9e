//! Session storage trait
//!
//! This trait abstracts where a session lives between requests, allowing the
//! loader to work against cookie-only storage or a shared backend.

use crate::error::Result;
use crate::session::{SessionRequest, SessionState};
use async_trait::async_trait;

/// Session storage trait
///
/// Every operation is scoped to one request through [`SessionRequest`]:
/// loads read the request's cookies, and writes queue response cookies on it.
#[async_trait]
#[allow(async_fn_in_trait)] // async_trait macro handles Send/Sync bounds
pub trait SessionStore: Send + Sync {
    /// Persist the session and queue whatever cookie identifies it
    async fn save(&self, req: &mut SessionRequest, session: &SessionState) -> Result<()>;

    /// Load the session identified by the request
    ///
    /// Returns `Ok(None)` if the request carries no session, or one that can
    /// no longer be decoded.
    async fn load(&self, req: &SessionRequest) -> Result<Option<SessionState>>;

    /// Remove the session from storage and expire its cookie
    async fn clear(&self, req: &mut SessionRequest) -> Result<()>;

    /// Load the session while acquiring its refresh lock
    ///
    /// Returns [`TidegateError::LockNotObtained`] when another holder owns the
    /// lock, distinct from storage failures. Stores whose sessions cannot be
    /// shared between instances keep this default, which takes no lock.
    ///
    /// [`TidegateError::LockNotObtained`]: crate::TidegateError::LockNotObtained
    async fn load_with_lock(&self, req: &mut SessionRequest) -> Result<Option<SessionState>> {
        self.load(req).await
    }

    /// Release a lock taken by [`SessionStore::load_with_lock`], if any
    async fn release_lock(&self, _req: &mut SessionRequest) -> Result<()> {
        Ok(())
    }

    /// Check if the session store is healthy
    fn is_healthy(&self) -> bool {
        true
    }
}
