//! Stored session loading and refresh
//!
//! Loads the session identified by the request's cookies and makes sure it
//! is still usable before handing it on. Sessions older than the refresh
//! period are either refreshed with the provider or re-validated.
//!
//! Refreshes are serialized per session through the store's refresh lock.
//! A request that loses the race does not refresh on its own: it re-reads the
//! session a bounded number of times waiting for the winner's result, and
//! proceeds without a session if none arrives.

use super::options::{RefreshRetryPolicy, StoredSessionLoaderOptions};
use super::scope::RequestScope;
use crate::error::{Result, TidegateError};
use crate::session::{SessionRequest, SessionState};
use crate::traits::provider::SessionProvider;
use crate::traits::session::SessionStore;
use std::sync::Arc;
use std::time::Duration;

/// Loads and validates sessions from a [`SessionStore`]
#[derive(Clone)]
pub struct StoredSessionLoader {
    store: Arc<dyn SessionStore>,
    refresh_period: Duration,
    provider: Arc<dyn SessionProvider>,
    retry: RefreshRetryPolicy,
}

impl StoredSessionLoader {
    pub fn new(options: StoredSessionLoaderOptions) -> Self {
        Self {
            store: options.store,
            refresh_period: options.refresh_period,
            provider: options.provider,
            retry: options.retry,
        }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Install the request's session into `scope`
    ///
    /// A session already present in the scope is left untouched. Any failure
    /// while loading, refreshing or validating clears the stored session and
    /// leaves the scope without one; it is never returned to the caller.
    pub async fn load_session(&self, scope: &mut RequestScope, req: &mut SessionRequest) {
        if scope.session.is_some() {
            return;
        }

        let session = match self.get_validated_session(req).await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(
                    target: "session.load",
                    error = %e,
                    "Error loading stored session, removing session"
                );
                if let Err(e) = self.store.clear(req).await {
                    tracing::error!(
                        target: "session.load",
                        error = %e,
                        "Error removing session"
                    );
                }
                None
            }
        };

        scope.session = session;
    }

    async fn get_validated_session(
        &self,
        req: &mut SessionRequest,
    ) -> Result<Option<SessionState>> {
        match self.store.load(req).await? {
            Some(session) => self.ensure_session_is_valid(req, session).await,
            None => Ok(None),
        }
    }

    async fn ensure_session_is_valid(
        &self,
        req: &mut SessionRequest,
        session: SessionState,
    ) -> Result<Option<SessionState>> {
        if !self.is_refresh_period_over(&session) {
            return Ok(Some(session));
        }

        if self.provider.is_refresh_session_needed(&session) {
            return self.get_refreshed_session(req).await;
        }

        self.validate_session(&session).await?;
        Ok(Some(session))
    }

    async fn get_refreshed_session(
        &self,
        req: &mut SessionRequest,
    ) -> Result<Option<SessionState>> {
        let result = self.refresh_with_lock(req).await;

        if let Err(e) = self.store.release_lock(req).await {
            tracing::debug!(
                target: "session.refresh",
                error = %e,
                "Failed to release session lock"
            );
        }

        match result {
            Err(e) if e.is_lock_not_obtained() => {
                tracing::debug!(
                    target: "session.refresh",
                    "Session is being refreshed elsewhere, waiting for the result"
                );
                self.retry_loading_valid_session(req).await
            }
            result => result,
        }
    }

    /// Reload under the refresh lock and refresh if still needed
    async fn refresh_with_lock(&self, req: &mut SessionRequest) -> Result<Option<SessionState>> {
        let Some(mut session) = self.store.load_with_lock(req).await? else {
            return Ok(None);
        };

        // Another holder may have refreshed it while we waited for the lock
        if !self.provider.is_refresh_session_needed(&session) {
            return Ok(Some(session));
        }

        tracing::info!(
            target: "session.refresh",
            age_secs = session.age().as_secs(),
            refresh_period_secs = self.refresh_period.as_secs(),
            session = %session,
            "Refreshing session"
        );
        self.refresh_session(req, &mut session).await?;
        Ok(Some(session))
    }

    async fn retry_loading_valid_session(
        &self,
        req: &SessionRequest,
    ) -> Result<Option<SessionState>> {
        let RefreshRetryPolicy { attempts, interval } = self.retry;

        for attempt in 1..=attempts {
            let Some(session) = self.store.load(req).await? else {
                return Ok(None);
            };

            if !self.is_refresh_period_over(&session)
                || !self.provider.is_refresh_session_needed(&session)
            {
                return Ok(Some(session));
            }

            if attempt < attempts {
                tokio::time::sleep(interval).await;
            }
        }

        tracing::warn!(
            target: "session.refresh",
            attempts,
            "Session still stale after waiting for a concurrent refresh"
        );
        Ok(None)
    }

    /// Refresh with the provider and persist the result
    async fn refresh_session(
        &self,
        req: &mut SessionRequest,
        session: &mut SessionState,
    ) -> Result<()> {
        if let Err(e) = self.provider.refresh_session(session).await {
            return Err(TidegateError::refresh(format!(
                "error refreshing access token for session ({}): {}",
                session, e
            )));
        }

        if let Err(e) = self.store.save(req, session).await {
            tracing::error!(
                target: "session.audit",
                email = %session.email,
                user = %session.user,
                error = %e,
                "Error saving refreshed session"
            );
            return Err(TidegateError::store(format!("error saving session: {}", e)));
        }

        Ok(())
    }

    async fn validate_session(&self, session: &SessionState) -> Result<()> {
        if session.is_expired() {
            return Err(TidegateError::Expired);
        }

        if !self.provider.validate_session_state(session).await {
            return Err(TidegateError::Invalid);
        }

        Ok(())
    }

    fn is_refresh_period_over(&self, session: &SessionState) -> bool {
        !self.refresh_period.is_zero() && session.age() >= self.refresh_period
    }
}
