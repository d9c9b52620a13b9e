//! Identity provider callbacks
//!
//! The loader never talks to an identity provider directly. Token exchange,
//! user lookups and provider-specific authorization rules live behind this
//! trait.

use crate::error::Result;
use crate::session::SessionState;
use async_trait::async_trait;

/// Provider-side session refresh and validation
///
/// # Example
///
/// ```rust,ignore
/// use tidegate::{Result, SessionProvider, SessionState};
///
/// struct MyProvider {
///     client: reqwest::Client,
/// }
///
/// #[async_trait]
/// impl SessionProvider for MyProvider {
///     async fn refresh_session(&self, session: &mut SessionState) -> Result<()> {
///         let tokens = self.redeem_refresh_token(&session.refresh_token).await?;
///         session.access_token = tokens.access_token;
///         session.created_at = Some(chrono::Utc::now());
///         Ok(())
///     }
///
///     fn is_refresh_session_needed(&self, session: &SessionState) -> bool {
///         !session.refresh_token.is_empty()
///     }
///
///     async fn validate_session_state(&self, session: &SessionState) -> bool {
///         self.token_info(&session.access_token).await.is_ok()
///     }
/// }
/// ```
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Obtain fresh tokens, updating the session in place
    async fn refresh_session(&self, session: &mut SessionState) -> Result<()>;

    /// Whether a session past its refresh period should be refreshed
    ///
    /// Must not perform I/O.
    fn is_refresh_session_needed(&self, session: &SessionState) -> bool;

    /// Confirm a session that was not refreshed is still acceptable
    async fn validate_session_state(&self, session: &SessionState) -> bool;
}
