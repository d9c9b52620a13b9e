//! Cookie-based session store
//!
//! Stores the encoded session directly in the session cookie. Tokens are
//! encrypted field by field when a cookie secret is configured; without one
//! only the identity (email and user) is kept.
//!
//! A cookie cannot be shared between proxy instances, so this store takes no
//! refresh lock.

use crate::error::Result;
use crate::session::cipher::Cipher;
use crate::session::{SessionConfig, SessionRequest, SessionState};
use crate::traits::session::SessionStore;
use async_trait::async_trait;
use cookie::{Cookie, SameSite};
use std::sync::Arc;

/// Browsers reject cookies larger than this
const MAX_COOKIE_SIZE: usize = 4096;

/// Cookie-based session store
#[derive(Clone)]
pub struct CookieSessionStore {
    cipher: Option<Arc<dyn Cipher>>,
    config: SessionConfig,
}

impl CookieSessionStore {
    /// Create a new cookie session store
    ///
    /// # Errors
    ///
    /// Returns an error if `cookie_secret` is set but is not a valid 128
    /// character hex string.
    pub fn new(config: &SessionConfig) -> Result<Self> {
        Ok(Self::with_cipher(config, config.cipher()?))
    }

    /// Create a store with an explicit cipher
    pub fn with_cipher(config: &SessionConfig, cipher: Option<Arc<dyn Cipher>>) -> Self {
        Self {
            cipher,
            config: config.clone(),
        }
    }
}

/// Build the session cookie with all configured attributes
pub(crate) fn session_cookie(config: &SessionConfig, value: String) -> Cookie<'static> {
    let mut cookie = Cookie::build((config.cookie_name.clone(), value))
        .path(config.cookie_path.clone())
        .http_only(config.cookie_http_only)
        .secure(config.cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(cookie::time::Duration::seconds(
            i64::try_from(config.cookie_expire_seconds).unwrap_or(i64::MAX),
        ))
        .build();

    if let Some(ref domain) = config.cookie_domain {
        cookie.set_domain(domain.clone());
    }

    cookie
}

/// Cookie matching the session cookie's scope, used to expire it
pub(crate) fn removal_cookie(config: &SessionConfig) -> Cookie<'static> {
    let mut cookie = Cookie::build((config.cookie_name.clone(), ""))
        .path(config.cookie_path.clone())
        .build();

    if let Some(ref domain) = config.cookie_domain {
        cookie.set_domain(domain.clone());
    }

    cookie
}

#[async_trait]
impl SessionStore for CookieSessionStore {
    async fn save(&self, req: &mut SessionRequest, session: &SessionState) -> Result<()> {
        let encoded = session.encode(self.cipher.as_deref())?;
        if encoded.len() > MAX_COOKIE_SIZE {
            tracing::warn!(
                size = encoded.len(),
                cookie = %self.config.cookie_name,
                "Session cookie exceeds 4096 bytes and may be rejected by browsers"
            );
        }

        req.jar_mut().add(session_cookie(&self.config, encoded));
        Ok(())
    }

    async fn load(&self, req: &SessionRequest) -> Result<Option<SessionState>> {
        let Some(value) = req.cookie(&self.config.cookie_name) else {
            return Ok(None);
        };

        match SessionState::decode(value, self.cipher.as_deref()) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                // Invalid, tampered or sealed with another key
                tracing::debug!(error = %e, "Ignoring undecodable session cookie");
                Ok(None)
            }
        }
    }

    async fn clear(&self, req: &mut SessionRequest) -> Result<()> {
        req.jar_mut().remove(removal_cookie(&self.config));
        Ok(())
    }
}
