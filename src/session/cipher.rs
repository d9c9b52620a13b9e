//! Field-level encryption for persisted sessions.
//!
//! Values are sealed with the `cookie` crate's private cookies, which use
//! AES-256-GCM and authenticate the field name alongside the value. A token
//! encrypted as `access_token` therefore cannot be replayed as `refresh_token`.

use crate::error::{Result, TidegateError};
use cookie::{Cookie, CookieJar, Key};
use std::fmt;
use std::sync::Arc;

/// Encrypts and decrypts individual session field values
pub trait Cipher: Send + Sync {
    /// Encrypt `value`, binding it to the field `name`
    fn encrypt(&self, name: &str, value: &str) -> Result<String>;

    /// Decrypt a value previously produced by [`Cipher::encrypt`] for `name`
    fn decrypt(&self, name: &str, value: &str) -> Result<String>;
}

/// Authenticated cipher backed by `cookie::Key`
#[derive(Clone)]
pub struct CookieCipher {
    key: Arc<Key>,
}

impl CookieCipher {
    /// Build a cipher from a hex-encoded 64 byte secret.
    ///
    /// Generate one with `openssl rand -hex 64`.
    pub fn from_hex(secret: &str) -> Result<Self> {
        let bytes = hex::decode(secret.trim())
            .map_err(|e| TidegateError::crypto(format!("Invalid cookie secret format: {}", e)))?;

        if bytes.len() != 64 {
            return Err(TidegateError::crypto(
                "Cookie secret must be 64 bytes (128 hex characters). Generate with: openssl rand -hex 64",
            ));
        }

        let key = Key::try_from(bytes.as_slice())
            .map_err(|e| TidegateError::crypto(format!("Invalid cookie secret: {}", e)))?;

        Ok(Self { key: Arc::new(key) })
    }

    /// Build a cipher with a random key.
    ///
    /// Sessions sealed with it do not survive a restart and cannot be read by
    /// other instances.
    pub fn generate() -> Self {
        Self {
            key: Arc::new(Key::generate()),
        }
    }
}

impl Cipher for CookieCipher {
    fn encrypt(&self, name: &str, value: &str) -> Result<String> {
        let mut jar = CookieJar::new();
        jar.private_mut(&self.key)
            .add(Cookie::new(name.to_string(), value.to_string()));

        jar.get(name)
            .map(|cookie| cookie.value().to_string())
            .ok_or_else(|| TidegateError::crypto(format!("failed to seal {}", name)))
    }

    fn decrypt(&self, name: &str, value: &str) -> Result<String> {
        let mut jar = CookieJar::new();
        jar.add_original(Cookie::new(name.to_string(), value.to_string()));

        jar.private(&self.key)
            .get(name)
            .map(|cookie| cookie.value().to_string())
            .ok_or_else(|| TidegateError::crypto(format!("failed to open {}", name)))
    }
}

impl fmt::Debug for CookieCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieCipher").finish_non_exhaustive()
    }
}
