//! The authenticated session value and its persisted form.

use crate::error::{Result, TidegateError};
use crate::session::cipher::Cipher;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// State of one authenticated identity bound to one browser session.
///
/// Token fields are sensitive: neither `Display` nor `Debug` prints them,
/// only whether they are present.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(rename = "at", default, skip_serializing_if = "String::is_empty")]
    pub access_token: String,

    #[serde(rename = "it", default, skip_serializing_if = "String::is_empty")]
    pub id_token: String,

    #[serde(rename = "rt", default, skip_serializing_if = "String::is_empty")]
    pub refresh_token: String,

    /// Absolute expiry of the access token; `None` means no expiry
    #[serde(rename = "e", default, skip_serializing_if = "Option::is_none")]
    pub expires_on: Option<DateTime<Utc>>,

    #[serde(rename = "em", default, skip_serializing_if = "String::is_empty")]
    pub email: String,

    /// Canonical login handle
    #[serde(rename = "u", default, skip_serializing_if = "String::is_empty")]
    pub user: String,

    /// When the tokens were issued or last refreshed
    #[serde(rename = "ca", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

type FieldAccessor = fn(&mut SessionState) -> &mut String;

/// Fields encrypted individually when a cipher is configured.
///
/// Encode and decode both walk this table; a new sensitive field only needs
/// an entry here.
const SENSITIVE_FIELDS: [(&str, FieldAccessor); 3] = [
    ("access_token", access_token_field),
    ("id_token", id_token_field),
    ("refresh_token", refresh_token_field),
];

fn access_token_field(s: &mut SessionState) -> &mut String {
    &mut s.access_token
}

fn id_token_field(s: &mut SessionState) -> &mut String {
    &mut s.id_token
}

fn refresh_token_field(s: &mut SessionState) -> &mut String {
    &mut s.refresh_token
}

impl SessionState {
    /// Create an empty session stamped with the current time
    pub fn new() -> Self {
        Self {
            created_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// Set `expires_on` to `ttl` from now
    pub fn expires_in(&mut self, ttl: Duration) {
        self.expires_on = TimeDelta::from_std(ttl)
            .ok()
            .and_then(|delta| Utc::now().checked_add_signed(delta));
    }

    /// Check whether the access token has expired
    pub fn is_expired(&self) -> bool {
        matches!(self.expires_on, Some(expires_on) if expires_on < Utc::now())
    }

    /// Time elapsed since `created_at`
    ///
    /// Returns zero when `created_at` is unset or lies in the future.
    pub fn age(&self) -> Duration {
        self.created_at
            .and_then(|created_at| (Utc::now() - created_at).to_std().ok())
            .unwrap_or(Duration::ZERO)
    }

    /// Serialize the session for storage.
    ///
    /// Without a cipher only `email` and `user` are written. With one, every
    /// non-empty sensitive field is encrypted on its own; any failure aborts
    /// the whole encode.
    pub fn encode(&self, cipher: Option<&dyn Cipher>) -> Result<String> {
        let payload = match cipher {
            None => self.identity_only(),
            Some(cipher) => {
                let mut sealed = self.clone();
                for (name, field) in SENSITIVE_FIELDS {
                    let value = field(&mut sealed);
                    if !value.is_empty() {
                        *value = cipher.encrypt(name, value).map_err(|e| {
                            TidegateError::crypto(format!("failed to encrypt {}: {}", name, e))
                        })?;
                    }
                }
                sealed
            }
        };

        let json = serde_json::to_vec(&payload)?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    /// Restore a session from its stored form.
    ///
    /// Mirrors [`SessionState::encode`]: without a cipher only identity
    /// fields are trusted. An empty `user` is back-filled from the local
    /// part of `email`.
    pub fn decode(encoded: &str, cipher: Option<&dyn Cipher>) -> Result<SessionState> {
        let json = URL_SAFE_NO_PAD
            .decode(encoded.trim())
            .map_err(|e| TidegateError::store(format!("invalid session encoding: {}", e)))?;
        let decoded: SessionState = serde_json::from_slice(&json)?;

        let mut session = match cipher {
            None => decoded.identity_only(),
            Some(cipher) => {
                let mut opened = decoded;
                for (name, field) in SENSITIVE_FIELDS {
                    let value = field(&mut opened);
                    if !value.is_empty() {
                        *value = cipher.decrypt(name, value).map_err(|e| {
                            TidegateError::crypto(format!("failed to decrypt {}: {}", name, e))
                        })?;
                    }
                }
                opened
            }
        };

        if session.user.is_empty() {
            session.user = session
                .email
                .split('@')
                .next()
                .unwrap_or_default()
                .to_string();
        }

        Ok(session)
    }

    fn identity_only(&self) -> SessionState {
        SessionState {
            email: self.email.clone(),
            user: self.user.clone(),
            ..Default::default()
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Session{{email:{} user:{}", self.email, self.user)?;
        if !self.access_token.is_empty() {
            write!(f, " token:true")?;
        }
        if !self.id_token.is_empty() {
            write!(f, " id_token:true")?;
        }
        if let Some(expires_on) = self.expires_on {
            write!(f, " expires:{}", expires_on.to_rfc3339())?;
        }
        if !self.refresh_token.is_empty() {
            write!(f, " refresh_token:true")?;
        }
        write!(f, "}}")
    }
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
