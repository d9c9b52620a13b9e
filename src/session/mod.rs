//! Session state, encryption and storage.
//!
//! Provides the [`SessionState`] value, its field-level encryption, and two
//! storage backends: sessions kept entirely in the cookie, and sessions kept
//! server-side behind a ticket cookie.

pub mod cipher;
mod config;
mod cookie;
mod persistent;
mod request;
mod state;

pub use cipher::{Cipher, CookieCipher};
pub use config::{SessionBackend, SessionConfig, SessionConfigBuilder};
pub use self::cookie::CookieSessionStore;
pub use persistent::PersistentSessionStore;
pub use request::SessionRequest;
pub use state::SessionState;
