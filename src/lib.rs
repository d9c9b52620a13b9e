//! Tidegate - the session layer of an authenticating reverse proxy
//!
//! Tidegate keeps a signed-in user's identity and provider tokens between
//! requests, and keeps those tokens fresh without letting concurrent
//! requests refresh the same session twice.
//!
//! # Features
//!
//! - **Session state**: identity plus provider tokens, with the tokens
//!   encrypted field by field
//! - **Stores**: sessions kept entirely in a cookie, or server-side behind a
//!   ticket cookie in memory or in Redis
//! - **Refresh locks**: per-session leases that hold across proxy instances
//! - **Loader**: an axum/tower layer that loads, refreshes and validates the
//!   session for every request
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use axum::{Router, routing::get};
//! use tidegate::{CurrentSession, SessionConfig, StoredSessionLoaderLayer, StoredSessionLoaderOptions};
//!
//! #[tokio::main]
//! async fn main() -> tidegate::Result<()> {
//!     tidegate::init_tracing();
//!
//!     let config = SessionConfig::from_env();
//!     config.validate()?;
//!
//!     let options = StoredSessionLoaderOptions::new(config.build_store()?, Arc::new(MyProvider::new()))
//!         .refresh_period(config.refresh_period())
//!         .retry(config.retry_policy());
//!
//!     let app = Router::new()
//!         .route("/", get(|CurrentSession(session): CurrentSession| async move {
//!             session.map(|s| s.user).unwrap_or_default()
//!         }))
//!         .layer(StoredSessionLoaderLayer::new(options));
//!
//!     // serve `app`
//!     Ok(())
//! }
//! ```

#![allow(async_fn_in_trait)] // async_trait macro handles Send/Sync bounds properly

pub mod cache;
mod config;
mod error;
pub mod loader;
pub mod lock;
pub mod session;
pub mod traits;
mod utils;

// Re-exports for public API
pub use cache::InMemoryCache;
#[cfg(feature = "redis")]
pub use cache::RedisCache;
pub use config::LoggingConfig;
pub use error::{Result, TidegateError};
pub use loader::{
    CurrentSession, RefreshRetryPolicy, RequestScope, RequireSession, StoredSessionLoader,
    StoredSessionLoaderLayer, StoredSessionLoaderOptions, StoredSessionLoaderService,
};
pub use lock::InMemoryLocks;
#[cfg(feature = "redis")]
pub use lock::RedisLocks;
pub use session::{
    Cipher, CookieCipher, CookieSessionStore, PersistentSessionStore, SessionBackend,
    SessionConfig, SessionConfigBuilder, SessionRequest, SessionState,
};
pub use traits::cache::Cache;
pub use traits::lock::{Lock, LockProvider};
pub use traits::provider::SessionProvider;
pub use traits::session::SessionStore;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging with sensible defaults
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "info", "session.refresh=debug")
/// - `TIDEGATE_LOG_JSON`: Set to "true" for JSON formatted logs
///
/// Session events are emitted under the `session.load`, `session.refresh`
/// and `session.audit` targets.
///
/// # Example
///
/// ```rust,no_run
/// #[tokio::main]
/// async fn main() {
///     tidegate::init_tracing();
///     // ... rest of your proxy
/// }
/// ```
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = std::env::var("TIDEGATE_LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    install_subscriber(env_filter, json_logs);
}

/// Initialize tracing with a custom configuration
pub fn init_tracing_with_config(config: &LoggingConfig) {
    install_subscriber(EnvFilter::new(&config.level), config.json);
}

fn install_subscriber(env_filter: EnvFilter, json: bool) {
    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
