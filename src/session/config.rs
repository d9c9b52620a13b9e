use crate::cache::InMemoryCache;
use crate::error::{Result, TidegateError};
use crate::loader::RefreshRetryPolicy;
use crate::lock::InMemoryLocks;
use crate::session::cipher::{Cipher, CookieCipher};
use crate::session::{CookieSessionStore, PersistentSessionStore};
use crate::traits::session::SessionStore;
use crate::utils::{get_env_with_prefix, parse_env_with_prefix};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Browsers cap cookie lifetimes at 400 days
const MAX_COOKIE_EXPIRE_SECONDS: u64 = 400 * 24 * 3600;

/// Where session state is kept between requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    /// The whole encoded session lives in the cookie (default)
    Cookie,
    /// Cookie holds a ticket, state lives in process memory
    Memory,
    /// Cookie holds a ticket, state lives in Redis (requires `redis` feature)
    #[cfg(feature = "redis")]
    Redis,
}

impl Default for SessionBackend {
    fn default() -> Self {
        Self::Cookie
    }
}

/// Session configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Session backend type
    #[serde(default)]
    pub backend: SessionBackend,

    /// Name of the session cookie
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Cookie domain (optional)
    #[serde(default)]
    pub cookie_domain: Option<String>,

    #[serde(default = "default_cookie_path")]
    pub cookie_path: String,

    /// Cookie secure flag (HTTPS only)
    #[serde(default = "default_true")]
    pub cookie_secure: bool,

    #[serde(default = "default_true")]
    pub cookie_http_only: bool,

    /// Lifetime of the session cookie and of server-side entries (in seconds)
    #[serde(default = "default_cookie_expire_seconds")]
    pub cookie_expire_seconds: u64,

    /// Hex-encoded 64 byte secret used to encrypt session tokens
    ///
    /// Without it sessions degrade to identity only: tokens are never
    /// persisted and nothing can be refreshed.
    /// Generate one with: `openssl rand -hex 64`
    #[serde(default)]
    pub cookie_secret: Option<String>,

    /// Minimum session age before provider refresh or validation (in seconds)
    ///
    /// `0` disables refreshing entirely.
    #[serde(default)]
    pub refresh_period_seconds: u64,

    /// Redis connection URL (only used for the Redis backend)
    #[serde(default)]
    pub redis_url: Option<String>,

    /// How long a refresh lock is held before it lapses (in seconds)
    #[serde(default = "default_lock_lease_seconds")]
    pub lock_lease_seconds: u64,

    /// How many times to poll for a session refreshed by another holder
    #[serde(default = "default_refresh_retry_attempts")]
    pub refresh_retry_attempts: u32,

    /// Delay between polls (in milliseconds)
    #[serde(default = "default_refresh_retry_interval_ms")]
    pub refresh_retry_interval_ms: u64,

    /// Maximum number of sessions kept by the memory backend
    #[serde(default = "default_memory_max_entries")]
    pub memory_max_entries: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: SessionBackend::default(),
            cookie_name: default_cookie_name(),
            cookie_domain: None,
            cookie_path: default_cookie_path(),
            cookie_secure: default_true(),
            cookie_http_only: default_true(),
            cookie_expire_seconds: default_cookie_expire_seconds(),
            cookie_secret: None,
            refresh_period_seconds: 0,
            redis_url: None,
            lock_lease_seconds: default_lock_lease_seconds(),
            refresh_retry_attempts: default_refresh_retry_attempts(),
            refresh_retry_interval_ms: default_refresh_retry_interval_ms(),
            memory_max_entries: default_memory_max_entries(),
        }
    }
}

impl SessionConfig {
    /// Create a new SessionConfig builder
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::new()
    }

    /// Load session configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(backend) = get_env_with_prefix("SESSION_BACKEND") {
            config.backend = match backend.to_lowercase().as_str() {
                "memory" => SessionBackend::Memory,
                "redis" => {
                    #[cfg(feature = "redis")]
                    {
                        SessionBackend::Redis
                    }
                    #[cfg(not(feature = "redis"))]
                    {
                        tracing::warn!("Redis sessions requested but redis feature not enabled, using cookies");
                        SessionBackend::Cookie
                    }
                }
                _ => SessionBackend::Cookie,
            };
        }

        if let Some(name) = get_env_with_prefix("COOKIE_NAME") {
            config.cookie_name = name;
        }

        if let Some(domain) = get_env_with_prefix("COOKIE_DOMAIN") {
            config.cookie_domain = Some(domain);
        }

        if let Some(path) = get_env_with_prefix("COOKIE_PATH") {
            config.cookie_path = path;
        }

        if let Some(secure) = get_env_with_prefix("COOKIE_SECURE") {
            config.cookie_secure = secure.parse().unwrap_or(true);
        }

        if let Some(http_only) = get_env_with_prefix("COOKIE_HTTP_ONLY") {
            config.cookie_http_only = http_only.parse().unwrap_or(true);
        }

        if let Some(seconds) = parse_env_with_prefix("COOKIE_EXPIRE_SECONDS") {
            config.cookie_expire_seconds = seconds;
        }

        if let Some(secret) = get_env_with_prefix("COOKIE_SECRET") {
            config.cookie_secret = Some(secret);
        }

        if let Some(seconds) = parse_env_with_prefix("COOKIE_REFRESH_SECONDS") {
            config.refresh_period_seconds = seconds;
        }

        if let Some(url) = get_env_with_prefix("REDIS_URL") {
            config.redis_url = Some(url);
        }

        if let Some(seconds) = parse_env_with_prefix("SESSION_LOCK_LEASE_SECONDS") {
            config.lock_lease_seconds = seconds;
        }

        if let Some(attempts) = parse_env_with_prefix("SESSION_REFRESH_RETRY_ATTEMPTS") {
            config.refresh_retry_attempts = attempts;
        }

        if let Some(ms) = parse_env_with_prefix("SESSION_REFRESH_RETRY_INTERVAL_MS") {
            config.refresh_retry_interval_ms = ms;
        }

        if let Some(entries) = parse_env_with_prefix("SESSION_MEMORY_MAX_ENTRIES") {
            config.memory_max_entries = entries;
        }

        config
    }

    /// Check the configuration for values the session layer cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.cookie_name.is_empty()
            || !self
                .cookie_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "_-.".contains(c))
        {
            return Err(TidegateError::internal(format!(
                "Invalid cookie name: {:?}",
                self.cookie_name
            )));
        }

        if self.cookie_expire_seconds == 0 {
            return Err(TidegateError::internal("Cookie expiry must be greater than 0"));
        }

        if self.cookie_expire_seconds > MAX_COOKIE_EXPIRE_SECONDS {
            return Err(TidegateError::internal(format!(
                "Cookie expiry ({}s) must not exceed {}s",
                self.cookie_expire_seconds, MAX_COOKIE_EXPIRE_SECONDS
            )));
        }

        if self.refresh_period_seconds > 0 && self.refresh_period_seconds >= self.cookie_expire_seconds
        {
            return Err(TidegateError::internal(format!(
                "Cookie refresh ({}s) must be less than cookie expiry ({}s)",
                self.refresh_period_seconds, self.cookie_expire_seconds
            )));
        }

        if self.lock_lease_seconds == 0 {
            return Err(TidegateError::internal("Session lock lease must be greater than 0"));
        }

        if self.lock_lease_seconds > self.cookie_expire_seconds {
            return Err(TidegateError::internal(format!(
                "Session lock lease ({}s) must not exceed cookie expiry ({}s)",
                self.lock_lease_seconds, self.cookie_expire_seconds
            )));
        }

        if let Some(ref secret) = self.cookie_secret {
            CookieCipher::from_hex(secret)?;
        }

        #[cfg(feature = "redis")]
        if self.backend == SessionBackend::Redis && self.redis_url.is_none() {
            return Err(TidegateError::internal("Redis session backend requires redis_url"));
        }

        Ok(())
    }

    pub fn cookie_expire(&self) -> Duration {
        Duration::from_secs(self.cookie_expire_seconds)
    }

    pub fn refresh_period(&self) -> Duration {
        Duration::from_secs(self.refresh_period_seconds)
    }

    pub fn lock_lease(&self) -> Duration {
        Duration::from_secs(self.lock_lease_seconds)
    }

    pub fn retry_policy(&self) -> RefreshRetryPolicy {
        RefreshRetryPolicy {
            attempts: self.refresh_retry_attempts,
            interval: Duration::from_millis(self.refresh_retry_interval_ms),
        }
    }

    /// Build the token cipher, if a secret is configured
    pub fn cipher(&self) -> Result<Option<Arc<dyn Cipher>>> {
        match self.cookie_secret {
            Some(ref secret) => Ok(Some(Arc::new(CookieCipher::from_hex(secret)?))),
            None => {
                tracing::warn!(
                    "No cookie secret configured: sessions will carry identity only and tokens are never persisted"
                );
                Ok(None)
            }
        }
    }

    /// Construct the configured session store
    pub fn build_store(&self) -> Result<Arc<dyn SessionStore>> {
        self.validate()?;

        let store: Arc<dyn SessionStore> = match self.backend {
            SessionBackend::Cookie => Arc::new(CookieSessionStore::new(self)?),
            SessionBackend::Memory => Arc::new(PersistentSessionStore::new(
                self,
                Arc::new(InMemoryCache::new(self.memory_max_entries)),
                Arc::new(InMemoryLocks::new()),
            )?),
            #[cfg(feature = "redis")]
            SessionBackend::Redis => {
                let url = self
                    .redis_url
                    .as_deref()
                    .ok_or_else(|| TidegateError::internal("Redis session backend requires redis_url"))?;
                let cache = crate::cache::RedisCache::new(url, self.cookie_expire())?;
                let locks = cache.locks();
                Arc::new(PersistentSessionStore::new(self, Arc::new(cache), Arc::new(locks))?)
            }
        };

        if store.is_healthy() {
            tracing::info!(backend = ?self.backend, cookie = %self.cookie_name, "Session store ready");
        } else {
            tracing::warn!(
                backend = ?self.backend,
                cookie = %self.cookie_name,
                "Session backend failed its health check"
            );
        }
        Ok(store)
    }
}

/// Builder for SessionConfig
#[must_use = "builder does nothing until you call build()"]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SessionConfig::default(),
        }
    }

    pub fn backend(mut self, backend: SessionBackend) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn cookie_name(mut self, name: impl Into<String>) -> Self {
        self.config.cookie_name = name.into();
        self
    }

    pub fn cookie_domain(mut self, domain: impl Into<String>) -> Self {
        self.config.cookie_domain = Some(domain.into());
        self
    }

    pub fn cookie_secure(mut self, secure: bool) -> Self {
        self.config.cookie_secure = secure;
        self
    }

    pub fn cookie_expire(mut self, expire: Duration) -> Self {
        self.config.cookie_expire_seconds = expire.as_secs();
        self
    }

    pub fn cookie_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.cookie_secret = Some(secret.into());
        self
    }

    pub fn refresh_period(mut self, period: Duration) -> Self {
        self.config.refresh_period_seconds = period.as_secs();
        self
    }

    pub fn redis_url(mut self, url: impl Into<String>) -> Self {
        self.config.redis_url = Some(url.into());
        self
    }

    pub fn lock_lease(mut self, lease: Duration) -> Self {
        self.config.lock_lease_seconds = lease.as_secs();
        self
    }

    pub fn refresh_retry(mut self, attempts: u32, interval: Duration) -> Self {
        self.config.refresh_retry_attempts = attempts;
        self.config.refresh_retry_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn build(self) -> SessionConfig {
        self.config
    }
}

impl Default for SessionConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn default_cookie_name() -> String {
    "_tidegate_session".to_string()
}

fn default_cookie_path() -> String {
    "/".to_string()
}

fn default_true() -> bool {
    true
}

fn default_cookie_expire_seconds() -> u64 {
    3600 * 24 * 7 // 7 days
}

fn default_lock_lease_seconds() -> u64 {
    5
}

fn default_refresh_retry_attempts() -> u32 {
    10
}

fn default_refresh_retry_interval_ms() -> u64 {
    100
}

fn default_memory_max_entries() -> u64 {
    10_000
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.backend, SessionBackend::Cookie);
        assert_eq!(config.cookie_name, "_tidegate_session");
        assert_eq!(config.refresh_period(), Duration::ZERO);
        assert_eq!(config.retry_policy(), RefreshRetryPolicy::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = SessionConfig::builder()
            .backend(SessionBackend::Memory)
            .cookie_name("_proxy")
            .cookie_secret(SECRET)
            .refresh_period(Duration::from_secs(3600))
            .refresh_retry(3, Duration::from_millis(20))
            .build();

        assert_eq!(config.backend, SessionBackend::Memory);
        assert_eq!(config.cookie_name, "_proxy");
        assert_eq!(config.refresh_period_seconds, 3600);
        assert_eq!(config.retry_policy().attempts, 3);
        assert_eq!(config.retry_policy().interval, Duration::from_millis(20));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_refresh_must_be_shorter_than_expiry() {
        let config = SessionConfig::builder()
            .cookie_expire(Duration::from_secs(3600))
            .refresh_period(Duration::from_secs(3600))
            .build();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must be less than cookie expiry"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = SessionConfig::builder().cookie_name("bad name;").build();
        assert!(config.validate().is_err());

        let config = SessionConfig::builder().cookie_secret("not-hex").build();
        assert!(config.validate().is_err());

        let config = SessionConfig::builder().lock_lease(Duration::ZERO).build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_out_of_range_durations_rejected() {
        let config = SessionConfig {
            lock_lease_seconds: u64::MAX,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must not exceed cookie expiry"));

        let config = SessionConfig::builder()
            .lock_lease(Duration::from_secs(120))
            .cookie_expire(Duration::from_secs(60))
            .build();
        assert!(config.validate().is_err());

        let config = SessionConfig {
            cookie_expire_seconds: u64::MAX,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(config.build_store().is_err());

        let config = SessionConfig::builder()
            .cookie_expire(Duration::from_secs(MAX_COOKIE_EXPIRE_SECONDS))
            .build();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cipher_optional() {
        let config = SessionConfig::default();
        assert!(config.cipher().unwrap().is_none());

        let config = SessionConfig::builder().cookie_secret(SECRET).build();
        assert!(config.cipher().unwrap().is_some());
    }

    #[test]
    fn test_build_store_for_local_backends() {
        let config = SessionConfig::builder().cookie_secret(SECRET).build();
        assert!(config.build_store().is_ok());

        let config = SessionConfig::builder()
            .backend(SessionBackend::Memory)
            .cookie_secret(SECRET)
            .build();
        let store = config.build_store().unwrap();
        assert!(store.is_healthy());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"backend": "memory", "refresh_period_seconds": 60}"#).unwrap();
        assert_eq!(config.backend, SessionBackend::Memory);
        assert_eq!(config.refresh_period(), Duration::from_secs(60));
        assert_eq!(config.cookie_path, "/");
        assert_eq!(config.lock_lease_seconds, 5);
    }

    #[test]
    fn test_from_env() {
        unsafe {
            std::env::set_var("TIDEGATE_SESSION_BACKEND", "memory");
            std::env::set_var("TIDEGATE_COOKIE_REFRESH_SECONDS", "1800");
            std::env::set_var("TIDEGATE_SESSION_REFRESH_RETRY_ATTEMPTS", "4");
        }

        let config = SessionConfig::from_env();
        assert_eq!(config.backend, SessionBackend::Memory);
        assert_eq!(config.refresh_period_seconds, 1800);
        assert_eq!(config.refresh_retry_attempts, 4);

        unsafe {
            std::env::remove_var("TIDEGATE_SESSION_BACKEND");
            std::env::remove_var("TIDEGATE_COOKIE_REFRESH_SECONDS");
            std::env::remove_var("TIDEGATE_SESSION_REFRESH_RETRY_ATTEMPTS");
        }
    }
}
