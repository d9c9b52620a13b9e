//! Server-side session store
//!
//! The cookie carries only an opaque ticket. The encoded session lives in a
//! shared [`Cache`] under a key derived from the ticket, so every proxy
//! instance pointed at the same backend sees the same session. Refreshes are
//! coordinated through a [`LockProvider`] keyed the same way.

use crate::error::{Result, TidegateError};
use crate::session::cipher::Cipher;
use crate::session::cookie::{removal_cookie, session_cookie};
use crate::session::{SessionConfig, SessionRequest, SessionState};
use crate::traits::cache::Cache;
use crate::traits::lock::LockProvider;
use crate::traits::session::SessionStore;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const TICKET_PREFIX: &str = "v1-";

/// Opaque handle stored in the session cookie
#[derive(Debug, Clone, PartialEq, Eq)]
struct Ticket {
    id: String,
}

impl Ticket {
    fn generate() -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
        }
    }

    /// Accept only tickets this store could have issued
    fn parse(value: &str) -> Option<Self> {
        let id = value.strip_prefix(TICKET_PREFIX)?;
        if id.len() == 32 && id.chars().all(|c| c.is_ascii_hexdigit()) {
            Some(Self { id: id.to_string() })
        } else {
            None
        }
    }

    fn cookie_value(&self) -> String {
        format!("{}{}", TICKET_PREFIX, self.id)
    }

    fn storage_key(&self, cookie_name: &str) -> String {
        format!("{}-{}", cookie_name, self.id)
    }
}

/// Session store backed by a shared cache
#[derive(Clone)]
pub struct PersistentSessionStore {
    cache: Arc<dyn Cache>,
    locks: Arc<dyn LockProvider>,
    cipher: Option<Arc<dyn Cipher>>,
    config: SessionConfig,
}

impl PersistentSessionStore {
    /// Create a store over the given backend
    ///
    /// # Errors
    ///
    /// Returns an error if `cookie_secret` is set but invalid.
    pub fn new(
        config: &SessionConfig,
        cache: Arc<dyn Cache>,
        locks: Arc<dyn LockProvider>,
    ) -> Result<Self> {
        Ok(Self::with_cipher(config, cache, locks, config.cipher()?))
    }

    /// Create a store with an explicit cipher
    pub fn with_cipher(
        config: &SessionConfig,
        cache: Arc<dyn Cache>,
        locks: Arc<dyn LockProvider>,
        cipher: Option<Arc<dyn Cipher>>,
    ) -> Self {
        Self {
            cache,
            locks,
            cipher,
            config: config.clone(),
        }
    }

    fn ticket(&self, req: &SessionRequest) -> Option<Ticket> {
        req.cookie(&self.config.cookie_name).and_then(Ticket::parse)
    }

    fn lease(&self) -> Duration {
        self.config.lock_lease()
    }
}

#[async_trait]
impl SessionStore for PersistentSessionStore {
    async fn save(&self, req: &mut SessionRequest, session: &SessionState) -> Result<()> {
        let ticket = self.ticket(req).unwrap_or_else(Ticket::generate);
        let encoded = session.encode(self.cipher.as_deref())?;

        self.cache
            .set_bytes(
                &ticket.storage_key(&self.config.cookie_name),
                encoded.into_bytes(),
                Some(self.config.cookie_expire()),
            )
            .await?;

        req.jar_mut()
            .add(session_cookie(&self.config, ticket.cookie_value()));
        Ok(())
    }

    async fn load(&self, req: &SessionRequest) -> Result<Option<SessionState>> {
        let Some(ticket) = self.ticket(req) else {
            return Ok(None);
        };

        let Some(bytes) = self
            .cache
            .get_bytes(&ticket.storage_key(&self.config.cookie_name))
            .await?
        else {
            return Ok(None);
        };

        let encoded = String::from_utf8(bytes)
            .map_err(|e| TidegateError::store(format!("stored session is not UTF-8: {}", e)))?;

        match SessionState::decode(&encoded, self.cipher.as_deref()) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring undecodable stored session");
                Ok(None)
            }
        }
    }

    async fn clear(&self, req: &mut SessionRequest) -> Result<()> {
        if let Some(ticket) = self.ticket(req) {
            self.cache
                .delete(&ticket.storage_key(&self.config.cookie_name))
                .await?;
        }

        req.jar_mut().remove(removal_cookie(&self.config));
        Ok(())
    }

    async fn load_with_lock(&self, req: &mut SessionRequest) -> Result<Option<SessionState>> {
        let Some(ticket) = self.ticket(req) else {
            return Ok(None);
        };

        let lock = self
            .locks
            .lock(&ticket.storage_key(&self.config.cookie_name));
        lock.obtain(self.lease()).await?;
        req.hold_lock(lock);

        self.load(req).await
    }

    async fn release_lock(&self, req: &mut SessionRequest) -> Result<()> {
        match req.take_lock() {
            Some(lock) => lock.release().await,
            None => Ok(()),
        }
    }

    fn is_healthy(&self) -> bool {
        self.cache.is_healthy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::lock::InMemoryLocks;

    const SECRET: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    fn test_store() -> (PersistentSessionStore, InMemoryCache) {
        let config = SessionConfig::builder().cookie_secret(SECRET).build();
        let cache = InMemoryCache::new(100);
        let store = PersistentSessionStore::new(
            &config,
            Arc::new(cache.clone()),
            Arc::new(InMemoryLocks::new()),
        )
        .unwrap();
        (store, cache)
    }

    fn test_session() -> SessionState {
        let mut session = SessionState::new();
        session.email = "jane@example.com".to_string();
        session.access_token = "access.abc".to_string();
        session
    }

    async fn saved_request(store: &PersistentSessionStore) -> SessionRequest {
        let mut req = SessionRequest::new();
        store.save(&mut req, &test_session()).await.unwrap();
        let value = req.cookie("_tidegate_session").unwrap().to_string();
        SessionRequest::new().with_cookie("_tidegate_session", value)
    }

    #[test]
    fn test_ticket_parse() {
        let ticket = Ticket::generate();
        assert_eq!(Ticket::parse(&ticket.cookie_value()), Some(ticket));

        assert_eq!(Ticket::parse("v1-short"), None);
        assert_eq!(Ticket::parse("0123456789abcdef0123456789abcdef"), None);
        assert_eq!(Ticket::parse("v1-0123456789abcdef0123456789abcdeg"), None);
    }

    #[tokio::test]
    async fn test_cookie_holds_ticket_not_session() {
        let (store, cache) = test_store();
        let req = saved_request(&store).await;

        let value = req.cookie("_tidegate_session").unwrap();
        assert!(value.starts_with(TICKET_PREFIX));

        let ticket = Ticket::parse(value).unwrap();
        let stored = cache
            .get_bytes(&ticket.storage_key("_tidegate_session"))
            .await
            .unwrap()
            .unwrap();
        assert!(!String::from_utf8(stored).unwrap().contains("access.abc"));

        let loaded = store.load(&req).await.unwrap().unwrap();
        assert_eq!(loaded.access_token, "access.abc");
    }

    #[tokio::test]
    async fn test_save_reuses_existing_ticket() {
        let (store, _) = test_store();
        let mut req = saved_request(&store).await;
        let before = req.cookie("_tidegate_session").unwrap().to_string();

        let mut session = store.load(&req).await.unwrap().unwrap();
        session.access_token = "access.new".to_string();
        store.save(&mut req, &session).await.unwrap();

        assert_eq!(req.cookie("_tidegate_session").unwrap(), before);
        let loaded = store.load(&req).await.unwrap().unwrap();
        assert_eq!(loaded.access_token, "access.new");
    }

    #[tokio::test]
    async fn test_unknown_or_forged_ticket_is_no_session() {
        let (store, _) = test_store();

        let req = SessionRequest::new().with_cookie("_tidegate_session", Ticket::generate().cookie_value());
        assert!(store.load(&req).await.unwrap().is_none());

        let req = SessionRequest::new().with_cookie("_tidegate_session", "v1-../../etc/passwd");
        assert!(store.load(&req).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_removes_backend_entry() {
        let (store, cache) = test_store();
        let mut req = saved_request(&store).await;
        let ticket = Ticket::parse(req.cookie("_tidegate_session").unwrap()).unwrap();

        store.clear(&mut req).await.unwrap();

        let key = ticket.storage_key("_tidegate_session");
        assert!(cache.get_bytes(&key).await.unwrap().is_none());
        assert_eq!(req.set_cookie_headers().len(), 1);
        assert!(store.load(&req).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cleared_ticket_cannot_be_replayed() {
        let (store, _) = test_store();
        let req = saved_request(&store).await;
        let value = req.cookie("_tidegate_session").unwrap().to_string();

        let mut clearing = SessionRequest::new().with_cookie("_tidegate_session", value.clone());
        store.clear(&mut clearing).await.unwrap();

        let replay = SessionRequest::new().with_cookie("_tidegate_session", value);
        assert!(store.load(&replay).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_load_with_lock_excludes_second_holder() {
        let (store, _) = test_store();
        let mut first = saved_request(&store).await;
        let value = first.cookie("_tidegate_session").unwrap().to_string();
        let mut second = SessionRequest::new().with_cookie("_tidegate_session", value);

        assert!(store.load_with_lock(&mut first).await.unwrap().is_some());
        assert!(first.holds_lock());

        let err = store.load_with_lock(&mut second).await.unwrap_err();
        assert!(err.is_lock_not_obtained());
        assert!(!second.holds_lock());

        // Releasing without holding must not free the first holder's lease
        store.release_lock(&mut second).await.unwrap();
        assert!(store.load_with_lock(&mut second).await.is_err());

        store.release_lock(&mut first).await.unwrap();
        assert!(!first.holds_lock());
        assert!(store.load_with_lock(&mut second).await.unwrap().is_some());
        store.release_lock(&mut second).await.unwrap();
    }

    #[tokio::test]
    async fn test_oversized_lease_fails_without_locking() {
        let config = SessionConfig::builder()
            .cookie_secret(SECRET)
            .lock_lease(Duration::MAX)
            .build();
        let store = PersistentSessionStore::new(
            &config,
            Arc::new(InMemoryCache::new(100)),
            Arc::new(InMemoryLocks::new()),
        )
        .unwrap();
        assert!(store.is_healthy());

        let mut req = saved_request(&store).await;
        let err = store.load_with_lock(&mut req).await.unwrap_err();
        assert!(!err.is_lock_not_obtained());
        assert!(!req.holds_lock());
        store.release_lock(&mut req).await.unwrap();
    }

    #[tokio::test]
    async fn test_load_with_lock_without_ticket() {
        let (store, _) = test_store();
        let mut req = SessionRequest::new();

        assert!(store.load_with_lock(&mut req).await.unwrap().is_none());
        assert!(!req.holds_lock());
    }
}
