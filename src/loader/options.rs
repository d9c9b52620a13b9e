use crate::traits::provider::SessionProvider;
use crate::traits::session::SessionStore;
use std::sync::Arc;
use std::time::Duration;

/// How long a request waits for another instance's refresh to land
///
/// After losing the race for a session's refresh lock, the loader re-reads
/// the session up to `attempts` times, `interval` apart. If the session is
/// still stale after that, the request proceeds without one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshRetryPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl RefreshRetryPolicy {
    pub fn new(attempts: u32, interval: Duration) -> Self {
        Self { attempts, interval }
    }
}

impl Default for RefreshRetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            interval: Duration::from_millis(100),
        }
    }
}

/// Everything a [`StoredSessionLoader`] needs
///
/// [`StoredSessionLoader`]: super::StoredSessionLoader
#[derive(Clone)]
pub struct StoredSessionLoaderOptions {
    /// Where sessions are kept between requests
    pub store: Arc<dyn SessionStore>,

    /// Minimum session age before it is refreshed or re-validated
    ///
    /// Zero disables both.
    pub refresh_period: Duration,

    /// Provider callbacks for refresh and validation
    pub provider: Arc<dyn SessionProvider>,

    pub retry: RefreshRetryPolicy,
}

impl StoredSessionLoaderOptions {
    pub fn new(store: Arc<dyn SessionStore>, provider: Arc<dyn SessionProvider>) -> Self {
        Self {
            store,
            refresh_period: Duration::ZERO,
            provider,
            retry: RefreshRetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn refresh_period(mut self, period: Duration) -> Self {
        self.refresh_period = period;
        self
    }

    #[must_use]
    pub fn retry(mut self, retry: RefreshRetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
