use crate::error::{Result, TidegateError};
use crate::traits::lock::{Lock, LockProvider};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
struct Lease {
    holder: Uuid,
    expires_at: Instant,
}

impl Lease {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

fn lease_deadline(now: Instant, expiration: Duration) -> Result<Instant> {
    now.checked_add(expiration).ok_or_else(|| {
        TidegateError::internal(format!("lock lease of {:?} is out of range", expiration))
    })
}

type LeaseTable = Arc<Mutex<HashMap<String, Lease>>>;

/// Process-local refresh locks
///
/// Suitable for a single proxy instance, or for tests. Leases are not
/// visible to other processes.
#[derive(Clone, Default)]
pub struct InMemoryLocks {
    leases: LeaseTable,
}

impl InMemoryLocks {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LockProvider for InMemoryLocks {
    fn lock(&self, key: &str) -> Box<dyn Lock> {
        Box::new(InMemoryLock {
            key: key.to_string(),
            holder: Uuid::new_v4(),
            leases: self.leases.clone(),
        })
    }
}

/// Handle on one key's lease in an [`InMemoryLocks`] table
pub struct InMemoryLock {
    key: String,
    holder: Uuid,
    leases: LeaseTable,
}

#[async_trait]
impl Lock for InMemoryLock {
    async fn obtain(&self, expiration: Duration) -> Result<()> {
        let now = Instant::now();
        let expires_at = lease_deadline(now, expiration)?;
        let mut leases = self.leases.lock().await;

        if leases.get(&self.key).is_some_and(|lease| lease.is_live(now)) {
            return Err(TidegateError::LockNotObtained);
        }

        leases.insert(
            self.key.clone(),
            Lease {
                holder: self.holder,
                expires_at,
            },
        );
        Ok(())
    }

    async fn peek(&self) -> Result<bool> {
        let now = Instant::now();
        let leases = self.leases.lock().await;
        Ok(leases.get(&self.key).is_some_and(|lease| lease.is_live(now)))
    }

    async fn refresh(&self, expiration: Duration) -> Result<()> {
        let now = Instant::now();
        let expires_at = lease_deadline(now, expiration)?;
        let mut leases = self.leases.lock().await;

        match leases.get_mut(&self.key) {
            Some(lease) if lease.holder == self.holder && lease.is_live(now) => {
                lease.expires_at = expires_at;
                Ok(())
            }
            _ => Err(TidegateError::NotLocked),
        }
    }

    async fn release(&self) -> Result<()> {
        let now = Instant::now();
        let mut leases = self.leases.lock().await;

        match leases.get(&self.key).copied() {
            Some(lease) if lease.holder == self.holder => {
                leases.remove(&self.key);
                if lease.is_live(now) {
                    Ok(())
                } else {
                    Err(TidegateError::NotLocked)
                }
            }
            _ => Err(TidegateError::NotLocked),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEASE: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_obtain_is_exclusive() {
        let locks = InMemoryLocks::new();
        let first = locks.lock("session-a");
        let second = locks.lock("session-a");

        first.obtain(LEASE).await.unwrap();
        assert!(first.peek().await.unwrap());
        assert!(second.peek().await.unwrap());

        let err = second.obtain(LEASE).await.unwrap_err();
        assert!(err.is_lock_not_obtained());

        // A holder cannot re-obtain its own live lease either
        assert!(first.obtain(LEASE).await.is_err());
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let locks = InMemoryLocks::new();
        locks.lock("session-a").obtain(LEASE).await.unwrap();
        locks.lock("session-b").obtain(LEASE).await.unwrap();
    }

    #[tokio::test]
    async fn test_release_by_non_holder_leaves_lease_intact() {
        let locks = InMemoryLocks::new();
        let holder = locks.lock("session-a");
        let other = locks.lock("session-a");

        holder.obtain(LEASE).await.unwrap();

        let err = other.release().await.unwrap_err();
        assert!(matches!(err, TidegateError::NotLocked));
        assert!(holder.peek().await.unwrap());

        holder.release().await.unwrap();
        assert!(!other.peek().await.unwrap());
        other.obtain(LEASE).await.unwrap();
    }

    #[tokio::test]
    async fn test_release_without_obtain() {
        let locks = InMemoryLocks::new();
        let lock = locks.lock("session-a");
        assert!(matches!(lock.release().await, Err(TidegateError::NotLocked)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lease_expires_without_release() {
        let locks = InMemoryLocks::new();
        let crashed = locks.lock("session-a");
        let next = locks.lock("session-a");

        crashed.obtain(Duration::from_secs(2)).await.unwrap();
        assert!(next.obtain(LEASE).await.is_err());

        tokio::time::advance(Duration::from_secs(3)).await;

        assert!(!next.peek().await.unwrap());
        next.obtain(LEASE).await.unwrap();

        // The lapsed holder no longer owns anything
        assert!(matches!(crashed.release().await, Err(TidegateError::NotLocked)));
        assert!(next.peek().await.unwrap());
    }

    #[tokio::test]
    async fn test_oversized_lease_is_an_error() {
        let locks = InMemoryLocks::new();
        let lock = locks.lock("session-a");

        let err = lock.obtain(Duration::MAX).await.unwrap_err();
        assert!(matches!(err, TidegateError::Internal(_)));
        assert!(!lock.peek().await.unwrap());

        lock.obtain(LEASE).await.unwrap();
        assert!(matches!(
            lock.refresh(Duration::MAX).await,
            Err(TidegateError::Internal(_))
        ));
        // The existing lease is untouched
        assert!(lock.peek().await.unwrap());
        lock.release().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_extends_own_lease_only() {
        let locks = InMemoryLocks::new();
        let holder = locks.lock("session-a");
        let other = locks.lock("session-a");

        holder.obtain(Duration::from_secs(2)).await.unwrap();
        assert!(matches!(
            other.refresh(LEASE).await,
            Err(TidegateError::NotLocked)
        ));

        tokio::time::advance(Duration::from_secs(1)).await;
        holder.refresh(Duration::from_secs(2)).await.unwrap();

        tokio::time::advance(Duration::from_millis(1500)).await;
        assert!(holder.peek().await.unwrap());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!holder.peek().await.unwrap());
        assert!(holder.refresh(LEASE).await.is_err());
    }
}
