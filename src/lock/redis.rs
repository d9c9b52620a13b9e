use crate::error::{Result, TidegateError};
use crate::traits::lock::{Lock, LockProvider};
use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

/// Extend the lease only while it still carries our token
const REFRESH_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("PEXPIRE", KEYS[1], ARGV[2])
else
    return 0
end
"#;

/// Delete the lease only while it still carries our token
const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// Refresh locks shared through Redis
#[derive(Clone)]
pub struct RedisLocks {
    client: redis::Client,
}

impl RedisLocks {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }
}

impl LockProvider for RedisLocks {
    fn lock(&self, key: &str) -> Box<dyn Lock> {
        Box::new(RedisLock {
            client: self.client.clone(),
            key: format!("{}.lock", key),
            token: Uuid::new_v4().to_string(),
        })
    }
}

/// Lease stored as `<key>.lock` holding this handle's token
pub struct RedisLock {
    client: redis::Client,
    key: String,
    token: String,
}

impl RedisLock {
    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| TidegateError::store(format!("Failed to get Redis connection: {}", e)))
    }

    async fn run_owned(&self, script: &str, expiration: Option<Duration>) -> Result<()> {
        let mut conn = self.get_connection().await?;

        let script = redis::Script::new(script);
        let mut invocation = script.prepare_invoke();
        invocation.key(&self.key).arg(&self.token);
        if let Some(expiration) = expiration {
            invocation.arg(lease_millis(expiration));
        }

        let affected: i64 = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(|e| TidegateError::store(format!("Redis lock script failed: {}", e)))?;

        if affected == 0 {
            Err(TidegateError::NotLocked)
        } else {
            Ok(())
        }
    }
}

fn lease_millis(expiration: Duration) -> u64 {
    u64::try_from(expiration.as_millis().max(1)).unwrap_or(u64::MAX)
}

#[async_trait]
impl Lock for RedisLock {
    async fn obtain(&self, expiration: Duration) -> Result<()> {
        let mut conn = self.get_connection().await?;

        let reply: Option<String> = redis::cmd("SET")
            .arg(&self.key)
            .arg(&self.token)
            .arg("NX")
            .arg("PX")
            .arg(lease_millis(expiration))
            .query_async(&mut conn)
            .await
            .map_err(|e| TidegateError::store(format!("Redis SET NX failed: {}", e)))?;

        match reply {
            Some(_) => Ok(()),
            None => Err(TidegateError::LockNotObtained),
        }
    }

    async fn peek(&self) -> Result<bool> {
        let mut conn = self.get_connection().await?;

        redis::cmd("EXISTS")
            .arg(&self.key)
            .query_async::<bool>(&mut conn)
            .await
            .map_err(|e| TidegateError::store(format!("Redis EXISTS failed: {}", e)))
    }

    async fn refresh(&self, expiration: Duration) -> Result<()> {
        self.run_owned(REFRESH_SCRIPT, Some(expiration)).await
    }

    async fn release(&self) -> Result<()> {
        self.run_owned(RELEASE_SCRIPT, None).await
    }
}
