//! Refresh lock backends

mod in_memory;
#[cfg(feature = "redis")]
mod redis;

pub use in_memory::{InMemoryLock, InMemoryLocks};
#[cfg(feature = "redis")]
pub use self::redis::{RedisLock, RedisLocks};
