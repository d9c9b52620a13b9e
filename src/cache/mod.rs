//! Storage backends for server-side sessions.
//!
//! Provides an in-memory backend by default, with optional Redis support
//! via the `redis` feature.

mod in_memory;

#[cfg(feature = "redis")]
mod redis;

pub use in_memory::InMemoryCache;

#[cfg(feature = "redis")]
pub use self::redis::RedisCache;
