//! Cache system for LLM calls and other expensive operations.
//!
//! Provides caching for retrieval and LLM results so repeated questions
//! (or repeated sub-steps of the same question) don't re-hit an external
//! service. A thin `memoize` decorator wraps any async function in a
//! cache lookup keyed by its name and argument hash.

mod in_memory;
mod memoize;

pub use in_memory::{CacheStats, InMemoryCache};
pub use memoize::memoize;

use crate::error::CacheError;
use async_trait::async_trait;
use std::time::Duration;

/// Cache trait for key-value storage with optional TTL.
#[async_trait]
pub trait Cache<K, V>: Send + Sync
where
    K: Send + Sync,
    V: Clone + Send + Sync,
{
    /// Returns `None` if the key is not present or has expired.
    async fn get(&self, key: &K) -> Option<V>;

    /// Sets a value. `ttl = None` means the entry never expires.
    async fn set(&self, key: K, value: V, ttl: Option<Duration>) -> Result<(), CacheError>;

    async fn delete(&self, key: &K) -> Result<(), CacheError>;

    async fn clear(&self) -> Result<(), CacheError>;
}
