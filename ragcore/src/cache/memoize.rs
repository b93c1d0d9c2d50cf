//! Memoization decorator: wraps an async computation in a cache lookup
//! keyed by `"{prefix}:{fn_name}:{hex(hash(args))}"`.

use super::Cache;
use crate::error::CacheError;
use std::collections::hash_map::DefaultHasher;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::time::Duration;

fn cache_key(prefix: &str, fn_name: &str, args: &impl Hash) -> String {
    let mut hasher = DefaultHasher::new();
    args.hash(&mut hasher);
    format!("{prefix}:{fn_name}:{:016x}", hasher.finish())
}

/// Runs `compute` only on a cache miss; a hit returns the cached string directly.
///
/// `args` must hash deterministically across calls with the same logical
/// input (it does not need to be `Eq`, only `Hash`).
pub async fn memoize<C, A, F, Fut>(
    cache: &C,
    prefix: &str,
    fn_name: &str,
    args: &A,
    ttl: Option<Duration>,
    compute: F,
) -> Result<String, CacheError>
where
    C: Cache<String, String>,
    A: Hash,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<String, CacheError>>,
{
    let key = cache_key(prefix, fn_name, args);
    if let Some(hit) = cache.get(&key).await {
        return Ok(hit);
    }
    let value = compute().await?;
    cache.set(key, value.clone(), ttl).await?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn second_call_with_same_args_hits_cache() {
        let cache = InMemoryCache::new();
        let calls = AtomicU32::new(0);

        let run = |q: &str| {
            let calls = &calls;
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, CacheError>(format!("answer to {q}"))
            }
        };

        let a = memoize(&cache, "answer", "route", &"what is gdpr", None, || run("what is gdpr"))
            .await
            .unwrap();
        let b = memoize(&cache, "answer", "route", &"what is gdpr", None, || run("what is gdpr"))
            .await
            .unwrap();

        assert_eq!(a, b);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_args_produce_different_keys() {
        let cache = InMemoryCache::new();
        memoize(&cache, "p", "f", &"a", None, || async { Ok::<_, CacheError>("1".to_string()) })
            .await
            .unwrap();
        memoize(&cache, "p", "f", &"b", None, || async { Ok::<_, CacheError>("2".to_string()) })
            .await
            .unwrap();
        assert_eq!(cache.stats().sets, 2);
    }
}
