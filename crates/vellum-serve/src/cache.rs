//! In-memory response caching with moka.
//!
//! Server-side caching for expensive read responses (search results,
//! feeds). Each entry stores serialized JSON with its own TTL, so hot
//! endpoints can cache briefly while stable ones cache for minutes.
//!
//! ## Cache Key Strategy
//!
//! Keys include the endpoint name and every query parameter that affects
//! the response, e.g. `search:rust:page=1:limit=10`.

use std::future::Future;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use moka::future::Cache;
use moka::Expiry;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::ApiError;
use vellum_core::metrics;

/// Maximum number of cached responses; moka evicts beyond this.
pub const CACHE_CAPACITY: u64 = 1000;

/// Default TTL for entries inserted without an explicit one.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Cached response with metadata.
#[derive(Clone, Debug)]
pub struct CachedResponse {
    /// Serialized JSON response.
    pub json: String,
    /// When this entry was cached.
    pub cached_at: DateTime<Utc>,
    /// Entry-specific lifetime.
    pub ttl: Duration,
}

/// Per-entry TTL policy: each entry expires `ttl` after insertion.
struct PerEntryTtl;

impl Expiry<String, CachedResponse> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedResponse,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Type alias for the response cache.
pub type ResponseCache = Cache<String, CachedResponse>;

/// Create a new response cache with the standard capacity.
pub fn new_cache() -> ResponseCache {
    Cache::builder()
        .max_capacity(CACHE_CAPACITY)
        .expire_after(PerEntryTtl)
        .build()
}

/// Get a cached value or compute and cache it with the given TTL.
///
/// Expired entries are never returned (moka checks expiry on read). A
/// corrupted cached entry or a serialization failure degrades to
/// recomputing/returning the fresh value rather than failing the request.
pub async fn get_or_compute<T, F, Fut>(
    cache: &ResponseCache,
    key: &str,
    ttl: Duration,
    compute: F,
) -> Result<T, ApiError>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    if let Some(entry) = cache.get(key).await {
        match serde_json::from_str(&entry.json) {
            Ok(value) => {
                tracing::debug!(key = %key, cached_at = %entry.cached_at, "cache hit");
                metrics::record_cache_hit("response");
                return Ok(value);
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "failed to deserialize cached entry");
            }
        }
    }

    tracing::debug!(key = %key, "cache miss, computing");
    metrics::record_cache_miss("response");
    let value = compute().await?;

    match serde_json::to_string(&value) {
        Ok(json) => {
            let entry = CachedResponse {
                json,
                cached_at: Utc::now(),
                ttl,
            };
            cache.insert(key.to_string(), entry).await;
        }
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "failed to serialize for cache");
        }
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cache_hit_skips_compute() {
        let cache = new_cache();

        let result: i32 = get_or_compute(&cache, "k", DEFAULT_TTL, || async { Ok(42) })
            .await
            .unwrap();
        assert_eq!(result, 42);

        let result: i32 = get_or_compute(&cache, "k", DEFAULT_TTL, || async {
            panic!("compute should not run on cache hit")
        })
        .await
        .unwrap();
        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn different_keys_are_independent() {
        let cache = new_cache();
        let a: i32 = get_or_compute(&cache, "a", DEFAULT_TTL, || async { Ok(1) })
            .await
            .unwrap();
        let b: i32 = get_or_compute(&cache, "b", DEFAULT_TTL, || async { Ok(2) })
            .await
            .unwrap();
        assert_eq!((a, b), (1, 2));
    }

    #[tokio::test]
    async fn entries_expire_after_their_ttl() {
        let cache = new_cache();
        cache
            .insert(
                "k".to_string(),
                CachedResponse {
                    json: "1".to_string(),
                    cached_at: Utc::now(),
                    ttl: Duration::from_millis(50),
                },
            )
            .await;

        assert!(cache.get("k").await.is_some());
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(cache.get("k").await.is_none());
    }

    #[tokio::test]
    async fn compute_errors_propagate() {
        let cache = new_cache();
        let result: Result<i32, _> = get_or_compute(&cache, "err", DEFAULT_TTL, || async {
            Err(ApiError::BadRequest("nope".to_string()))
        })
        .await;
        assert!(result.is_err());
        // Failed computes are not cached.
        let ok: i32 = get_or_compute(&cache, "err", DEFAULT_TTL, || async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(ok, 7);
    }
}
