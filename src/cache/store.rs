//! Cache store implementations.
//!
//! The store is an injected capability behind [`CacheStore`]: Redis in
//! production, a process-local TTL map when no Redis URL is configured and in
//! tests. Every operation is soft-failure — a failed or timed-out `get` is a
//! miss, a failed `set` is logged and dropped. Caching is best-effort and
//! never load-bearing for correctness.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use deadpool_redis::{Config as RedisConfig, CreatePoolError, Pool, Runtime};
use metrics::counter;
use redis::AsyncCommands;
use tracing::{debug, warn};

const SOURCE: &str = "folio::cache::store";

/// TTL-capable string store consumed by the caching layer.
///
/// Implementations absorb their own failures; callers never observe an error,
/// only absence. `set` must attach the given TTL — no entry written through
/// this trait lives forever.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;

    async fn set(&self, key: &str, value: &str, ttl: Duration);

    /// Delete the given keys, returning how many existed.
    async fn delete_many(&self, keys: Vec<String>) -> usize;

    /// List keys matching a glob pattern (`*` wildcard).
    async fn keys_matching(&self, pattern: &str) -> Vec<String>;

    /// Backend diagnostic snapshot for the cache-stats endpoint.
    async fn info(&self) -> Option<String>;
}

// ============================================================================
// Redis store
// ============================================================================

/// Redis-backed store. All calls are bounded by `op_timeout`; a timed-out
/// call is treated as a miss so a hung Redis node degrades latency only.
pub struct RedisStore {
    pool: Pool,
    op_timeout: Duration,
}

impl RedisStore {
    pub fn connect(url: &str, op_timeout: Duration) -> Result<Self, CreatePoolError> {
        let pool = RedisConfig::from_url(url).create_pool(Some(Runtime::Tokio1))?;
        Ok(Self { pool, op_timeout })
    }

    async fn run<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = Result<T, String>> + Send,
    ) -> Option<T> {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(error)) => {
                counter!("folio_cache_store_error_total", "op" => op).increment(1);
                warn!(target: SOURCE, op, error, "redis operation failed, treating as miss");
                None
            }
            Err(_) => {
                counter!("folio_cache_store_error_total", "op" => op).increment(1);
                warn!(
                    target: SOURCE,
                    op,
                    timeout_ms = self.op_timeout.as_millis() as u64,
                    "redis operation timed out, treating as miss"
                );
                None
            }
        }
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Option<String> {
        let pool = self.pool.clone();
        self.run("get", async move {
            let mut conn = pool.get().await.map_err(|err| err.to_string())?;
            conn.get::<_, Option<String>>(key)
                .await
                .map_err(|err| err.to_string())
        })
        .await
        .flatten()
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) {
        let pool = self.pool.clone();
        let seconds = ttl.as_secs().max(1);
        let outcome = self
            .run("set", async move {
                let mut conn = pool.get().await.map_err(|err| err.to_string())?;
                conn.set_ex::<_, _, ()>(key, value, seconds)
                    .await
                    .map_err(|err| err.to_string())
            })
            .await;
        if outcome.is_some() {
            debug!(target: SOURCE, key, ttl_seconds = seconds, "cache entry written");
        }
    }

    async fn delete_many(&self, keys: Vec<String>) -> usize {
        if keys.is_empty() {
            return 0;
        }
        let pool = self.pool.clone();
        self.run("delete_many", async move {
            let mut conn = pool.get().await.map_err(|err| err.to_string())?;
            conn.del::<_, usize>(keys).await.map_err(|err| err.to_string())
        })
        .await
        .unwrap_or(0)
    }

    async fn keys_matching(&self, pattern: &str) -> Vec<String> {
        let pool = self.pool.clone();
        let pattern = pattern.to_string();
        self.run("keys_matching", async move {
            let mut conn = pool.get().await.map_err(|err| err.to_string())?;
            conn.keys::<_, Vec<String>>(pattern)
                .await
                .map_err(|err| err.to_string())
        })
        .await
        .unwrap_or_default()
    }

    async fn info(&self) -> Option<String> {
        let pool = self.pool.clone();
        self.run("info", async move {
            let mut conn = pool.get().await.map_err(|err| err.to_string())?;
            redis::cmd("INFO")
                .arg("stats")
                .query_async::<String>(&mut conn)
                .await
                .map_err(|err| err.to_string())
        })
        .await
    }
}

// ============================================================================
// In-memory store
// ============================================================================

struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

impl MemoryEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Process-local fallback store with the same TTL and pattern semantics as
/// Redis. Used when `cache.redis_url` is unset, and throughout the tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, MemoryEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Option<String> {
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired() {
                return Some(entry.value.clone());
            }
        }
        self.entries.remove_if(key, |_, entry| entry.is_expired());
        None
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) {
        self.entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
    }

    async fn delete_many(&self, keys: Vec<String>) -> usize {
        keys.iter()
            .filter(|key| self.entries.remove(key.as_str()).is_some())
            .count()
    }

    async fn keys_matching(&self, pattern: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|entry| !entry.value().is_expired())
            .filter(|entry| pattern_matches(pattern, entry.key()))
            .map(|entry| entry.key().clone())
            .collect()
    }

    async fn info(&self) -> Option<String> {
        Some(format!("mode=memory entries={}", self.entries.len()))
    }
}

/// Minimal glob matcher supporting the `*` wildcard, mirroring Redis `KEYS`
/// semantics for the patterns this crate uses.
fn pattern_matches(pattern: &str, text: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == text,
        Some((prefix, rest)) => {
            let Some(remainder) = text.strip_prefix(prefix) else {
                return false;
            };
            if rest.is_empty() {
                return true;
            }
            (0..=remainder.len())
                .filter(|index| remainder.is_char_boundary(*index))
                .any(|index| pattern_matches(rest, &remainder[index..]))
        }
    }
}
