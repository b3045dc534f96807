//! Generic read-through cache wrapper.
//!
//! Lookup happens before the underlying computation; on a hit the stored JSON
//! is deserialized and returned without recomputing. On a miss the computation
//! runs, its result is returned to the caller unchanged, and the store write
//! happens on a detached task — never on the response critical path, with
//! failures absorbed by the store. Absent results (`Ok(None)`) are returned
//! but never cached; there is no negative caching.
//!
//! Concurrent misses for the same key are not coalesced: each caller computes
//! independently and last write wins, which the store's atomicity makes safe.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::store::CacheStore;

const SOURCE: &str = "folio::cache::read_through";

pub async fn read_through<T, E, F>(
    store: &Arc<dyn CacheStore>,
    key: &str,
    ttl: Duration,
    compute: F,
) -> Result<Option<T>, E>
where
    T: Serialize + DeserializeOwned + Send + 'static,
    F: AsyncFnOnce() -> Result<Option<T>, E>,
{
    if let Some(raw) = store.get(key).await {
        match serde_json::from_str::<T>(&raw) {
            Ok(value) => {
                counter!("folio_cache_hit_total").increment(1);
                debug!(target: SOURCE, key, "cache hit");
                return Ok(Some(value));
            }
            Err(error) => {
                // Drop the undecodable entry at once so readers stop
                // re-parsing it while the recompute is in flight.
                warn!(target: SOURCE, key, error = %error, "undecodable cache entry, recomputing");
                store.delete_many(vec![key.to_string()]).await;
            }
        }
    }

    counter!("folio_cache_miss_total").increment(1);
    debug!(target: SOURCE, key, "cache miss, running underlying query");

    let computed = compute().await?;
    if let Some(value) = &computed {
        fill(store, key, value, ttl);
    }
    Ok(computed)
}

/// Queue a fire-and-forget store write. The caller's response does not wait
/// for it; serialization failures are logged and dropped.
fn fill<T: Serialize>(store: &Arc<dyn CacheStore>, key: &str, value: &T, ttl: Duration) {
    let payload = match serde_json::to_string(value) {
        Ok(payload) => payload,
        Err(error) => {
            counter!("folio_cache_fill_error_total").increment(1);
            warn!(target: SOURCE, key, error = %error, "failed to serialize cache fill");
            return;
        }
    };
    let store = Arc::clone(store);
    let key = key.to_string();
    tokio::spawn(async move {
        store.set(&key, &payload, ttl).await;
    });
}
