//! Write-path invalidation and cache administration.

use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use tracing::info;

use super::keys::SEARCH_PATTERN;
use super::store::CacheStore;

const SOURCE: &str = "folio::cache::trigger";

/// Diagnostic snapshot returned by the admin cache-stats endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub total_keys: usize,
    pub info: Option<String>,
}

/// Deletes stale search entries when the underlying document set changes.
///
/// Invalidation is deliberately coarse: any successful write drops every key
/// under the search namespace, trading hit rate for the guarantee that no
/// stale page can linger under an un-invalidated key. Single-record entries
/// are untouched — a new document has no stale record entry to remove.
pub struct CacheTrigger {
    store: Arc<dyn CacheStore>,
}

impl CacheTrigger {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Fired synchronously after a document is persisted, before the writer
    /// receives its response. Returns the number of entries removed.
    pub async fn invalidate_search(&self) -> usize {
        let keys = self.store.keys_matching(SEARCH_PATTERN).await;
        let deleted = self.store.delete_many(keys).await;
        if deleted > 0 {
            counter!("folio_cache_invalidated_total").increment(deleted as u64);
            info!(target: SOURCE, deleted, "cleared search cache after write");
        }
        deleted
    }

    /// Admin clear-cache endpoint; same coarse deletion as a write.
    pub async fn clear_search(&self) -> usize {
        self.invalidate_search().await
    }

    pub async fn stats(&self) -> CacheStats {
        let total_keys = self.store.keys_matching("*").await.len();
        let info = self.store.info().await;
        CacheStats { total_keys, info }
    }
}
