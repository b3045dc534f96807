//! Startup cache warming.
//!
//! Pre-fills the record cache with the most recent documents and the search
//! cache with a configured set of popular filters, so the first requests
//! after a deploy hit warm entries instead of paying the miss latency. The
//! warmer is strictly best-effort: each entry is warmed independently and a
//! failure is logged and skipped, never propagated.

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, info, warn};

use crate::application::documents::DocumentService;
use crate::cache::{CacheConfig, CacheStore, keys};
use crate::domain::documents::DocumentFilter;

pub struct CacheWarmer {
    documents: Arc<DocumentService>,
    store: Arc<dyn CacheStore>,
    config: CacheConfig,
}

impl CacheWarmer {
    pub fn new(
        documents: Arc<DocumentService>,
        store: Arc<dyn CacheStore>,
        config: CacheConfig,
    ) -> Self {
        Self {
            documents,
            store,
            config,
        }
    }

    /// Run one warm-up pass. Intended to be spawned after startup; the
    /// listener never waits on it.
    pub async fn run(&self) {
        if !self.config.enabled {
            debug!("cache disabled, skipping warm-up");
            return;
        }

        let records = self.warm_recent().await;
        let searches = self.warm_popular_searches().await;
        info!(records, searches, "cache warm-up finished");
    }

    /// Warm the record cache with the most recently created documents under
    /// their request-time keys.
    async fn warm_recent(&self) -> usize {
        let records = match self.documents.recent(self.config.warm_recent_limit).await {
            Ok(records) => records,
            Err(error) => {
                warn!(%error, "could not list recent documents for warm-up");
                return 0;
            }
        };

        let mut warmed = 0;
        for record in records {
            let key = keys::record_key(record.id);
            let view = self.documents.view_of(record);
            match serde_json::to_string(&view) {
                Ok(payload) => {
                    self.store.set(&key, &payload, self.config.record_ttl).await;
                    counter!("folio_cache_warmed_total").increment(1);
                    warmed += 1;
                }
                Err(error) => {
                    warn!(key, %error, "could not serialize record for warm-up");
                }
            }
        }
        warmed
    }

    /// Warm the search cache for each configured popular filter, always page
    /// 1 at the warm page size. Keys match what request-time searches build,
    /// so a warmed entry is a genuine hit. Empty result sets are skipped.
    async fn warm_popular_searches(&self) -> usize {
        let mut warmed = 0;
        for filter in &self.config.popular_searches {
            if self.warm_search(filter).await {
                warmed += 1;
            }
        }
        warmed
    }

    async fn warm_search(&self, filter: &DocumentFilter) -> bool {
        let limit = self.config.warm_search_limit;
        let envelope = match self.documents.search_uncached(filter, 1, limit).await {
            Ok(envelope) => envelope,
            Err(error) => {
                warn!(?filter, %error, "popular search warm-up query failed, skipping");
                return false;
            }
        };
        if envelope.data.is_empty() {
            debug!(?filter, "popular search is empty, not warming");
            return false;
        }

        let key = keys::search_key(filter, 1, limit);
        match serde_json::to_string(&envelope) {
            Ok(payload) => {
                self.store.set(&key, &payload, self.config.search_ttl).await;
                counter!("folio_cache_warmed_total").increment(1);
                true
            }
            Err(error) => {
                warn!(key, %error, "could not serialize search envelope for warm-up");
                false
            }
        }
    }
}
