//! Document service: cached search and lookup plus the write path.
//!
//! The search and single-record accessors apply the cache key builder, the
//! signed-URL resolver and the read-through wrapper together with their
//! domain TTLs. The write path persists a document and then synchronously
//! fires search invalidation before the caller sees its response.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::repos::DocumentsRepo;
use crate::cache::{CacheConfig, CacheStore, CacheTrigger, keys, read_through};
use crate::domain::documents::{DocumentFilter, DocumentRecord, NewDocument};
use crate::infra::signing::UrlSigner;

/// Paginated search response. This exact shape is what gets cached, so a hit
/// is byte-identical to the miss that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchEnvelope {
    pub total: u64,
    pub page: u32,
    pub total_pages: u64,
    pub data: Vec<DocumentView>,
}

/// Point-in-time projection of a document with its permanent asset reference
/// replaced by a freshly signed, time-limited URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentView {
    pub id: Uuid,
    pub subject: String,
    pub class_name: String,
    pub school_name: String,
    pub file_url: String,
    pub uploaded_by: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

pub struct DocumentService {
    repo: Arc<dyn DocumentsRepo>,
    store: Arc<dyn CacheStore>,
    trigger: Arc<CacheTrigger>,
    signer: UrlSigner,
    config: CacheConfig,
}

impl DocumentService {
    pub fn new(
        repo: Arc<dyn DocumentsRepo>,
        store: Arc<dyn CacheStore>,
        trigger: Arc<CacheTrigger>,
        signer: UrlSigner,
        config: CacheConfig,
    ) -> Self {
        Self {
            repo,
            store,
            trigger,
            signer,
            config,
        }
    }

    pub fn cache_config(&self) -> &CacheConfig {
        &self.config
    }

    /// Render a record for a response, signing its asset reference.
    pub fn view_of(&self, record: DocumentRecord) -> DocumentView {
        let signed = self.signer.sign(&record.file_url);
        DocumentView {
            id: record.id,
            subject: record.subject,
            class_name: record.class_name,
            school_name: record.school_name,
            file_url: signed.url,
            uploaded_by: record.uploaded_by,
            created_at: record.created_at,
        }
    }

    /// Search accessor: read-through on the search namespace, TTL 3600s.
    pub async fn search(
        &self,
        filter: &DocumentFilter,
        page: u32,
        limit: u32,
    ) -> Result<SearchEnvelope, AppError> {
        if !self.config.enabled {
            return self.search_uncached(filter, page, limit).await;
        }

        let key = keys::search_key(filter, page, limit);
        let envelope = read_through(&self.store, &key, self.config.search_ttl, async || {
            self.search_uncached(filter, page, limit).await.map(Some)
        })
        .await?;
        // The miss path always yields an envelope; an empty page still counts.
        Ok(envelope.unwrap_or_else(|| SearchEnvelope {
            total: 0,
            page,
            total_pages: 0,
            data: Vec::new(),
        }))
    }

    /// The search miss path: count, fetch one page, sign every record and
    /// assemble the envelope. The warmer calls this directly to pre-fill
    /// popular searches under the exact request-time keys.
    pub async fn search_uncached(
        &self,
        filter: &DocumentFilter,
        page: u32,
        limit: u32,
    ) -> Result<SearchEnvelope, AppError> {
        let page = page.max(1);
        let limit = limit.max(1);
        let offset = u64::from(page - 1) * u64::from(limit);

        let total = self.repo.count(filter).await?;
        let records = self.repo.search(filter, offset, u64::from(limit)).await?;
        let data = records
            .into_iter()
            .map(|record| self.view_of(record))
            .collect();

        Ok(SearchEnvelope {
            total,
            page,
            total_pages: total.div_ceil(u64::from(limit)),
            data,
        })
    }

    /// Single-record accessor: read-through on the record namespace, TTL
    /// 3000s (strictly below the signed-URL lifetime). Absence is returned
    /// uncached so a later upload under the same id is visible immediately.
    pub async fn get(&self, id: Uuid) -> Result<Option<DocumentView>, AppError> {
        if !self.config.enabled {
            return self.get_uncached(id).await;
        }

        let key = keys::record_key(id);
        read_through(&self.store, &key, self.config.record_ttl, async || {
            self.get_uncached(id).await
        })
        .await
    }

    async fn get_uncached(&self, id: Uuid) -> Result<Option<DocumentView>, AppError> {
        let record = self.repo.find_by_id(id).await?;
        Ok(record.map(|record| self.view_of(record)))
    }

    /// Persist a new document and invalidate the search caches before
    /// returning, so the writer's next search already reflects the write.
    pub async fn create(&self, new: NewDocument) -> Result<DocumentRecord, AppError> {
        new.validate().map_err(AppError::validation)?;
        let record = self.repo.insert(new).await?;
        self.trigger.invalidate_search().await;
        Ok(record)
    }

    /// Most recently created records, for the warmer.
    pub async fn recent(&self, limit: u64) -> Result<Vec<DocumentRecord>, AppError> {
        Ok(self.repo.recent(limit).await?)
    }
}
