//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::documents::{DocumentFilter, DocumentRecord, NewDocument};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Query interface over the document store. The cache layer treats this as
/// the authoritative (uncached) source of truth.
#[async_trait]
pub trait DocumentsRepo: Send + Sync {
    /// Count documents matching the filter.
    async fn count(&self, filter: &DocumentFilter) -> Result<u64, RepoError>;

    /// Fetch one page of matching documents, newest first.
    async fn search(
        &self,
        filter: &DocumentFilter,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<DocumentRecord>, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<DocumentRecord>, RepoError>;

    /// The `limit` most recently created documents, for cache warming.
    async fn recent(&self, limit: u64) -> Result<Vec<DocumentRecord>, RepoError>;

    async fn insert(&self, new: NewDocument) -> Result<DocumentRecord, RepoError>;
}
