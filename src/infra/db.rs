//! Postgres-backed document repository.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{DocumentsRepo, RepoError};
use crate::domain::documents::{DocumentFilter, DocumentRecord, NewDocument};

const SELECT_COLUMNS: &str =
    "id, subject, class_name, school_name, file_url, uploaded_by, created_at";

pub struct PostgresDocuments {
    pool: PgPool,
}

impl PostgresDocuments {
    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(pool).await
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: Uuid,
    subject: String,
    class_name: String,
    school_name: String,
    file_url: String,
    uploaded_by: String,
    created_at: OffsetDateTime,
}

impl From<DocumentRow> for DocumentRecord {
    fn from(row: DocumentRow) -> Self {
        DocumentRecord {
            id: row.id,
            subject: row.subject,
            class_name: row.class_name,
            school_name: row.school_name,
            file_url: row.file_url,
            uploaded_by: row.uploaded_by,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl DocumentsRepo for PostgresDocuments {
    async fn count(&self, filter: &DocumentFilter) -> Result<u64, RepoError> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM documents");
        push_filter(&mut builder, filter);
        let count: i64 = builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(count.max(0) as u64)
    }

    async fn search(
        &self,
        filter: &DocumentFilter,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<DocumentRecord>, RepoError> {
        let mut builder =
            QueryBuilder::new(format!("SELECT {SELECT_COLUMNS} FROM documents"));
        push_filter(&mut builder, filter);
        builder
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(limit as i64)
            .push(" OFFSET ")
            .push_bind(offset as i64);

        let rows: Vec<DocumentRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(rows.into_iter().map(DocumentRecord::from).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<DocumentRecord>, RepoError> {
        let row: Option<DocumentRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM documents WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(row.map(DocumentRecord::from))
    }

    async fn recent(&self, limit: u64) -> Result<Vec<DocumentRecord>, RepoError> {
        let rows: Vec<DocumentRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM documents ORDER BY created_at DESC, id DESC LIMIT $1"
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(rows.into_iter().map(DocumentRecord::from).collect())
    }

    async fn insert(&self, new: NewDocument) -> Result<DocumentRecord, RepoError> {
        let row: DocumentRow = sqlx::query_as(&format!(
            "INSERT INTO documents (id, subject, class_name, school_name, file_url, uploaded_by) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {SELECT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(new.subject)
        .bind(new.class_name)
        .bind(new.school_name)
        .bind(new.file_url)
        .bind(new.uploaded_by)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(row.into())
    }
}

/// Append `WHERE`/`AND` ILIKE clauses for every present filter predicate.
/// Values are bound, with LIKE metacharacters escaped so user input only ever
/// matches as a literal substring.
fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &DocumentFilter) {
    let mut clause = " WHERE ";
    for (column, value) in [
        ("subject", filter.subject.as_deref()),
        ("class_name", filter.class_name.as_deref()),
        ("school_name", filter.school_name.as_deref()),
    ] {
        if let Some(value) = value {
            builder
                .push(clause)
                .push(column)
                .push(" ILIKE ")
                .push_bind(format!("%{}%", escape_like(value)));
            clause = " AND ";
        }
    }
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn map_sqlx(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        other => RepoError::from_persistence(other),
    }
}
