//! Document API handlers.

use axum::Json;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::domain::documents::{DocumentFilter, NewDocument};

use super::AppState;
use super::error::ApiError;

const DEFAULT_PAGE_SIZE: u32 = 5;
const MAX_PAGE_SIZE: u32 = 100;
const PDF_MAGIC: &[u8] = b"%PDF";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub subject: Option<String>,
    pub class_name: Option<String>,
    pub school_name: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl SearchQuery {
    /// Blank query parameters count as absent predicates, so `?subject=`
    /// builds the same cache key as no `subject` at all.
    fn into_filter_and_page(self) -> (DocumentFilter, u32, u32) {
        let normalize = |value: Option<String>| value.filter(|value| !value.trim().is_empty());
        let filter = DocumentFilter {
            subject: normalize(self.subject),
            class_name: normalize(self.class_name),
            school_name: normalize(self.school_name),
        };
        let page = self.page.unwrap_or(1).max(1);
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        (filter, page, limit)
    }
}

pub async fn search_documents(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (filter, page, limit) = query.into_filter_and_page();
    let envelope = state.documents.search(&filter, page, limit).await?;
    Ok(Json(envelope))
}

pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    match state.documents.get(id).await? {
        Some(view) => Ok(Json(view)),
        None => Err(ApiError::not_found("Document not found")),
    }
}

#[derive(Debug, Default)]
struct UploadForm {
    subject: Option<String>,
    class_name: Option<String>,
    school_name: Option<String>,
    uploaded_by: Option<String>,
    file_name: Option<String>,
    content_type: Option<String>,
    data: Option<Bytes>,
}

pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::upload(format!("invalid multipart payload: {err}")))?
    {
        match field.name() {
            Some("subject") => form.subject = Some(read_text(field).await?),
            Some("className") => form.class_name = Some(read_text(field).await?),
            Some("schoolName") => form.school_name = Some(read_text(field).await?),
            Some("uploadedBy") => form.uploaded_by = Some(read_text(field).await?),
            Some("file") => {
                form.file_name = field.file_name().map(|name| name.to_string());
                form.content_type = field.content_type().map(|value| value.to_string());
                form.data = Some(field.bytes().await.map_err(|err| {
                    ApiError::upload(format!("failed to read uploaded file: {err}"))
                })?);
            }
            _ => {}
        }
    }

    let data = form
        .data
        .ok_or_else(|| ApiError::upload("a `file` part is required"))?;
    let content_type = form.content_type.clone().or_else(|| {
        form.file_name
            .as_deref()
            .and_then(|name| mime_guess::from_path(name).first_raw())
            .map(|mime| mime.to_string())
    });
    validate_pdf(content_type.as_deref(), &data)?;

    let original_name = form.file_name.as_deref().unwrap_or("document.pdf");
    let stored = state
        .assets
        .store(original_name, data)
        .await
        .map_err(|err| ApiError::upload(err.to_string()))?;

    let new = NewDocument {
        subject: form.subject.unwrap_or_default(),
        class_name: form.class_name.unwrap_or_default(),
        school_name: form.school_name.unwrap_or_default(),
        file_url: stored.file_url,
        uploaded_by: form.uploaded_by.unwrap_or_else(|| "academy".to_string()),
    };

    let record = state.documents.create(new).await?;
    let view = state.documents.view_of(record);
    Ok((StatusCode::CREATED, Json(view)))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|err| ApiError::upload(format!("invalid field value: {err}")))
}

/// Only PDFs are accepted: the declared content type (when present) must be
/// `application/pdf` and the payload must carry the PDF magic bytes.
fn validate_pdf(content_type: Option<&str>, data: &[u8]) -> Result<(), ApiError> {
    if let Some(content_type) = content_type
        && content_type != "application/pdf"
    {
        return Err(ApiError::upload("only PDF files are accepted"));
    }
    if !data.starts_with(PDF_MAGIC) {
        return Err(ApiError::upload("uploaded file is not a PDF"));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearCacheResponse {
    pub cleared_count: usize,
}

pub async fn cache_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.trigger.stats().await)
}

pub async fn clear_cache(State(state): State<AppState>) -> impl IntoResponse {
    let cleared_count = state.trigger.clear_search().await;
    Json(ClearCacheResponse { cleared_count })
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
