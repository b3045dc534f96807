use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tower::ServiceExt;
use uuid::Uuid;

use folio::application::documents::{DocumentService, SearchEnvelope};
use folio::application::repos::{DocumentsRepo, RepoError};
use folio::cache::{CacheConfig, CacheStore, CacheTrigger, MemoryStore};
use folio::domain::documents::{DocumentFilter, DocumentRecord, NewDocument};
use folio::infra::assets::AssetStorage;
use folio::infra::http::{AppState, AuthKeys, build_router};
use folio::infra::signing::UrlSigner;

const STUDENT_KEY: &str = "student-key";
const ACADEMY_KEY: &str = "academy-key";
const BOUNDARY: &str = "----folio-test-boundary";

#[derive(Default)]
struct InMemoryDocuments {
    records: Mutex<Vec<DocumentRecord>>,
}

impl InMemoryDocuments {
    async fn matching(&self, filter: &DocumentFilter) -> Vec<DocumentRecord> {
        let contains = |haystack: &str, needle: &Option<String>| {
            needle
                .as_ref()
                .is_none_or(|needle| haystack.to_lowercase().contains(&needle.to_lowercase()))
        };
        let mut matched: Vec<DocumentRecord> = self
            .records
            .lock()
            .await
            .iter()
            .filter(|record| {
                contains(&record.subject, &filter.subject)
                    && contains(&record.class_name, &filter.class_name)
                    && contains(&record.school_name, &filter.school_name)
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matched
    }
}

#[async_trait]
impl DocumentsRepo for InMemoryDocuments {
    async fn count(&self, filter: &DocumentFilter) -> Result<u64, RepoError> {
        Ok(self.matching(filter).await.len() as u64)
    }

    async fn search(
        &self,
        filter: &DocumentFilter,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<DocumentRecord>, RepoError> {
        Ok(self
            .matching(filter)
            .await
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<DocumentRecord>, RepoError> {
        Ok(self
            .records
            .lock()
            .await
            .iter()
            .find(|record| record.id == id)
            .cloned())
    }

    async fn recent(&self, limit: u64) -> Result<Vec<DocumentRecord>, RepoError> {
        let mut records = self.records.lock().await.clone();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit as usize);
        Ok(records)
    }

    async fn insert(&self, new: NewDocument) -> Result<DocumentRecord, RepoError> {
        let record = DocumentRecord {
            id: Uuid::new_v4(),
            subject: new.subject,
            class_name: new.class_name,
            school_name: new.school_name,
            file_url: new.file_url,
            uploaded_by: new.uploaded_by,
            created_at: OffsetDateTime::now_utc(),
        };
        self.records.lock().await.push(record.clone());
        Ok(record)
    }
}

struct Harness {
    router: Router,
    repo: Arc<InMemoryDocuments>,
    store: Arc<dyn CacheStore>,
    _uploads: tempfile::TempDir,
}

fn build_harness() -> Harness {
    let repo = Arc::new(InMemoryDocuments::default());
    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
    let trigger = Arc::new(CacheTrigger::new(store.clone()));
    let signer = UrlSigner::new("test-secret", Duration::from_secs(3600));

    let documents = Arc::new(DocumentService::new(
        repo.clone(),
        store.clone(),
        trigger.clone(),
        signer,
        CacheConfig::default(),
    ));

    let uploads = tempfile::tempdir().expect("tempdir");
    let assets = Arc::new(
        AssetStorage::new(
            uploads.path().to_path_buf(),
            url::Url::parse("https://cdn.example/assets").expect("url"),
        )
        .expect("asset storage"),
    );

    let auth = Arc::new(AuthKeys::new(
        vec![STUDENT_KEY.to_string()],
        vec![ACADEMY_KEY.to_string()],
    ));

    let state = AppState {
        documents,
        trigger,
        assets,
        auth,
        upload_limit_bytes: 10 * 1024 * 1024,
    };

    Harness {
        router: build_router(state),
        repo,
        store,
        _uploads: uploads,
    }
}

fn get(uri: &str, key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(key) = key {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {key}"));
    }
    builder.body(Body::empty()).expect("request")
}

fn delete(uri: &str, key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("DELETE").uri(uri);
    if let Some(key) = key {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {key}"));
    }
    builder.body(Body::empty()).expect("request")
}

fn multipart_upload(
    key: &str,
    subject: &str,
    class_name: &str,
    school_name: &str,
    file_bytes: &[u8],
    content_type: &str,
) -> Request<Body> {
    let mut body = String::new();
    for (name, value) in [
        ("subject", subject),
        ("className", class_name),
        ("schoolName", school_name),
        ("uploadedBy", "academy@example.com"),
    ] {
        body.push_str(&format!(
            "--{BOUNDARY}\r\ncontent-disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    body.push_str(&format!(
        "--{BOUNDARY}\r\ncontent-disposition: form-data; name=\"file\"; filename=\"notes.pdf\"\r\ncontent-type: {content_type}\r\n\r\n"
    ));
    let mut bytes = body.into_bytes();
    bytes.extend_from_slice(file_bytes);
    bytes.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/documents/upload")
        .header(header::AUTHORIZATION, format!("Bearer {key}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(bytes))
        .expect("request")
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

async fn seed(repo: &InMemoryDocuments, subject: &str) -> DocumentRecord {
    repo.insert(NewDocument {
        subject: subject.to_string(),
        class_name: "10th Grade".to_string(),
        school_name: "ABC Public School".to_string(),
        file_url: "https://cdn.example/assets/raw/upload/v1700000000/2026/01/02/n.pdf"
            .to_string(),
        uploaded_by: "academy@example.com".to_string(),
    })
    .await
    .expect("seed")
}

/// The fire-and-forget fill runs off the request path; poll until it lands.
async fn wait_for_keys(store: &Arc<dyn CacheStore>, pattern: &str, expected: usize) {
    for _ in 0..100 {
        if store.keys_matching(pattern).await.len() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("expected {expected} keys matching `{pattern}`");
}

#[tokio::test]
async fn health_needs_no_key() {
    let harness = build_harness();
    let response = harness
        .router
        .clone()
        .oneshot(get("/", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = harness.router.oneshot(get("/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn read_endpoints_require_a_key() {
    let harness = build_harness();

    let response = harness
        .router
        .clone()
        .oneshot(get("/api/documents/search", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = harness
        .router
        .oneshot(get("/api/documents/search", Some("wrong-key")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn student_key_reads_but_cannot_upload_or_administer() {
    let harness = build_harness();

    let response = harness
        .router
        .clone()
        .oneshot(get("/api/documents/search", Some(STUDENT_KEY)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = harness
        .router
        .clone()
        .oneshot(multipart_upload(
            STUDENT_KEY,
            "Physics",
            "10th Grade",
            "ABC",
            b"%PDF-1.7 payload",
            "application/pdf",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = harness
        .router
        .oneshot(delete("/api/documents/admin/clear-cache", Some(STUDENT_KEY)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn identical_search_is_served_from_cache() {
    let harness = build_harness();
    seed(&harness.repo, "Physics").await;

    let response = harness
        .router
        .clone()
        .oneshot(get("/api/documents/search?subject=Physics", Some(STUDENT_KEY)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let first = json_body(response).await;
    assert_eq!(first["total"], 1);
    wait_for_keys(&harness.store, "pdfs:search:*", 1).await;

    // Mutate the repo behind the cache: the cached page must not notice.
    seed(&harness.repo, "Physics").await;

    let response = harness
        .router
        .oneshot(get("/api/documents/search?subject=Physics", Some(STUDENT_KEY)))
        .await
        .unwrap();
    let second = json_body(response).await;
    assert_eq!(second, first);
}

#[tokio::test]
async fn upload_invalidates_search_but_spares_record_entries() {
    let harness = build_harness();
    let seeded = seed(&harness.repo, "Physics").await;

    // Prime both namespaces.
    let response = harness
        .router
        .clone()
        .oneshot(get("/api/documents/search?subject=Physics", Some(STUDENT_KEY)))
        .await
        .unwrap();
    assert_eq!(json_body(response).await["total"], 1);
    let response = harness
        .router
        .clone()
        .oneshot(get(
            &format!("/api/documents/{}", seeded.id),
            Some(STUDENT_KEY),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    wait_for_keys(&harness.store, "pdfs:search:*", 1).await;
    wait_for_keys(&harness.store, "pdf:*", 1).await;

    let response = harness
        .router
        .clone()
        .oneshot(multipart_upload(
            ACADEMY_KEY,
            "Physics",
            "10th Grade",
            "ABC Public School",
            b"%PDF-1.7 payload",
            "application/pdf",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // Search entries are gone, the record entry survives.
    assert!(harness.store.keys_matching("pdfs:search:*").await.is_empty());
    assert_eq!(harness.store.keys_matching("pdf:*").await.len(), 1);

    // The next search recomputes and sees both documents.
    let response = harness
        .router
        .oneshot(get("/api/documents/search?subject=Physics", Some(STUDENT_KEY)))
        .await
        .unwrap();
    assert_eq!(json_body(response).await["total"], 2);
}

#[tokio::test]
async fn upload_rejects_non_pdf_and_blank_fields() {
    let harness = build_harness();

    let response = harness
        .router
        .clone()
        .oneshot(multipart_upload(
            ACADEMY_KEY,
            "Physics",
            "10th Grade",
            "ABC",
            b"PK\x03\x04 zip bytes",
            "application/zip",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = harness
        .router
        .oneshot(multipart_upload(
            ACADEMY_KEY,
            "Physics",
            "   ",
            "ABC",
            b"%PDF-1.7 payload",
            "application/pdf",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["message"], "className is required");
}

#[tokio::test]
async fn uploaded_document_carries_a_signed_url() {
    let harness = build_harness();

    let response = harness
        .router
        .oneshot(multipart_upload(
            ACADEMY_KEY,
            "Chemistry",
            "12th Grade",
            "ABC Public School",
            b"%PDF-1.7 payload",
            "application/pdf",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = json_body(response).await;
    let url = body["fileUrl"].as_str().expect("fileUrl");
    assert!(url.contains("/upload/s--"), "expected signed url, got {url}");
    assert_eq!(body["subject"], "Chemistry");
}

#[tokio::test]
async fn missing_document_is_404_and_not_cached() {
    let harness = build_harness();

    let response = harness
        .router
        .oneshot(get(
            &format!("/api/documents/{}", Uuid::new_v4()),
            Some(STUDENT_KEY),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(harness.store.keys_matching("pdf:*").await.is_empty());
}

#[tokio::test]
async fn clear_cache_reports_how_many_entries_went() {
    let harness = build_harness();
    seed(&harness.repo, "Physics").await;
    seed(&harness.repo, "Chemistry").await;

    for subject in ["Physics", "Chemistry"] {
        let response = harness
            .router
            .clone()
            .oneshot(get(
                &format!("/api/documents/search?subject={subject}"),
                Some(STUDENT_KEY),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    wait_for_keys(&harness.store, "pdfs:search:*", 2).await;

    let response = harness
        .router
        .clone()
        .oneshot(delete("/api/documents/admin/clear-cache", Some(ACADEMY_KEY)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["clearedCount"], 2);

    let response = harness
        .router
        .oneshot(get("/api/documents/admin/cache-stats", Some(ACADEMY_KEY)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["totalKeys"], 0);
}

#[tokio::test]
async fn cached_search_envelope_deserializes_to_the_public_shape() {
    let harness = build_harness();
    seed(&harness.repo, "Physics").await;

    let response = harness
        .router
        .oneshot(get("/api/documents/search?subject=Physics", Some(STUDENT_KEY)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    wait_for_keys(&harness.store, "pdfs:search:*", 1).await;

    let key = harness
        .store
        .keys_matching("pdfs:search:*")
        .await
        .pop()
        .expect("cached key");
    let cached = harness.store.get(&key).await.expect("cached value");
    let envelope: SearchEnvelope = serde_json::from_str(&cached).expect("envelope");
    assert_eq!(envelope.total, 1);
    assert_eq!(envelope.data.len(), 1);
}
