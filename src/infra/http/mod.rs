//! HTTP surface: the document REST API plus health.
//!
//! Read endpoints accept any valid key; upload and the admin cache
//! endpoints require an academy key. The body limit on the upload route
//! comes from configuration.

pub mod error;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, post},
};

use crate::application::documents::DocumentService;
use crate::cache::CacheTrigger;
use crate::infra::assets::AssetStorage;

pub use middleware::{AuthKeys, Principal, Role};

#[derive(Clone)]
pub struct AppState {
    pub documents: Arc<DocumentService>,
    pub trigger: Arc<CacheTrigger>,
    pub assets: Arc<AssetStorage>,
    pub auth: Arc<AuthKeys>,
    pub upload_limit_bytes: usize,
}

pub fn build_router(state: AppState) -> Router {
    let read_routes = Router::new()
        .route("/api/documents/search", get(handlers::search_documents))
        .route("/api/documents/{id}", get(handlers::get_document))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_student,
        ));

    let academy_routes = Router::new()
        .route("/api/documents/upload", post(handlers::upload_document))
        .route("/api/documents/admin/cache-stats", get(handlers::cache_stats))
        .route(
            "/api/documents/admin/clear-cache",
            delete(handlers::clear_cache),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_academy,
        ))
        .layer(DefaultBodyLimit::max(state.upload_limit_bytes));

    Router::new()
        .route("/", get(handlers::health))
        .route("/health", get(handlers::health))
        .merge(read_routes)
        .merge(academy_routes)
        .with_state(state)
}
