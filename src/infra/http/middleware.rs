use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;

use super::error::ApiError;
use super::AppState;

/// Role granted by a presented API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Student,
    Academy,
}

/// Authenticated caller, attached as a request extension.
#[derive(Debug, Clone, Copy)]
pub struct Principal {
    pub role: Role,
}

/// Static key lists loaded from configuration. Academy keys subsume student
/// access; student keys never grant write or admin access.
#[derive(Debug, Default)]
pub struct AuthKeys {
    student_keys: Vec<String>,
    academy_keys: Vec<String>,
}

impl AuthKeys {
    pub fn new(student_keys: Vec<String>, academy_keys: Vec<String>) -> Self {
        Self {
            student_keys,
            academy_keys,
        }
    }

    /// Resolve a presented key to its role, comparing in constant time.
    pub fn authenticate(&self, presented: &str) -> Option<Role> {
        if contains_key(&self.academy_keys, presented) {
            return Some(Role::Academy);
        }
        if contains_key(&self.student_keys, presented) {
            return Some(Role::Student);
        }
        None
    }
}

fn contains_key(keys: &[String], presented: &str) -> bool {
    // Scan the whole list unconditionally so timing does not reveal the
    // position of a match.
    keys.iter().fold(false, |found, key| {
        found | bool::from(key.as_bytes().ct_eq(presented.as_bytes()))
    })
}

/// Gate for read endpoints: any valid key (student or academy).
pub async fn require_student(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    authorize(state, request, next, Role::Student).await
}

/// Gate for upload and admin endpoints: academy keys only.
pub async fn require_academy(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    authorize(state, request, next, Role::Academy).await
}

async fn authorize(
    state: AppState,
    mut request: Request<Body>,
    next: Next,
    required: Role,
) -> Response {
    let token = extract_token(&request);
    let Some(token) = token else {
        return ApiError::unauthorized().into_response();
    };

    let Some(role) = state.auth.authenticate(&token) else {
        return ApiError::unauthorized().into_response();
    };

    if required == Role::Academy && role != Role::Academy {
        return ApiError::forbidden().into_response();
    }

    request.extensions_mut().insert(Principal { role });
    next.run(request).await
}

fn extract_token(request: &Request<Body>) -> Option<String> {
    let bearer = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.strip_prefix("Bearer "))
        .map(|token| token.to_string());
    bearer.or_else(|| {
        request
            .headers()
            .get("x-api-key")
            .and_then(|value| value.to_str().ok())
            .map(|token| token.to_string())
    })
}
