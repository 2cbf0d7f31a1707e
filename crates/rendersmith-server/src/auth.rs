//! Shared-secret authentication for the render routes

use crate::api::{ApiError, AppState};
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;
use tracing::debug;

/// Header carrying the shared secret
pub const API_KEY_HEADER: &str = "x-api-key";

/// Compare a presented key against the expected one in constant time
#[must_use]
pub fn key_matches(expected: &str, provided: Option<&str>) -> bool {
    provided.is_some_and(|provided| bool::from(provided.as_bytes().ct_eq(expected.as_bytes())))
}

/// Reject requests whose `x-api-key` does not match the configured secret.
///
/// With no secret configured every request passes.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.api_key() else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    if key_matches(expected, provided) {
        next.run(request).await
    } else {
        debug!(path = %request.uri().path(), "rejected request with missing or wrong api key");
        ApiError::Unauthorized.into_response()
    }
}
