//! Admin-route authentication and CSRF enforcement for state-changing
//! endpoints.
//!
//! Reads the env vars named by `config.admin.token_env` /
//! `config.admin.csrf_secret_env` **once at startup** (see
//! [`crate::bootstrap::build_state`]) and caches their SHA-256 digests in
//! `AppState`. If a secret is unset, the corresponding check is skipped —
//! dev mode — and a startup warning is logged once instead.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::state::AppState;

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        axum::Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

/// Axum middleware guarding `/api/admin/*`. Attach via
/// `axum::middleware::from_fn_with_state`.
pub async fn require_admin_token(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let expected_hash = match &state.admin_token_hash {
        Some(h) => h,
        None => return next.run(req).await,
    };

    let provided = req
        .headers()
        .get("authorization")
        .and_then(|v: &HeaderValue| v.to_str().ok())
        .and_then(|v: &str| v.strip_prefix("Bearer "))
        .unwrap_or("");

    let provided_hash = Sha256::digest(provided.as_bytes());
    if !bool::from(provided_hash.ct_eq(expected_hash.as_slice())) {
        return unauthorized("invalid or missing admin token");
    }

    next.run(req).await
}

/// Axum middleware guarding non-idempotent `/api/chats/*` writes: requires
/// an `X-CSRF-Token` header whose SHA-256 digest matches `csrf_secret`.
/// Skipped when no secret is configured (dev mode).
pub async fn require_csrf_token(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let expected_hash = match &state.csrf_secret {
        Some(h) => h,
        None => return next.run(req).await,
    };

    let provided = req
        .headers()
        .get("x-csrf-token")
        .and_then(|v: &HeaderValue| v.to_str().ok())
        .unwrap_or("");

    let provided_hash = Sha256::digest(provided.as_bytes());
    if !bool::from(provided_hash.ct_eq(expected_hash.as_slice())) {
        return unauthorized("missing or invalid X-CSRF-Token");
    }

    next.run(req).await
}
