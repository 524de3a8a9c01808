//! Session check and logout.
//!
//! Tokens are stateless, so logout has nothing to revoke; clients drop the
//! token themselves.

use axum::{extract::Extension, http::HeaderMap, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

use super::{principal::authenticate, state::AuthService, types::SessionResponse};

pub async fn session(headers: HeaderMap, auth: Extension<Arc<AuthService>>) -> impl IntoResponse {
    match authenticate(&headers, &auth) {
        Some(principal) => (
            StatusCode::OK,
            Json(SessionResponse {
                ok: true,
                authenticated: true,
                user: Some(principal.user),
                error: None,
            }),
        ),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(SessionResponse {
                ok: false,
                authenticated: false,
                user: None,
                error: Some("unauthorized".to_string()),
            }),
        ),
    }
}

pub async fn logout() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}
