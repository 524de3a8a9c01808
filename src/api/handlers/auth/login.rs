//! Username/password login.
//!
//! Flow Overview:
//! 1) Resolve the client identifier (the lockout key).
//! 2) Reject with 429 while the identifier is locked, before looking at the
//!    credentials.
//! 3) Compare the credentials; a mismatch counts a failure and returns 401.
//! 4) On a match clear the identifier's failures and return a bearer token.

use axum::{
    extract::{ConnectInfo, Extension},
    http::HeaderMap,
    Json,
};
use std::{net::SocketAddr, sync::Arc};
use tracing::{info, warn};

use super::{
    client_ip::resolve_client_id,
    state::AuthService,
    types::{LoginRequest, LoginResponse},
};
use crate::api::handlers::error::ApiError;

pub async fn login(
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    auth: Extension<Arc<AuthService>>,
    payload: Option<Json<LoginRequest>>,
) -> Result<Json<LoginResponse>, ApiError> {
    let remote = connect_info.map(|ConnectInfo(addr)| addr.ip());
    let client = resolve_client_id(remote, &headers);
    let now = auth.now();

    if auth.is_login_locked(&client, now) {
        warn!(client = %client, "auth.login.locked");
        return Err(ApiError::Locked);
    }

    // Malformed or missing bodies are treated as empty credentials.
    let request = payload.map(|Json(body)| body).unwrap_or_default();
    let user = request.user.trim();
    let password = request.password.trim();

    if !auth.verify_credentials(user, password) {
        let locked = auth.register_login_failure(&client, now);
        let shown_user = if user.is_empty() { "<empty>" } else { user };
        warn!(client = %client, user = %shown_user, locked, "auth.login.failed");
        return Err(ApiError::InvalidCredentials);
    }

    auth.register_login_success(&client);
    let token = auth.issue_token(user);
    info!(client = %client, user = %user, "auth.login.success");

    Ok(Json(LoginResponse {
        ok: true,
        token,
        token_type: "Bearer".to_string(),
        expires_in: auth.config().token_ttl_seconds(),
        user: user.to_string(),
    }))
}
