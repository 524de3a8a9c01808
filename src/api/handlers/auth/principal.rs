//! Authenticated principal extraction.
//!
//! Protected handlers call [`require_auth`] first; an absent, malformed,
//! tampered or expired bearer token all collapse into the same 401.

use axum::http::{header::AUTHORIZATION, HeaderMap};

use super::state::AuthService;
use crate::api::handlers::error::ApiError;

/// Authenticated caller resolved from the bearer token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub user: String,
}

/// Resolve the `Authorization` header into a principal, or 401.
pub fn require_auth(headers: &HeaderMap, auth: &AuthService) -> Result<Principal, ApiError> {
    authenticate(headers, auth).ok_or(ApiError::Unauthorized)
}

pub(crate) fn authenticate(headers: &HeaderMap, auth: &AuthService) -> Option<Principal> {
    let header = headers.get(AUTHORIZATION)?.to_str().ok()?;
    auth.authenticate_bearer_token(header)
        .map(|user| Principal { user })
}
