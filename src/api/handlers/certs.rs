//! Certificate dashboard routes.
//!
//! Everything except `GET /api/certs/distribution/:token` requires a bearer
//! token; the authenticated user is recorded as the audit actor. The store
//! does blocking file I/O, so calls run on the blocking pool.

use axum::{
    extract::{Extension, Path},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

use super::{
    auth::{principal::require_auth, AuthService},
    error::ApiError,
};
use crate::certs::{CertStore, CertStoreError, IssueDetails, NewRequest};

const DEFAULT_LINK_TTL_SEC: i64 = 3600;

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct CreateRequestBody {
    pub device_name: String,
    pub platform: String,
    pub note: String,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct MarkIssuedBody {
    pub issued_at: String,
    pub expires_at: String,
    pub cert_cn: String,
}

#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct CreateLinkBody {
    pub request_id: String,
    pub expires_in_sec: i64,
    pub note: String,
}

impl Default for CreateLinkBody {
    fn default() -> Self {
        Self {
            request_id: String::new(),
            expires_in_sec: DEFAULT_LINK_TTL_SEC,
            note: String::new(),
        }
    }
}

type Store = Extension<Arc<CertStore>>;

async fn with_store<T, F>(store: &Arc<CertStore>, op: F) -> Result<T, ApiError>
where
    F: FnOnce(&CertStore) -> Result<T, CertStoreError> + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || op(&store))
        .await
        .map_err(|err| {
            error!("Cert store task failed: {err}");
            ApiError::Internal
        })?
        .map_err(|err| {
            error!("Cert store error: {err}");
            ApiError::Internal
        })
}

fn body<T: Default>(payload: Option<Json<T>>) -> T {
    payload.map(|Json(body)| body).unwrap_or_default()
}

pub async fn list_devices(
    headers: HeaderMap,
    auth: Extension<Arc<AuthService>>,
    store: Store,
) -> Result<Json<Value>, ApiError> {
    require_auth(&headers, &auth)?;
    let devices = with_store(&store, |store| Ok(store.list_devices())).await?;
    Ok(Json(json!({ "ok": true, "devices": devices })))
}

pub async fn list_requests(
    headers: HeaderMap,
    auth: Extension<Arc<AuthService>>,
    store: Store,
) -> Result<Json<Value>, ApiError> {
    require_auth(&headers, &auth)?;
    let requests = with_store(&store, |store| Ok(store.list_requests())).await?;
    Ok(Json(json!({ "ok": true, "requests": requests })))
}

pub async fn create_request(
    headers: HeaderMap,
    auth: Extension<Arc<AuthService>>,
    store: Store,
    payload: Option<Json<CreateRequestBody>>,
) -> Result<Json<Value>, ApiError> {
    let principal = require_auth(&headers, &auth)?;
    let body = body(payload);
    let device_name = body.device_name.trim().to_string();
    if device_name.is_empty() {
        return Err(ApiError::BadRequest("device_name is required".to_string()));
    }

    let actor = principal.user.clone();
    let request = with_store(&store, move |store| {
        store.create_request(
            &actor,
            &NewRequest {
                device_name: &device_name,
                platform: body.platform.trim(),
                note: body.note.trim(),
            },
        )
    })
    .await?;
    info!(user = %principal.user, request_id = %request.id, "certs.request.create");
    Ok(Json(json!({ "ok": true, "request": request })))
}

pub async fn mark_issued(
    Path(request_id): Path<String>,
    headers: HeaderMap,
    auth: Extension<Arc<AuthService>>,
    store: Store,
    payload: Option<Json<MarkIssuedBody>>,
) -> Result<Json<Value>, ApiError> {
    let principal = require_auth(&headers, &auth)?;
    let body = body(payload);
    if body.issued_at.trim().is_empty() || body.expires_at.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "issued_at and expires_at are required".to_string(),
        ));
    }

    let actor = principal.user;
    let id = request_id.clone();
    let request = with_store(&store, move |store| {
        store.mark_request_issued(
            &actor,
            &id,
            &IssueDetails {
                issued_at: body.issued_at.trim(),
                expires_at: body.expires_at.trim(),
                cert_cn: body.cert_cn.trim(),
            },
        )
    })
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("request '{request_id}' not found")))?;
    Ok(Json(json!({ "ok": true, "request": request })))
}

pub async fn list_links(
    headers: HeaderMap,
    auth: Extension<Arc<AuthService>>,
    store: Store,
) -> Result<Json<Value>, ApiError> {
    require_auth(&headers, &auth)?;
    let links = with_store(&store, CertStore::list_links).await?;
    Ok(Json(json!({ "ok": true, "links": links })))
}

pub async fn create_link(
    headers: HeaderMap,
    auth: Extension<Arc<AuthService>>,
    store: Store,
    payload: Option<Json<CreateLinkBody>>,
) -> Result<Json<Value>, ApiError> {
    let principal = require_auth(&headers, &auth)?;
    let body = body(payload);
    let request_id = body.request_id.trim().to_string();
    if request_id.is_empty() {
        return Err(ApiError::BadRequest("request_id is required".to_string()));
    }

    let actor = principal.user.clone();
    let id = request_id.clone();
    let link = with_store(&store, move |store| {
        store.create_distribution_link(&actor, &id, body.expires_in_sec, body.note.trim())
    })
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("request '{request_id}' not found")))?;
    info!(user = %principal.user, link_id = %link.id, "certs.link.create");
    Ok(Json(json!({ "ok": true, "link": link })))
}

pub async fn revoke_link(
    Path(link_id): Path<String>,
    headers: HeaderMap,
    auth: Extension<Arc<AuthService>>,
    store: Store,
) -> Result<Json<Value>, ApiError> {
    let principal = require_auth(&headers, &auth)?;
    let actor = principal.user;
    let id = link_id.clone();
    let link = with_store(&store, move |store| store.revoke_link(&actor, &id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("link '{link_id}' not found")))?;
    Ok(Json(json!({ "ok": true, "link": link })))
}

pub async fn list_audit(
    headers: HeaderMap,
    auth: Extension<Arc<AuthService>>,
    store: Store,
) -> Result<Json<Value>, ApiError> {
    require_auth(&headers, &auth)?;
    let audit = with_store(&store, |store| Ok(store.list_audit())).await?;
    Ok(Json(json!({ "ok": true, "audit": audit })))
}

/// Unauthenticated: the token in the path is the credential.
pub async fn distribution(
    Path(token): Path<String>,
    store: Store,
) -> Result<Json<Value>, ApiError> {
    let distribution = with_store(&store, move |store| {
        store.resolve_distribution_token(token.trim())
    })
    .await?
    .ok_or_else(|| ApiError::NotFound("distribution link not found".to_string()))?;
    Ok(Json(json!({ "ok": true, "distribution": distribution })))
}
