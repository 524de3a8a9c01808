use axum::{
    extract::{Extension, Path},
    http::HeaderMap,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use super::{
    auth::{principal::require_auth, AuthService},
    error::ApiError,
};
use crate::tmux::{Collector, PaneDetail};

#[derive(Serialize, Debug)]
pub struct PaneResponse {
    pub ok: bool,
    #[serde(flatten)]
    pub detail: PaneDetail,
}

pub async fn pane_detail(
    Path(pane_id): Path<String>,
    headers: HeaderMap,
    auth: Extension<Arc<AuthService>>,
    collector: Extension<Arc<dyn Collector>>,
) -> Result<Json<PaneResponse>, ApiError> {
    require_auth(&headers, &auth)?;

    let detail = collector
        .pane_detail(&pane_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("pane '{pane_id}' not found")))?;

    Ok(Json(PaneResponse { ok: true, detail }))
}
