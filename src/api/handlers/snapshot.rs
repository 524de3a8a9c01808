//! Combined tmux + network snapshot.

use axum::{extract::Extension, http::HeaderMap, Json};
use serde::Serialize;
use std::sync::Arc;

use super::{
    auth::{principal::require_auth, AuthService},
    error::ApiError,
};
use crate::{
    api::Settings,
    tmux::{Collector, NetworkState, TmuxState},
};

#[derive(Serialize, Debug)]
pub struct Snapshot {
    pub tmux: TmuxState,
    pub network: NetworkState,
    pub allowed_actions: Vec<String>,
}

pub async fn snapshot(
    headers: HeaderMap,
    auth: Extension<Arc<AuthService>>,
    collector: Extension<Arc<dyn Collector>>,
    settings: Extension<Arc<Settings>>,
) -> Result<Json<Snapshot>, ApiError> {
    require_auth(&headers, &auth)?;

    let (tmux, network) = tokio::join!(collector.tmux_state(), collector.network_state());
    Ok(Json(Snapshot {
        tmux,
        network,
        // BTreeSet iterates in sorted order.
        allowed_actions: settings.allowed_actions.iter().cloned().collect(),
    }))
}
