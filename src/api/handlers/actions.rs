//! Control actions.
//!
//! Only actions in the configured allow-list run. A failed action answers
//! 400 with the coarse error code only; tmux's stdout/stderr are logged here
//! and never returned.

use axum::{
    extract::{Extension, Path},
    http::HeaderMap,
    Json,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use super::{
    auth::{principal::require_auth, AuthService},
    error::ApiError,
};
use crate::{
    api::Settings,
    tmux::{ActionExecutor, ActionOutput},
};

pub async fn run_action(
    Path(action): Path<String>,
    headers: HeaderMap,
    auth: Extension<Arc<AuthService>>,
    executor: Extension<Arc<dyn ActionExecutor>>,
    settings: Extension<Arc<Settings>>,
    payload: Option<Json<Value>>,
) -> Result<Json<ActionOutput>, ApiError> {
    let principal = require_auth(&headers, &auth)?;

    if !settings.allowed_actions.contains(&action) {
        return Err(ApiError::ActionDisabled(action));
    }

    let payload = match payload {
        Some(Json(value @ Value::Object(_))) => value,
        _ => Value::Object(serde_json::Map::new()),
    };

    match executor.execute(&action, &payload).await {
        Ok(output) => {
            info!(user = %principal.user, action = %action, "action.success");
            Ok(Json(output))
        }
        Err(err) => {
            let (stdout, stderr) = err.output();
            warn!(
                user = %principal.user,
                action = %action,
                code = err.code(),
                error = %err,
                stdout,
                stderr,
                "action.failed"
            );
            Err(ApiError::ActionFailed { code: err.code() })
        }
    }
}
