//! Error responses shared by the JSON handlers.
//!
//! Every failure body is `{"ok": false, "error": <message>}`. Details that
//! could leak host information (subprocess output, I/O errors) are logged by
//! the caller and never reach the body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("too many attempts, try again later")]
    Locked,
    #[error("action '{0}' is disabled")]
    ActionDisabled(String),
    #[error("action failed")]
    ActionFailed { code: &'static str },
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("internal error")]
    Internal,
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Locked => StatusCode::TOO_MANY_REQUESTS,
            Self::ActionDisabled(_) => StatusCode::FORBIDDEN,
            Self::ActionFailed { .. } | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::ActionFailed { code } => json!({
                "ok": false,
                "error": self.to_string(),
                "code": code,
            }),
            _ => json!({ "ok": false, "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn render(err: ApiError) -> Result<(StatusCode, Value)> {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        Ok((status, serde_json::from_slice(&bytes)?))
    }

    #[tokio::test]
    async fn action_failure_carries_only_code() -> Result<()> {
        let (status, body) = render(ApiError::ActionFailed {
            code: "TMUX_ACTION_TIMEOUT",
        })
        .await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({"ok": false, "error": "action failed", "code": "TMUX_ACTION_TIMEOUT"})
        );
        Ok(())
    }

    #[tokio::test]
    async fn status_mapping() -> Result<()> {
        let (status, body) = render(ApiError::Locked).await?;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"], "too many attempts, try again later");

        let (status, body) = render(ApiError::ActionDisabled("kill_server".into())).await?;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "action 'kill_server' is disabled");

        let (status, _) = render(ApiError::Unauthorized).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = render(ApiError::NotFound("pane '%9' not found".into())).await?;
        assert_eq!(status, StatusCode::NOT_FOUND);
        Ok(())
    }
}
