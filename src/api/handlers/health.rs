use crate::GIT_COMMIT_HASH;
use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json},
};
use serde_json::json;
use tracing::{debug, error};

// axum handler for health
pub async fn health() -> impl IntoResponse {
    let short_hash = if GIT_COMMIT_HASH.len() > 7 {
        &GIT_COMMIT_HASH[0..7]
    } else {
        ""
    };

    let headers = format!(
        "{}:{}:{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_hash
    )
    .parse::<HeaderValue>()
    .map(|x_app_header_value| {
        debug!("X-App header: {:?}", x_app_header_value);

        let mut headers = HeaderMap::new();

        headers.insert("X-App", x_app_header_value);

        headers
    })
    .map_err(|err| {
        error!("Failed to parse X-App header: {}", err);
    });

    // Unwrap the headers or provide a default value (empty headers) in case of an error
    let headers = headers.unwrap_or_else(|()| HeaderMap::new());

    (StatusCode::OK, headers, Json(json!({ "ok": true })))
}
