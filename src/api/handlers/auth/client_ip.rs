//! Client identity used as the login lockout key.
//!
//! Proxy headers are only trusted when the TCP peer is a loopback address,
//! i.e. a reverse proxy on the same host. Any other peer is keyed by its own
//! address so a remote caller cannot pick its lockout bucket by sending
//! `X-Forwarded-For`.

use axum::http::HeaderMap;
use std::net::IpAddr;

pub const UNKNOWN_CLIENT: &str = "unknown";

/// Resolve the identifier for `remote` (the raw peer address, if known).
#[must_use]
pub fn resolve_client_id(remote: Option<IpAddr>, headers: &HeaderMap) -> String {
    let Some(remote) = remote else {
        return UNKNOWN_CLIENT.to_string();
    };

    if !remote.to_canonical().is_loopback() {
        return remote.to_string();
    }

    forwarded_for(headers)
        .or_else(|| header_value(headers, "x-real-ip"))
        .unwrap_or_else(|| remote.to_string())
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
