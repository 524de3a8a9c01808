//! # tmux dashboard
//!
//! `tmux-dashboard` is a small HTTP service that shows the state of the local
//! tmux server (sessions, windows, panes and the processes running in them),
//! a view of listening sockets and ssh tunnels, and lets an authenticated
//! operator drive tmux through a fixed set of control actions.
//!
//! ## Authentication
//!
//! A single operator account is configured through `DASHBOARD_AUTH_USER` and
//! `DASHBOARD_AUTH_PASSWORD`. A successful login returns a stateless bearer
//! token signed with HMAC-SHA256; any token signed with the current secret and
//! younger than the TTL is accepted, so tokens survive restarts only when
//! `DASHBOARD_AUTH_SECRET` is fixed.
//!
//! Failed logins are counted per client in memory. Proxy headers are only
//! trusted when the peer is a loopback address, so a remote caller cannot
//! dodge the lockout by spoofing `X-Forwarded-For`.
//!
//! ## Control actions
//!
//! Actions map to tmux subcommands and are gated by `DASHBOARD_ALLOWED_ACTIONS`.
//! Failures surface to the caller as a coarse code; tmux output stays in the
//! server log.
//!
//! ## Certificate dashboard
//!
//! A JSON-file backed registry of client certificate requests, one-time
//! distribution links and an audit trail lives under `/api/certs`.

pub mod api;
pub mod certs;
pub mod cli;
pub mod config;
pub mod tmux;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
