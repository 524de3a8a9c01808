//! Auth handlers and supporting modules.
//!
//! Login exchanges the configured username/password for a signed bearer
//! token. Every protected route resolves that token through
//! [`principal::require_auth`].
//!
//! ## Login Lockout
//!
//! Failed logins are counted per client identifier (see [`client_ip`]).
//! Reaching `DASHBOARD_LOGIN_ATTEMPT_LIMIT` failures inside
//! `DASHBOARD_LOGIN_WINDOW_SEC` locks the identifier for
//! `DASHBOARD_LOGIN_LOCK_SEC`. A successful login clears the identifier.
//!
//! ## Secret
//!
//! Tokens are signed with `DASHBOARD_AUTH_SECRET`. When no secret is
//! configured outside production a random one is generated per process.
//!
//! > **Warning:** Restarting with a generated secret invalidates all tokens.

pub mod client_ip;
mod login;
pub mod principal;
mod rate_limit;
mod session;
mod state;
pub mod token;
pub(crate) mod types;

pub use login::login;
pub use rate_limit::LoginLimiter;
pub use session::{logout, session};
pub use state::{AuthConfig, AuthService};
