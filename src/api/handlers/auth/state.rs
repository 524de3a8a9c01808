//! Auth configuration and the shared auth service.

use secrecy::{ExposeSecret, SecretString};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::{rate_limit::LoginLimiter, token::TokenSigner};
use crate::config::{
    DashboardConfig, DEFAULT_LOGIN_ATTEMPT_LIMIT, DEFAULT_LOGIN_LOCK_SEC,
    DEFAULT_LOGIN_WINDOW_SEC, DEFAULT_TOKEN_TTL_SEC,
};

const BEARER_PREFIX: &str = "Bearer ";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    user: String,
    password: SecretString,
    secret: SecretString,
    token_ttl_seconds: u64,
    login_attempt_limit: u32,
    login_window_seconds: u64,
    login_lock_seconds: u64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(user: String, password: SecretString, secret: SecretString) -> Self {
        Self {
            user,
            password,
            secret,
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SEC,
            login_attempt_limit: DEFAULT_LOGIN_ATTEMPT_LIMIT,
            login_window_seconds: DEFAULT_LOGIN_WINDOW_SEC,
            login_lock_seconds: DEFAULT_LOGIN_LOCK_SEC,
        }
    }

    #[must_use]
    pub fn from_dashboard(config: &DashboardConfig) -> Self {
        Self::new(
            config.auth_user.clone(),
            config.auth_password.clone(),
            config.auth_secret.clone(),
        )
        .with_token_ttl_seconds(config.auth_token_ttl_sec)
        .with_login_attempt_limit(config.login_attempt_limit)
        .with_login_window_seconds(config.login_window_sec)
        .with_login_lock_seconds(config.login_lock_sec)
    }

    #[must_use]
    pub fn with_token_ttl_seconds(mut self, seconds: u64) -> Self {
        self.token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_login_attempt_limit(mut self, limit: u32) -> Self {
        self.login_attempt_limit = limit;
        self
    }

    #[must_use]
    pub fn with_login_window_seconds(mut self, seconds: u64) -> Self {
        self.login_window_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_login_lock_seconds(mut self, seconds: u64) -> Self {
        self.login_lock_seconds = seconds;
        self
    }

    #[must_use]
    pub fn token_ttl_seconds(&self) -> u64 {
        self.token_ttl_seconds
    }
}

/// Token issuing, bearer verification and login lockout, shared by every
/// request through an `Arc`.
pub struct AuthService {
    config: AuthConfig,
    signer: TokenSigner,
    limiter: LoginLimiter,
}

impl AuthService {
    #[must_use]
    pub fn new(config: AuthConfig) -> Self {
        let signer = TokenSigner::new(config.secret.clone());
        let limiter = LoginLimiter::new(
            config.login_attempt_limit,
            Duration::from_secs(config.login_window_seconds),
            Duration::from_secs(config.login_lock_seconds),
        );
        Self {
            config,
            signer,
            limiter,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Wall clock as time since the unix epoch.
    #[must_use]
    pub fn now(&self) -> Duration {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn issue_token(&self, user: &str) -> String {
        self.issue_token_at(user, self.now())
    }

    #[must_use]
    pub fn issue_token_at(&self, user: &str, now: Duration) -> String {
        self.signer.issue(user, now)
    }

    /// Resolve an `Authorization` header value to the authenticated user.
    #[must_use]
    pub fn authenticate_bearer_token(&self, header: &str) -> Option<String> {
        self.authenticate_bearer_token_at(header, self.now())
    }

    #[must_use]
    pub fn authenticate_bearer_token_at(&self, header: &str, now: Duration) -> Option<String> {
        let token = header.strip_prefix(BEARER_PREFIX)?.trim();
        if token.is_empty() {
            return None;
        }
        self.signer.verify(
            token,
            now,
            Duration::from_secs(self.config.token_ttl_seconds),
        )
    }

    /// Exact comparison against the configured credentials.
    #[must_use]
    pub fn verify_credentials(&self, user: &str, password: &str) -> bool {
        let user_ok = constant_time_eq(user.as_bytes(), self.config.user.as_bytes());
        let password_ok = constant_time_eq(
            password.as_bytes(),
            self.config.password.expose_secret().as_bytes(),
        );
        user_ok & password_ok
    }

    #[must_use]
    pub fn is_login_locked(&self, identifier: &str, now: Duration) -> bool {
        self.limiter.is_locked(identifier, now)
    }

    /// Returns true when this failure started a lockout.
    pub fn register_login_failure(&self, identifier: &str, now: Duration) -> bool {
        self.limiter.register_failure(identifier, now)
    }

    pub fn register_login_success(&self, identifier: &str) {
        self.limiter.register_success(identifier);
    }
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    left.iter()
        .zip(right)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
