//! Environment-driven configuration.
//!
//! Settings come from `DASHBOARD_*` environment variables with an optional
//! `KEY=VALUE` env file as fallback: a file value only applies when the
//! process environment does not already define that key.
//!
//! [`DashboardConfig::from_sources`] is a pure function over an environment
//! snapshot and the file contents, so every rule here is testable without
//! touching the real process environment. [`DashboardConfig::load`] is the
//! thin impure wrapper used at startup.

use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use secrecy::SecretString;
use std::{
    collections::{BTreeSet, HashMap},
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::debug;

pub const ENV_ALLOWED_ACTIONS: &str = "DASHBOARD_ALLOWED_ACTIONS";
pub const ENV_AUTH_USER: &str = "DASHBOARD_AUTH_USER";
pub const ENV_AUTH_PASSWORD: &str = "DASHBOARD_AUTH_PASSWORD";
pub const ENV_AUTH_SECRET: &str = "DASHBOARD_AUTH_SECRET";
pub const ENV_AUTH_TOKEN_TTL_SEC: &str = "DASHBOARD_AUTH_TOKEN_TTL_SEC";
pub const ENV_AUTH_REQUIRE_SECRET_IN_PROD: &str = "DASHBOARD_AUTH_REQUIRE_SECRET_IN_PROD";
pub const ENV_ENV: &str = "DASHBOARD_ENV";
pub const ENV_ENV_FILE: &str = "DASHBOARD_ENV_FILE";
pub const ENV_DEBUG: &str = "DASHBOARD_DEBUG";
pub const ENV_CORS_ORIGINS: &str = "DASHBOARD_CORS_ORIGINS";
pub const ENV_LOGIN_ATTEMPT_LIMIT: &str = "DASHBOARD_LOGIN_ATTEMPT_LIMIT";
pub const ENV_LOGIN_WINDOW_SEC: &str = "DASHBOARD_LOGIN_WINDOW_SEC";
pub const ENV_LOGIN_LOCK_SEC: &str = "DASHBOARD_LOGIN_LOCK_SEC";
pub const ENV_PORT: &str = "DASHBOARD_PORT";
pub const ENV_CERT_DATA_FILE: &str = "DASHBOARD_CERT_DATA_FILE";

pub const DEFAULT_PORT: u16 = 5001;
pub const DEFAULT_TOKEN_TTL_SEC: u64 = 86_400;
pub const DEFAULT_LOGIN_ATTEMPT_LIMIT: u32 = 5;
pub const DEFAULT_LOGIN_WINDOW_SEC: u64 = 600;
pub const DEFAULT_LOGIN_LOCK_SEC: u64 = 900;
pub const DEFAULT_CERT_DATA_FILE: &str = "data/cert_dashboard.json";
pub const DEFAULT_ENV_FILE: &str = ".env";

const MIN_TOKEN_TTL_SEC: u64 = 60;
const MIN_LOGIN_ATTEMPT_LIMIT: u32 = 1;
const MIN_LOGIN_WINDOW_SEC: u64 = 60;
const MIN_LOGIN_LOCK_SEC: u64 = 60;
const GENERATED_SECRET_BYTES: usize = 32;

/// Control actions enabled when `DASHBOARD_ALLOWED_ACTIONS` is unset or `all`.
pub const DEFAULT_ACTIONS: [&str; 9] = [
    "send_keys",
    "select_pane",
    "select_window",
    "switch_client",
    "kill_pane",
    "kill_window",
    "kill_session",
    "new_window",
    "split_window",
];

/// Snapshot of environment variables.
pub type EnvMap = HashMap<String, String>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    MissingField(&'static str),

    #[error("DASHBOARD_AUTH_SECRET is required when DASHBOARD_ENV=prod")]
    MissingProdSecret,

    #[error("failed to read env file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to generate auth secret: {0}")]
    SecretGeneration(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Prod,
}

impl Environment {
    fn parse(raw: Option<&str>) -> Self {
        match raw.map(|value| value.trim().to_ascii_lowercase()).as_deref() {
            Some("prod" | "production") => Self::Prod,
            _ => Self::Dev,
        }
    }

    #[must_use]
    pub const fn is_prod(self) -> bool {
        matches!(self, Self::Prod)
    }
}

/// Immutable process configuration, built once at startup.
#[derive(Clone, Debug)]
pub struct DashboardConfig {
    pub allowed_actions: BTreeSet<String>,
    pub auth_user: String,
    pub auth_password: SecretString,
    pub auth_secret: SecretString,
    /// True when no secret was configured and one was synthesized for this
    /// process only.
    pub auth_secret_generated: bool,
    pub auth_token_ttl_sec: u64,
    pub require_secret_in_prod: bool,
    pub environment: Environment,
    pub debug: bool,
    pub cors_origins: BTreeSet<String>,
    pub login_attempt_limit: u32,
    pub login_window_sec: u64,
    pub login_lock_sec: u64,
    pub port: u16,
    pub cert_data_file: PathBuf,
}

impl DashboardConfig {
    /// Build the configuration from an environment snapshot and optional env
    /// file contents.
    ///
    /// # Errors
    /// Returns [`ConfigError`] when credentials are missing, when production
    /// mode demands a fixed secret that is absent, or when secret generation
    /// fails.
    pub fn from_sources(env: &EnvMap, env_file: Option<&str>) -> Result<Self, ConfigError> {
        let file_values = env_file.map(parse_env_file).unwrap_or_default();
        let lookup = |key: &str| -> Option<String> {
            env.get(key)
                .or_else(|| file_values.get(key))
                .map(|value| value.trim().to_string())
        };

        let auth_user = lookup(ENV_AUTH_USER)
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::MissingField(ENV_AUTH_USER))?;
        let auth_password = lookup(ENV_AUTH_PASSWORD)
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::MissingField(ENV_AUTH_PASSWORD))?;

        let environment = Environment::parse(lookup(ENV_ENV).as_deref());
        let require_secret_in_prod = lookup(ENV_AUTH_REQUIRE_SECRET_IN_PROD)
            .map_or(true, |value| parse_bool(&value));

        let configured_secret = lookup(ENV_AUTH_SECRET).filter(|value| !value.is_empty());
        let (auth_secret, auth_secret_generated) = match configured_secret {
            Some(secret) => (secret, false),
            None if environment.is_prod() && require_secret_in_prod => {
                return Err(ConfigError::MissingProdSecret);
            }
            None => (generate_secret()?, true),
        };

        Ok(Self {
            allowed_actions: parse_allowed_actions(lookup(ENV_ALLOWED_ACTIONS).as_deref()),
            auth_user,
            auth_password: SecretString::from(auth_password),
            auth_secret: SecretString::from(auth_secret),
            auth_secret_generated,
            auth_token_ttl_sec: parse_bounded(
                lookup(ENV_AUTH_TOKEN_TTL_SEC).as_deref(),
                DEFAULT_TOKEN_TTL_SEC,
                MIN_TOKEN_TTL_SEC,
            ),
            require_secret_in_prod,
            environment,
            debug: lookup(ENV_DEBUG).is_some_and(|value| parse_bool(&value)),
            cors_origins: parse_csv(lookup(ENV_CORS_ORIGINS).as_deref()),
            login_attempt_limit: parse_bounded(
                lookup(ENV_LOGIN_ATTEMPT_LIMIT).as_deref(),
                DEFAULT_LOGIN_ATTEMPT_LIMIT,
                MIN_LOGIN_ATTEMPT_LIMIT,
            ),
            login_window_sec: parse_bounded(
                lookup(ENV_LOGIN_WINDOW_SEC).as_deref(),
                DEFAULT_LOGIN_WINDOW_SEC,
                MIN_LOGIN_WINDOW_SEC,
            ),
            login_lock_sec: parse_bounded(
                lookup(ENV_LOGIN_LOCK_SEC).as_deref(),
                DEFAULT_LOGIN_LOCK_SEC,
                MIN_LOGIN_LOCK_SEC,
            ),
            port: lookup(ENV_PORT)
                .and_then(|value| value.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            cert_data_file: lookup(ENV_CERT_DATA_FILE)
                .filter(|value| !value.is_empty())
                .map_or_else(|| PathBuf::from(DEFAULT_CERT_DATA_FILE), PathBuf::from),
        })
    }

    /// Load from the process environment plus an env file.
    ///
    /// An explicitly named env file must be readable; the default `.env` is
    /// only used when it exists.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the explicit env file cannot be read or the
    /// resulting settings are invalid.
    pub fn load(env_file: Option<&Path>) -> Result<Self, ConfigError> {
        let env: EnvMap = std::env::vars().collect();

        let contents = match env_file {
            Some(path) => {
                debug!("Reading env file {}", path.display());
                Some(
                    fs::read_to_string(path).map_err(|source| ConfigError::EnvFile {
                        path: path.to_path_buf(),
                        source,
                    })?,
                )
            }
            None => fs::read_to_string(DEFAULT_ENV_FILE).ok(),
        };

        Self::from_sources(&env, contents.as_deref())
    }
}

/// Parse `KEY=VALUE` lines. Blank lines and `#` comments are ignored, an
/// `export ` prefix is accepted and matching surrounding quotes are removed.
#[must_use]
pub fn parse_env_file(contents: &str) -> EnvMap {
    contents
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), unquote(value.trim()).to_string()))
        })
        .collect()
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_csv(raw: Option<&str>) -> BTreeSet<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_allowed_actions(raw: Option<&str>) -> BTreeSet<String> {
    match raw.map(str::trim) {
        None | Some("") => default_actions(),
        Some(value) if value.eq_ignore_ascii_case("all") => default_actions(),
        Some(value) => parse_csv(Some(value)),
    }
}

fn default_actions() -> BTreeSet<String> {
    DEFAULT_ACTIONS.iter().map(ToString::to_string).collect()
}

/// Unparseable values fall back to `default`; parseable ones are raised to `min`.
fn parse_bounded<T>(raw: Option<&str>, default: T, min: T) -> T
where
    T: std::str::FromStr + Ord,
{
    raw.and_then(|value| value.parse::<T>().ok())
        .map_or(default, |value| value.max(min))
}

fn generate_secret() -> Result<String, ConfigError> {
    let mut bytes = [0u8; GENERATED_SECRET_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|err| ConfigError::SecretGeneration(err.to_string()))?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn env(pairs: &[(&str, &str)]) -> EnvMap {
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect()
    }

    fn base_env() -> EnvMap {
        env(&[(ENV_AUTH_USER, "admin"), (ENV_AUTH_PASSWORD, "hunter2")])
    }

    #[test]
    fn defaults_apply_when_only_credentials_are_set() {
        let config = DashboardConfig::from_sources(&base_env(), None).unwrap();

        assert_eq!(config.auth_user, "admin");
        assert_eq!(config.auth_password.expose_secret(), "hunter2");
        assert_eq!(config.auth_token_ttl_sec, DEFAULT_TOKEN_TTL_SEC);
        assert_eq!(config.login_attempt_limit, DEFAULT_LOGIN_ATTEMPT_LIMIT);
        assert_eq!(config.login_window_sec, DEFAULT_LOGIN_WINDOW_SEC);
        assert_eq!(config.login_lock_sec, DEFAULT_LOGIN_LOCK_SEC);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.environment, Environment::Dev);
        assert!(config.require_secret_in_prod);
        assert!(!config.debug);
        assert!(config.cors_origins.is_empty());
        assert_eq!(config.allowed_actions.len(), DEFAULT_ACTIONS.len());
        assert_eq!(config.cert_data_file, PathBuf::from(DEFAULT_CERT_DATA_FILE));
    }

    #[test]
    fn missing_user_fails() {
        let result =
            DashboardConfig::from_sources(&env(&[(ENV_AUTH_PASSWORD, "hunter2")]), None);
        assert!(matches!(result, Err(ConfigError::MissingField(ENV_AUTH_USER))));
    }

    #[test]
    fn blank_password_fails() {
        let result = DashboardConfig::from_sources(
            &env(&[(ENV_AUTH_USER, "admin"), (ENV_AUTH_PASSWORD, "   ")]),
            None,
        );
        assert!(matches!(
            result,
            Err(ConfigError::MissingField(ENV_AUTH_PASSWORD))
        ));
    }

    #[test]
    fn prod_without_secret_fails() {
        let mut vars = base_env();
        vars.insert(ENV_ENV.to_string(), "prod".to_string());
        let result = DashboardConfig::from_sources(&vars, None);
        assert!(matches!(result, Err(ConfigError::MissingProdSecret)));
    }

    #[test]
    fn prod_without_secret_allowed_when_not_required() {
        let mut vars = base_env();
        vars.insert(ENV_ENV.to_string(), "production".to_string());
        vars.insert(
            ENV_AUTH_REQUIRE_SECRET_IN_PROD.to_string(),
            "false".to_string(),
        );
        let config = DashboardConfig::from_sources(&vars, None).unwrap();
        assert_eq!(config.environment, Environment::Prod);
        assert!(config.auth_secret_generated);
    }

    #[test]
    fn configured_secret_is_used_verbatim() {
        let mut vars = base_env();
        vars.insert(ENV_ENV.to_string(), "prod".to_string());
        vars.insert(ENV_AUTH_SECRET.to_string(), "fixed-secret".to_string());
        let config = DashboardConfig::from_sources(&vars, None).unwrap();
        assert_eq!(config.auth_secret.expose_secret(), "fixed-secret");
        assert!(!config.auth_secret_generated);
    }

    #[test]
    fn generated_secret_has_32_bytes_of_entropy() {
        let config = DashboardConfig::from_sources(&base_env(), None).unwrap();
        assert!(config.auth_secret_generated);
        let decoded = Base64UrlUnpadded::decode_vec(config.auth_secret.expose_secret()).unwrap();
        assert_eq!(decoded.len(), GENERATED_SECRET_BYTES);

        let other = DashboardConfig::from_sources(&base_env(), None).unwrap();
        assert_ne!(
            config.auth_secret.expose_secret(),
            other.auth_secret.expose_secret()
        );
    }

    #[test]
    fn unparseable_numbers_fall_back_to_defaults() {
        let mut vars = base_env();
        vars.insert(ENV_AUTH_TOKEN_TTL_SEC.to_string(), "soon".to_string());
        vars.insert(ENV_LOGIN_ATTEMPT_LIMIT.to_string(), "-3".to_string());
        vars.insert(ENV_LOGIN_WINDOW_SEC.to_string(), "".to_string());
        vars.insert(ENV_PORT.to_string(), "http".to_string());
        let config = DashboardConfig::from_sources(&vars, None).unwrap();
        assert_eq!(config.auth_token_ttl_sec, DEFAULT_TOKEN_TTL_SEC);
        assert_eq!(config.login_attempt_limit, DEFAULT_LOGIN_ATTEMPT_LIMIT);
        assert_eq!(config.login_window_sec, DEFAULT_LOGIN_WINDOW_SEC);
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn small_numbers_are_clamped_to_minimums() {
        let mut vars = base_env();
        vars.insert(ENV_AUTH_TOKEN_TTL_SEC.to_string(), "5".to_string());
        vars.insert(ENV_LOGIN_ATTEMPT_LIMIT.to_string(), "0".to_string());
        vars.insert(ENV_LOGIN_WINDOW_SEC.to_string(), "1".to_string());
        vars.insert(ENV_LOGIN_LOCK_SEC.to_string(), "30".to_string());
        let config = DashboardConfig::from_sources(&vars, None).unwrap();
        assert_eq!(config.auth_token_ttl_sec, MIN_TOKEN_TTL_SEC);
        assert_eq!(config.login_attempt_limit, MIN_LOGIN_ATTEMPT_LIMIT);
        assert_eq!(config.login_window_sec, MIN_LOGIN_WINDOW_SEC);
        assert_eq!(config.login_lock_sec, MIN_LOGIN_LOCK_SEC);
    }

    #[test]
    fn env_file_fills_only_unset_keys() {
        let file = "\
# dashboard settings
export DASHBOARD_AUTH_USER=file-user
DASHBOARD_AUTH_PASSWORD=\"file pass\"
DASHBOARD_PORT='6000'
DASHBOARD_DEBUG=yes
not a pair
";
        let vars = env(&[(ENV_AUTH_USER, "env-user")]);
        let config = DashboardConfig::from_sources(&vars, Some(file)).unwrap();
        assert_eq!(config.auth_user, "env-user");
        assert_eq!(config.auth_password.expose_secret(), "file pass");
        assert_eq!(config.port, 6000);
        assert!(config.debug);
    }

    #[test]
    fn allowed_actions_parsing() {
        assert_eq!(parse_allowed_actions(None).len(), DEFAULT_ACTIONS.len());
        assert_eq!(parse_allowed_actions(Some("ALL")).len(), DEFAULT_ACTIONS.len());
        assert_eq!(parse_allowed_actions(Some("  ")).len(), DEFAULT_ACTIONS.len());

        let subset = parse_allowed_actions(Some("select_pane, send_keys,,"));
        assert_eq!(
            subset.into_iter().collect::<Vec<_>>(),
            vec!["select_pane".to_string(), "send_keys".to_string()]
        );
    }

    #[test]
    fn cors_origins_are_trimmed_csv() {
        let mut vars = base_env();
        vars.insert(
            ENV_CORS_ORIGINS.to_string(),
            " http://localhost:3000 ,https://dash.example.com,".to_string(),
        );
        let config = DashboardConfig::from_sources(&vars, None).unwrap();
        assert!(config.cors_origins.contains("http://localhost:3000"));
        assert!(config.cors_origins.contains("https://dash.example.com"));
        assert_eq!(config.cors_origins.len(), 2);
    }

    #[test]
    fn environment_parsing() {
        assert_eq!(Environment::parse(None), Environment::Dev);
        assert_eq!(Environment::parse(Some("PROD")), Environment::Prod);
        assert_eq!(Environment::parse(Some("staging")), Environment::Dev);
    }

    #[test]
    fn load_fails_for_missing_explicit_env_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.env");
        let result = DashboardConfig::load(Some(&missing));
        assert!(matches!(result, Err(ConfigError::EnvFile { .. })));
    }

    #[test]
    fn load_reads_explicit_env_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dashboard.env");
        fs::write(
            &path,
            "DASHBOARD_AUTH_USER=from-file\nDASHBOARD_AUTH_PASSWORD=pw\n",
        )
        .unwrap();
        temp_env::with_vars(
            [
                (ENV_AUTH_USER, None::<&str>),
                (ENV_AUTH_PASSWORD, None::<&str>),
                (ENV_ENV, None::<&str>),
            ],
            || {
                let config = DashboardConfig::load(Some(&path)).unwrap();
                assert_eq!(config.auth_user, "from-file");
            },
        );
    }
}
