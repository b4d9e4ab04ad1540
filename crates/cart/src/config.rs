//! Cart configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CART_API_BASE_URL` - Base URL of the remote cart API (e.g., `https://api.example.com/`)
//!
//! ## Optional
//! - `CART_GUEST_STORE_PATH` - Guest cart slot (default: `.storefront/guest_cart.json`)
//! - `CART_REQUEST_TIMEOUT_SECS` - Remote request timeout in seconds, 1-120 (default: 12)
//! - `CART_SESSION_COOKIE` - Cookie name carrying the session credential (default: `session`)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `CART_LOG_FORMAT` - `json` for JSON log lines (read by [`crate::telemetry::init_tracing`])

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_GUEST_STORE_PATH: &str = ".storefront/guest_cart.json";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 12;
const MAX_REQUEST_TIMEOUT_SECS: u64 = 120;
const DEFAULT_SESSION_COOKIE: &str = "session";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Cart state manager configuration.
#[derive(Debug, Clone)]
pub struct CartConfig {
    /// Remote cart API configuration
    pub remote: RemoteCartConfig,
    /// File holding the guest cart
    pub guest_store_path: PathBuf,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Remote cart API configuration.
#[derive(Debug, Clone)]
pub struct RemoteCartConfig {
    /// Base URL; cart routes are resolved relative to it
    pub base_url: Url,
    /// Whole-request timeout
    pub request_timeout: Duration,
    /// Name of the cookie that carries the session credential
    pub session_cookie: String,
}

impl RemoteCartConfig {
    /// Configuration with default timeout and cookie name.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            session_cookie: DEFAULT_SESSION_COOKIE.to_string(),
        }
    }
}

impl CartConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key/value source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let remote = RemoteCartConfig::from_lookup(&lookup)?;
        let guest_store_path = PathBuf::from(get_env_or_default(
            &lookup,
            "CART_GUEST_STORE_PATH",
            DEFAULT_GUEST_STORE_PATH,
        ));
        let sentry_dsn = get_optional_env(&lookup, "SENTRY_DSN");
        let sentry_environment = get_optional_env(&lookup, "SENTRY_ENVIRONMENT");

        Ok(Self {
            remote,
            guest_store_path,
            sentry_dsn,
            sentry_environment,
        })
    }
}

impl RemoteCartConfig {
    fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = parse_base_url(&get_required_env(lookup, "CART_API_BASE_URL")?)?;

        let timeout_secs = get_env_or_default(
            lookup,
            "CART_REQUEST_TIMEOUT_SECS",
            &DEFAULT_REQUEST_TIMEOUT_SECS.to_string(),
        )
        .parse::<u64>()
        .map_err(|e| {
            ConfigError::InvalidEnvVar("CART_REQUEST_TIMEOUT_SECS".to_string(), e.to_string())
        })?;
        if !(1..=MAX_REQUEST_TIMEOUT_SECS).contains(&timeout_secs) {
            return Err(ConfigError::InvalidEnvVar(
                "CART_REQUEST_TIMEOUT_SECS".to_string(),
                format!("must be between 1 and {MAX_REQUEST_TIMEOUT_SECS} (got {timeout_secs})"),
            ));
        }

        let session_cookie =
            get_env_or_default(lookup, "CART_SESSION_COOKIE", DEFAULT_SESSION_COOKIE);
        if session_cookie.is_empty()
            || !session_cookie
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        {
            return Err(ConfigError::InvalidEnvVar(
                "CART_SESSION_COOKIE".to_string(),
                format!("not a valid cookie name: {session_cookie:?}"),
            ));
        }

        Ok(Self {
            base_url,
            request_timeout: Duration::from_secs(timeout_secs),
            session_cookie,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse the API base URL, normalising it to end with `/` so that relative
/// joins keep any path prefix (`https://host/api/` + `cart`).
fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(raw).map_err(|e| {
        ConfigError::InvalidEnvVar("CART_API_BASE_URL".to_string(), e.to_string())
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            "CART_API_BASE_URL".to_string(),
            format!("unsupported scheme: {}", url.scheme()),
        ));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Get a required environment variable.
fn get_required_env<F>(lookup: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|value| !value.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).unwrap_or_else(|| default.to_string())
}
