//! Storefront client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DELGUUR_API_URL` - Base URL of the storefront backend (e.g., `https://api.delguur.mn/v1/`)
//!
//! ## Optional
//! - `DELGUUR_STORAGE_PATH` - JSON file backing the local store (default: in-memory)
//! - `DELGUUR_CACHE_PREFIX` - Namespace prefix for stored keys (default: `delguur_`)
//! - `DELGUUR_CACHE_VERSION` - Schema version stamped on cache entries (default: 1.0.0)
//! - `DELGUUR_REQUEST_TIMEOUT_SECS` - HTTP request timeout (default: 15)
//! - `DELGUUR_CART_DEBOUNCE_MS` - Cart quantity debounce window (default: 500)
//! - `DELGUUR_PAYMENT_POLL_SECS` - QPay status poll interval (default: 5)
//! - `FACEBOOK_APP_ID` - Facebook app ID, enables token login
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Backend base URL; always ends with a slash so relative paths join below it
    pub api_url: Url,
    /// File backing the key-value store, `None` keeps state in memory
    pub storage_path: Option<PathBuf>,
    /// Local cache configuration
    pub cache: CacheConfig,
    /// HTTP request timeout
    pub request_timeout: Duration,
    /// Debounce window for optimistic cart quantity edits
    pub cart_debounce: Duration,
    /// Interval between QPay status queries
    pub payment_poll_interval: Duration,
    /// Facebook app ID for token login
    pub facebook_app_id: Option<String>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Local cache configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Prefix for every stored key
    pub prefix: String,
    /// Schema version; entries written under another version read as misses
    pub version: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prefix: "delguur_".to_string(),
            version: "1.0.0".to_string(),
        }
    }
}

impl StorefrontConfig {
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

        let api_url = parse_api_url(&get_required_env("DELGUUR_API_URL")?)
            .map_err(|e| ConfigError::InvalidEnvVar("DELGUUR_API_URL".to_string(), e))?;

        let cache = CacheConfig {
            prefix: get_env_or_default("DELGUUR_CACHE_PREFIX", "delguur_"),
            version: get_env_or_default("DELGUUR_CACHE_VERSION", "1.0.0"),
        };

        Ok(Self {
            api_url,
            storage_path: get_optional_env("DELGUUR_STORAGE_PATH").map(PathBuf::from),
            cache,
            request_timeout: Duration::from_secs(get_parsed_env(
                "DELGUUR_REQUEST_TIMEOUT_SECS",
                15,
            )?),
            cart_debounce: Duration::from_millis(get_parsed_env("DELGUUR_CART_DEBOUNCE_MS", 500)?),
            payment_poll_interval: Duration::from_secs(get_parsed_env(
                "DELGUUR_PAYMENT_POLL_SECS",
                5,
            )?),
            facebook_app_id: get_optional_env("FACEBOOK_APP_ID"),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Configuration for a backend at `api_url` with every other value defaulted.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if the URL cannot be parsed.
    pub fn for_api_url(api_url: &str) -> Result<Self, ConfigError> {
        let api_url = parse_api_url(api_url)
            .map_err(|e| ConfigError::InvalidEnvVar("DELGUUR_API_URL".to_string(), e))?;
        Ok(Self {
            api_url,
            storage_path: None,
            cache: CacheConfig::default(),
            request_timeout: Duration::from_secs(15),
            cart_debounce: Duration::from_millis(500),
            payment_poll_interval: Duration::from_secs(5),
            facebook_app_id: None,
            sentry_dsn: None,
            sentry_environment: None,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse the API base URL, forcing a trailing slash so `Url::join` keeps the path.
fn parse_api_url(raw: &str) -> Result<Url, String> {
    let mut url = Url::parse(raw).map_err(|e| e.to_string())?;
    if url.cannot_be_a_base() {
        return Err("URL cannot be used as a base".to_string());
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Get a numeric environment variable with a default value.
fn get_parsed_env(key: &str, default: u64) -> Result<u64, ConfigError> {
    get_optional_env(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}
