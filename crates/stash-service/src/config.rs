//! Stash service configuration.
//!
//! Configuration is loaded from environment variables. All sensitive
//! fields are redacted in Debug output.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default server bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default JWKS cache TTL in seconds (5 minutes).
pub const DEFAULT_JWKS_CACHE_TTL_SECONDS: u64 = 300;

/// Default per-attempt JWKS fetch timeout in milliseconds.
pub const DEFAULT_JWKS_FETCH_TIMEOUT_MS: u64 = 5_000;

/// Default number of JWKS fetch attempts (first try included).
pub const DEFAULT_JWKS_MAX_ATTEMPTS: u32 = 3;

/// Upper bound on JWKS fetch attempts.
pub const MAX_JWKS_MAX_ATTEMPTS: u32 = 10;

/// Default base delay for JWKS retry backoff in milliseconds.
pub const DEFAULT_JWKS_RETRY_BASE_DELAY_MS: u64 = 500;

/// Stash service configuration.
///
/// Database URL is redacted in Debug output to prevent credential leakage.
#[derive(Clone)]
pub struct Config {
    /// SQLite connection URL.
    pub database_url: String,

    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Trusted token issuer. Compared by exact string match.
    pub oidc_issuer: String,

    /// Expected token audience.
    pub oidc_audience: String,

    /// JWKS endpoint of the identity provider.
    pub jwks_url: String,

    /// How long a fetched JWKS document is served from cache.
    pub jwks_cache_ttl: Duration,

    /// Timeout applied to each JWKS fetch attempt.
    pub jwks_fetch_timeout: Duration,

    /// Number of JWKS fetch attempts before giving up.
    pub jwks_max_attempts: u32,

    /// Base delay for exponential backoff between JWKS fetch attempts.
    pub jwks_retry_base_delay: Duration,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field("oidc_issuer", &self.oidc_issuer)
            .field("oidc_audience", &self.oidc_audience)
            .field("jwks_url", &self.jwks_url)
            .field("jwks_cache_ttl", &self.jwks_cache_ttl)
            .field("jwks_fetch_timeout", &self.jwks_fetch_timeout)
            .field("jwks_max_attempts", &self.jwks_max_attempts)
            .field("jwks_retry_base_delay", &self.jwks_retry_base_delay)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid JWKS configuration: {0}")]
    InvalidJwks(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = required(vars, "DATABASE_URL")?;

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let oidc_issuer = required(vars, "OIDC_ISSUER")?;
        let oidc_audience = required(vars, "OIDC_AUDIENCE")?;

        // Authentik publishes the application JWKS next to the issuer:
        // https://auth.example.com/application/o/<slug>/jwks/
        let jwks_url = vars
            .get("OIDC_JWKS_URL")
            .cloned()
            .unwrap_or_else(|| format!("{}/jwks/", oidc_issuer.trim_end_matches('/')));

        let jwks_cache_ttl = Duration::from_secs(parse_positive_u64(
            vars,
            "JWKS_CACHE_TTL_SECONDS",
            DEFAULT_JWKS_CACHE_TTL_SECONDS,
        )?);

        let jwks_fetch_timeout = Duration::from_millis(parse_positive_u64(
            vars,
            "JWKS_FETCH_TIMEOUT_MS",
            DEFAULT_JWKS_FETCH_TIMEOUT_MS,
        )?);

        let jwks_max_attempts = if let Some(value_str) = vars.get("JWKS_MAX_ATTEMPTS") {
            let value: u32 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwks(format!(
                    "JWKS_MAX_ATTEMPTS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 || value > MAX_JWKS_MAX_ATTEMPTS {
                return Err(ConfigError::InvalidJwks(format!(
                    "JWKS_MAX_ATTEMPTS must be between 1 and {}, got {}",
                    MAX_JWKS_MAX_ATTEMPTS, value
                )));
            }

            value
        } else {
            DEFAULT_JWKS_MAX_ATTEMPTS
        };

        // Zero is allowed here: it disables backoff sleeps.
        let jwks_retry_base_delay = if let Some(value_str) = vars.get("JWKS_RETRY_BASE_DELAY_MS")
        {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwks(format!(
                    "JWKS_RETRY_BASE_DELAY_MS must be a valid non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?;
            Duration::from_millis(value)
        } else {
            Duration::from_millis(DEFAULT_JWKS_RETRY_BASE_DELAY_MS)
        };

        Ok(Config {
            database_url,
            bind_address,
            oidc_issuer,
            oidc_audience,
            jwks_url,
            jwks_cache_ttl,
            jwks_fetch_timeout,
            jwks_max_attempts,
            jwks_retry_base_delay,
        })
    }
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .filter(|v| !v.trim().is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn parse_positive_u64(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: u64 = value_str.parse().map_err(|e| {
        ConfigError::InvalidJwks(format!(
            "{} must be a valid positive integer, got '{}': {}",
            name, value_str, e
        ))
    })?;

    if value == 0 {
        return Err(ConfigError::InvalidJwks(format!(
            "{} must be greater than 0",
            name
        )));
    }

    Ok(value)
}
