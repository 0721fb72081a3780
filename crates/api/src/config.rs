//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHOP_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`;
//!   not needed when `SHOP_IN_MEMORY=1`)
//! - `SHOP_JWT_SECRET` - Token signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `SHOP_HOST` - Bind address (default: 127.0.0.1)
//! - `SHOP_PORT` - Listen port (default: 8000)
//! - `SHOP_IN_MEMORY` - Keep all data in process memory (default: false)
//! - `SHOP_ACCESS_TOKEN_MINUTES` - Access token lifetime (default: 30)
//! - `SHOP_REFRESH_TOKEN_HOURS` - Refresh token lifetime (default: 24)
//! - `SHOP_IMAGE_CHECK_TIMEOUT_SECS` - Image URL probe budget (default: 3)
//! - `SHOP_RATE_LIMIT` - Per-IP limits on sign-in and reset endpoints (default: true)
//! - `SHOP_LOG_JSON` - Emit logs as JSON lines (default: false)
//! - `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`, `EMAIL_FROM` - Outgoing
//!   mail. When `SMTP_HOST` is unset, notifications are only logged.
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Where account, listing and order data lives.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// `PostgreSQL` at the given URL.
    Postgres {
        /// Connection URL (contains password)
        database_url: SecretString,
    },
    /// Process memory; everything is lost on restart.
    InMemory,
}

/// Token signing configuration.
///
/// Implements `Debug` manually to redact the signing secret.
#[derive(Clone)]
pub struct TokenConfig {
    /// HMAC signing secret
    pub secret: SecretString,
    /// Access token lifetime
    pub access_ttl: chrono::TimeDelta,
    /// Refresh token lifetime
    pub refresh_ttl: chrono::TimeDelta,
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"[REDACTED]")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

/// Outgoing mail configuration.
///
/// Implements `Debug` manually to redact the SMTP password.
#[derive(Clone)]
pub struct SmtpConfig {
    /// SMTP relay host
    pub host: String,
    /// SMTP relay port
    pub port: u16,
    /// SMTP username
    pub username: String,
    /// SMTP password
    pub password: SecretString,
    /// Sender address for all outgoing mail
    pub from_address: String,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

/// API application configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Backing store
    pub storage: StorageConfig,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Token signing and lifetimes
    pub tokens: TokenConfig,
    /// Budget for the image URL liveness probe
    pub image_check_timeout: Duration,
    /// Whether per-IP rate limiting is enabled
    pub rate_limit: bool,
    /// Structured JSON logs instead of human-readable text
    pub log_json: bool,
    /// Outgoing mail; `None` logs notifications instead
    pub smtp: Option<SmtpConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

/// Source of configuration values, keyed by variable name.
type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(&|key: &str| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key/value source.
    ///
    /// # Errors
    ///
    /// See [`ApiConfig::from_env`].
    pub fn from_lookup(env: Lookup<'_>) -> Result<Self, ConfigError> {
        let storage = if get_flag(env, "SHOP_IN_MEMORY", false)? {
            StorageConfig::InMemory
        } else {
            StorageConfig::Postgres {
                database_url: get_database_url(env, "SHOP_DATABASE_URL")?,
            }
        };

        let host = get_parsed_or_default(env, "SHOP_HOST", IpAddr::from([127, 0, 0, 1]))?;
        let port = get_parsed_or_default(env, "SHOP_PORT", 8000_u16)?;

        let secret = get_required_env(env, "SHOP_JWT_SECRET")?;
        validate_jwt_secret(&secret, "SHOP_JWT_SECRET")?;
        validate_secret_strength(&secret, "SHOP_JWT_SECRET")?;

        let access_minutes = get_positive(env, "SHOP_ACCESS_TOKEN_MINUTES", 30)?;
        let refresh_hours = get_positive(env, "SHOP_REFRESH_TOKEN_HOURS", 24)?;
        let tokens = TokenConfig {
            secret: SecretString::from(secret),
            access_ttl: chrono::TimeDelta::try_minutes(access_minutes).ok_or_else(|| {
                ConfigError::InvalidEnvVar("SHOP_ACCESS_TOKEN_MINUTES".to_string(), "too large".to_string())
            })?,
            refresh_ttl: chrono::TimeDelta::try_hours(refresh_hours).ok_or_else(|| {
                ConfigError::InvalidEnvVar("SHOP_REFRESH_TOKEN_HOURS".to_string(), "too large".to_string())
            })?,
        };

        let image_check_timeout = Duration::from_secs(
            get_positive(env, "SHOP_IMAGE_CHECK_TIMEOUT_SECS", 3)?.unsigned_abs(),
        );
        let rate_limit = get_flag(env, "SHOP_RATE_LIMIT", true)?;
        let log_json = get_flag(env, "SHOP_LOG_JSON", false)?;

        let smtp = SmtpConfig::from_lookup(env)?;

        Ok(Self {
            storage,
            host,
            port,
            tokens,
            image_check_timeout,
            rate_limit,
            log_json,
            smtp,
            sentry_dsn: get_optional_env(env, "SENTRY_DSN"),
            sentry_environment: get_optional_env(env, "SENTRY_ENVIRONMENT"),
            sentry_sample_rate: get_parsed_or_default(env, "SENTRY_SAMPLE_RATE", 1.0)?,
            sentry_traces_sample_rate: get_parsed_or_default(
                env,
                "SENTRY_TRACES_SAMPLE_RATE",
                0.0,
            )?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl SmtpConfig {
    fn from_lookup(env: Lookup<'_>) -> Result<Option<Self>, ConfigError> {
        let Some(host) = get_optional_env(env, "SMTP_HOST") else {
            return Ok(None);
        };
        Ok(Some(Self {
            host,
            port: get_parsed_or_default(env, "SMTP_PORT", 587_u16)?,
            username: get_required_env(env, "SMTP_USERNAME")?,
            password: SecretString::from(get_required_env(env, "SMTP_PASSWORD")?),
            from_address: get_required_env(env, "EMAIL_FROM")?,
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(env: Lookup<'_>, key: &str) -> Result<String, ConfigError> {
    env(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(env: Lookup<'_>, primary_key: &str) -> Result<SecretString, ConfigError> {
    env(primary_key)
        .or_else(|| env("DATABASE_URL"))
        .map(SecretString::from)
        .ok_or_else(|| ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable, treating an empty value as unset.
fn get_optional_env(env: Lookup<'_>, key: &str) -> Option<String> {
    env(key).filter(|value| !value.trim().is_empty())
}

/// Parse an environment variable, falling back to `default` when unset.
fn get_parsed_or_default<T>(env: Lookup<'_>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(env, key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Parse a boolean flag (`1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off`).
fn get_flag(env: Lookup<'_>, key: &str, default: bool) -> Result<bool, ConfigError> {
    get_optional_env(env, key).map_or(Ok(default), |raw| {
        parse_flag(&raw).ok_or_else(|| {
            ConfigError::InvalidEnvVar(key.to_string(), format!("expected a boolean, got '{raw}'"))
        })
    })
}

/// Parse a strictly positive integer, falling back to `default` when unset.
fn get_positive(env: Lookup<'_>, key: &str, default: i64) -> Result<i64, ConfigError> {
    let value = get_parsed_or_default(env, key, default)?;
    if value <= 0 {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    Ok(value)
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Validate that the signing secret meets minimum length requirements.
fn validate_jwt_secret(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    if secret.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_JWT_SECRET_LENGTH,
                secret.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

impl TokenConfig {
    /// Raw signing key bytes.
    #[must_use]
    pub fn secret_bytes(&self) -> &[u8] {
        self.secret.expose_secret().as_bytes()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const STRONG_SECRET: &str = "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6";

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength() {
        assert!(matches!(
            validate_secret_strength("your-api-key-here", "TEST_VAR"),
            Err(ConfigError::InsecureSecret(_, _))
        ));
        assert!(validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR").is_err());
        assert!(validate_secret_strength(STRONG_SECRET, "TEST_VAR").is_ok());
    }

    #[test]
    fn test_validate_jwt_secret_length() {
        assert!(validate_jwt_secret("short", "TEST_VAR").is_err());
        assert!(validate_jwt_secret(&"a".repeat(32), "TEST_VAR").is_ok());
    }

    #[test]
    fn test_defaults() {
        let env = lookup(&[
            ("SHOP_DATABASE_URL", "postgres://localhost/shop"),
            ("SHOP_JWT_SECRET", STRONG_SECRET),
        ]);
        let config = ApiConfig::from_lookup(&env).unwrap();

        assert!(matches!(config.storage, StorageConfig::Postgres { .. }));
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:8000");
        assert_eq!(config.tokens.access_ttl, chrono::TimeDelta::minutes(30));
        assert_eq!(config.tokens.refresh_ttl, chrono::TimeDelta::hours(24));
        assert_eq!(config.image_check_timeout, Duration::from_secs(3));
        assert!(config.rate_limit);
        assert!(config.smtp.is_none());
        assert!((config.sentry_sample_rate - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_database_url_fallback() {
        let env = lookup(&[
            ("DATABASE_URL", "postgres://fly/shop"),
            ("SHOP_JWT_SECRET", STRONG_SECRET),
        ]);
        let config = ApiConfig::from_lookup(&env).unwrap();
        match config.storage {
            StorageConfig::Postgres { database_url } => {
                assert_eq!(database_url.expose_secret(), "postgres://fly/shop");
            }
            StorageConfig::InMemory => panic!("expected postgres storage"),
        }
    }

    #[test]
    fn test_in_memory_needs_no_database() {
        let env = lookup(&[
            ("SHOP_IN_MEMORY", "1"),
            ("SHOP_RATE_LIMIT", "false"),
            ("SHOP_JWT_SECRET", STRONG_SECRET),
        ]);
        let config = ApiConfig::from_lookup(&env).unwrap();
        assert!(matches!(config.storage, StorageConfig::InMemory));
        assert!(!config.rate_limit);
    }

    #[test]
    fn test_missing_secret() {
        let env = lookup(&[("SHOP_IN_MEMORY", "true")]);
        assert!(matches!(
            ApiConfig::from_lookup(&env),
            Err(ConfigError::MissingEnvVar(key)) if key == "SHOP_JWT_SECRET"
        ));
    }

    #[test]
    fn test_invalid_values() {
        let env = lookup(&[
            ("SHOP_IN_MEMORY", "maybe"),
            ("SHOP_JWT_SECRET", STRONG_SECRET),
        ]);
        assert!(matches!(
            ApiConfig::from_lookup(&env),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));

        let env = lookup(&[
            ("SHOP_IN_MEMORY", "1"),
            ("SHOP_JWT_SECRET", STRONG_SECRET),
            ("SHOP_ACCESS_TOKEN_MINUTES", "0"),
        ]);
        assert!(ApiConfig::from_lookup(&env).is_err());
    }

    #[test]
    fn test_smtp_requires_all_fields() {
        let env = lookup(&[
            ("SHOP_IN_MEMORY", "1"),
            ("SHOP_JWT_SECRET", STRONG_SECRET),
            ("SMTP_HOST", "smtp.mail.test"),
        ]);
        assert!(matches!(
            ApiConfig::from_lookup(&env),
            Err(ConfigError::MissingEnvVar(key)) if key == "SMTP_USERNAME"
        ));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let env = lookup(&[
            ("SHOP_IN_MEMORY", "1"),
            ("SHOP_JWT_SECRET", STRONG_SECRET),
            ("SMTP_HOST", "smtp.mail.test"),
            ("SMTP_USERNAME", "mailer"),
            ("SMTP_PASSWORD", "hunter2-smtp-pass"),
            ("EMAIL_FROM", "shop@mail.test"),
        ]);
        let config = ApiConfig::from_lookup(&env).unwrap();
        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("smtp.mail.test"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains(STRONG_SECRET));
        assert!(!debug_output.contains("hunter2-smtp-pass"));
    }
}
