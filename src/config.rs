//! Service configuration, loaded once at startup

use std::time::Duration;
use thiserror::Error;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Configuration errors raised while reading the environment
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Settings for the PDF extractor service
#[derive(Debug, Clone)]
pub struct Settings {
    /// Service name, reported at startup
    pub app_name: String,
    /// Maximum upload/download size in MiB (default: 20)
    pub max_file_mb: u64,
    /// Default log level when `RUST_LOG` is unset (default: info)
    pub log_level: String,
    /// Comma-separated allowed CORS origins (default: "*")
    pub cors_allow_origins: String,
    /// Bind address (default: 0.0.0.0)
    pub host: String,
    /// Bind port (default: 8000)
    pub port: u16,
    /// Connect timeout for remote fetches (default: 10s)
    pub fetch_connect_timeout: Duration,
    /// Overall timeout for remote fetches (default: 20s)
    pub fetch_timeout: Duration,
    /// Maximum number of redirects followed (default: 10)
    pub fetch_max_redirects: usize,
    /// Reject URLs that resolve to private/reserved IPs (default: false)
    pub block_private_urls: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: "pdf-extractor".to_string(),
            max_file_mb: 20,
            log_level: "info".to_string(),
            cors_allow_origins: "*".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8000,
            fetch_connect_timeout: Duration::from_secs(10),
            fetch_timeout: Duration::from_secs(20),
            fetch_max_redirects: 10,
            block_private_urls: false,
        }
    }
}

impl Settings {
    /// Read settings from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup; unset keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string());

        Ok(Settings {
            app_name: get("APP_NAME").unwrap_or(defaults.app_name),
            max_file_mb: parse_or("MAX_FILE_MB", get("MAX_FILE_MB"), defaults.max_file_mb)?,
            log_level: get("LOG_LEVEL").unwrap_or(defaults.log_level),
            cors_allow_origins: get("CORS_ALLOW_ORIGINS").unwrap_or(defaults.cors_allow_origins),
            host: get("HOST").unwrap_or(defaults.host),
            port: parse_or("PORT", get("PORT"), defaults.port)?,
            fetch_connect_timeout: Duration::from_secs(parse_or(
                "FETCH_CONNECT_TIMEOUT_SECS",
                get("FETCH_CONNECT_TIMEOUT_SECS"),
                defaults.fetch_connect_timeout.as_secs(),
            )?),
            fetch_timeout: Duration::from_secs(parse_or(
                "FETCH_TIMEOUT_SECS",
                get("FETCH_TIMEOUT_SECS"),
                defaults.fetch_timeout.as_secs(),
            )?),
            fetch_max_redirects: parse_or(
                "FETCH_MAX_REDIRECTS",
                get("FETCH_MAX_REDIRECTS"),
                defaults.fetch_max_redirects,
            )?,
            block_private_urls: parse_bool_or(
                "BLOCK_PRIVATE_URLS",
                get("BLOCK_PRIVATE_URLS"),
                defaults.block_private_urls,
            )?,
        })
    }

    /// Maximum upload/download size in bytes
    pub fn max_file_bytes(&self) -> u64 {
        self.max_file_mb.saturating_mul(BYTES_PER_MB)
    }

    /// Allowed CORS origins, trimmed with empty entries removed
    pub fn cors_origins(&self) -> Vec<String> {
        self.cors_allow_origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// True when any origin is allowed
    pub fn cors_allows_any(&self) -> bool {
        let origins = self.cors_origins();
        origins.is_empty() || origins.iter().any(|o| o == "*")
    }

    /// Tracing filter directive used when `RUST_LOG` is unset
    pub fn default_log_filter(&self) -> String {
        format!(
            "pdf_extractor={level},tower_http={level}",
            level = self.log_level.to_lowercase()
        )
    }
}

fn parse_or<T>(key: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(v) if v.is_empty() => Ok(default),
        Some(v) => match v.parse() {
            Ok(parsed) => Ok(parsed),
            Err(e) => Err(ConfigError::InvalidValue {
                key,
                reason: e.to_string(),
                value: v,
            }),
        },
    }
}

fn parse_bool_or(
    key: &'static str,
    value: Option<String>,
    default: bool,
) -> Result<bool, ConfigError> {
    let lowered = value.as_deref().map(str::to_lowercase);
    match lowered.as_deref() {
        None | Some("") => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(_) => Err(ConfigError::InvalidValue {
            key,
            value: value.unwrap_or_default(),
            reason: "expected a boolean".to_string(),
        }),
    }
}
