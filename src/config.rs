//! Configuration management for the SMAX client.
//!
//! This module handles loading configuration from environment variables,
//! with validation to ensure all required values are present.

use std::env;
use std::fmt;
use std::time::Duration;

use url::Url;

use crate::error::SmaxError;

/// Default per-attempt request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Configuration for connecting to a SMAX tenant.
///
/// The password is stored but never logged or exposed in error messages;
/// the `Debug` implementation redacts it.
#[derive(Clone)]
pub struct Config {
    /// Base URL of the SMAX instance without trailing slash
    /// (e.g., `https://smax.example.com`).
    pub base_url: String,

    /// Tenant identifier, part of every REST path.
    pub tenant_id: String,

    /// Login name used for token authentication.
    pub username: String,

    /// Password used for token authentication.
    /// This value must never be logged or included in error messages.
    pub password: String,

    /// Skip TLS certificate validation. SMAX installations commonly run
    /// with self-signed certificates, so this defaults to `true`.
    pub accept_invalid_certs: bool,

    /// Timeout applied to every individual HTTP attempt.
    pub timeout: Duration,
}

impl Config {
    /// Builds a configuration with default TLS and timeout settings.
    ///
    /// # Errors
    ///
    /// Returns `SmaxError::Config` if the base URL is malformed or a
    /// required value is empty.
    pub fn new(
        base_url: impl Into<String>,
        tenant_id: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, SmaxError> {
        let base_url = Self::validate_base_url(base_url.into())?;
        let tenant_id = tenant_id.into().trim().to_string();
        if tenant_id.is_empty() {
            return Err(SmaxError::invalid_config("tenant id must not be empty"));
        }
        let username = username.into();
        if username.trim().is_empty() {
            return Err(SmaxError::invalid_config("username must not be empty"));
        }

        Ok(Config {
            base_url,
            tenant_id,
            username,
            password: password.into(),
            accept_invalid_certs: true,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Loads configuration from environment variables.
    ///
    /// # Required Environment Variables
    ///
    /// - `SMAX_BASE_URL`: The base URL of the SMAX instance
    /// - `SMAX_TENANT_ID`: The tenant identifier
    /// - `SMAX_USERNAME`: Login name
    /// - `SMAX_PASSWORD`: Password
    ///
    /// # Optional Environment Variables
    ///
    /// - `SMAX_ACCEPT_INVALID_CERTS`: `true` (default) or `false`
    /// - `SMAX_TIMEOUT_SECS`: per-request timeout, default 10
    ///
    /// # Errors
    ///
    /// Returns `SmaxError::Config` if any required variable is missing
    /// or if values fail validation.
    pub fn from_env() -> Result<Self, SmaxError> {
        let base_url = Self::get_required_env("SMAX_BASE_URL")?;
        let tenant_id = Self::get_required_env("SMAX_TENANT_ID")?;
        let username = Self::get_required_env("SMAX_USERNAME")?;
        let password = Self::get_required_env("SMAX_PASSWORD")?;

        Self::validate_password(&password)?;

        let mut config = Self::new(base_url, tenant_id, username, password)?;

        if let Ok(value) = env::var("SMAX_ACCEPT_INVALID_CERTS") {
            config.accept_invalid_certs = Self::parse_bool("SMAX_ACCEPT_INVALID_CERTS", &value)?;
        }
        if let Ok(value) = env::var("SMAX_TIMEOUT_SECS") {
            config.timeout = Self::parse_timeout(&value)?;
        }

        Ok(config)
    }

    /// Sets whether TLS certificate validation is skipped.
    #[must_use]
    pub fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Sets the per-attempt request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Gets a required environment variable, returning an error if missing or empty.
    fn get_required_env(name: &str) -> Result<String, SmaxError> {
        env::var(name)
            .map_err(|_| SmaxError::missing_env(name))
            .and_then(|value| {
                if value.trim().is_empty() {
                    Err(SmaxError::missing_env(name))
                } else {
                    Ok(value)
                }
            })
    }

    /// Validates and normalizes the base URL.
    fn validate_base_url(url: String) -> Result<String, SmaxError> {
        let url = url.trim().trim_end_matches('/').to_string();

        let parsed = Url::parse(&url)
            .map_err(|e| SmaxError::invalid_config(format!("SMAX_BASE_URL is not a valid URL: {}", e)))?;

        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(SmaxError::invalid_config(
                "SMAX_BASE_URL must start with http:// or https://",
            ));
        }
        if parsed.query().is_some() || parsed.fragment().is_some() {
            return Err(SmaxError::invalid_config(
                "SMAX_BASE_URL must not contain a query string or fragment",
            ));
        }

        Ok(url)
    }

    /// Rejects obvious placeholder passwords copied from `.env.example`.
    fn validate_password(password: &str) -> Result<(), SmaxError> {
        let lower = password.to_lowercase();
        let placeholder_patterns = ["your_password", "placeholder", "changeme", "xxx"];

        if placeholder_patterns.iter().any(|p| lower.contains(p)) {
            return Err(SmaxError::invalid_config(
                "SMAX_PASSWORD appears to be a placeholder value",
            ));
        }

        Ok(())
    }

    fn parse_bool(name: &str, value: &str) -> Result<bool, SmaxError> {
        match value.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(SmaxError::invalid_config(format!(
                "{} must be true or false, got {:?}",
                name, other
            ))),
        }
    }

    fn parse_timeout(value: &str) -> Result<Duration, SmaxError> {
        match value.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
            _ => Err(SmaxError::invalid_config(
                "SMAX_TIMEOUT_SECS must be a positive number of seconds",
            )),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("tenant_id", &self.tenant_id)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Environment-reading paths are not unit tested here; tests run in
    // parallel and would race on process-wide variables.

    #[test]
    fn test_validate_base_url_removes_trailing_slash() {
        let result = Config::validate_base_url("https://smax.example.com/".to_string()).unwrap();
        assert_eq!(result, "https://smax.example.com");
    }

    #[test]
    fn test_validate_base_url_requires_scheme() {
        assert!(Config::validate_base_url("smax.example.com".to_string()).is_err());
        assert!(Config::validate_base_url("ftp://smax.example.com".to_string()).is_err());
    }

    #[test]
    fn test_validate_base_url_rejects_query() {
        let result = Config::validate_base_url("https://smax.example.com/?x=1".to_string());
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_password_rejects_placeholder() {
        assert!(Config::validate_password("your_password_here").is_err());
        assert!(Config::validate_password("CHANGEME").is_err());
    }

    #[test]
    fn test_validate_password_accepts_real_password() {
        assert!(Config::validate_password("S3cure!pass").is_ok());
    }

    #[test]
    fn test_new_applies_defaults() {
        let config = Config::new("https://smax.example.com/", "123456", "bob", "pw").unwrap();
        assert_eq!(config.base_url, "https://smax.example.com");
        assert!(config.accept_invalid_certs);
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn test_new_rejects_empty_tenant() {
        assert!(Config::new("https://smax.example.com", "  ", "bob", "pw").is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert!(Config::parse_bool("X", "TRUE").unwrap());
        assert!(!Config::parse_bool("X", "0").unwrap());
        assert!(Config::parse_bool("X", "maybe").is_err());
    }

    #[test]
    fn test_parse_timeout() {
        assert_eq!(Config::parse_timeout("30").unwrap(), Duration::from_secs(30));
        assert!(Config::parse_timeout("0").is_err());
        assert!(Config::parse_timeout("soon").is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = Config::new("https://smax.example.com", "1", "bob", "hunter2").unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
