//! Error types for the SMAX client.
//!
//! This module defines `SmaxError`, the error type returned by every
//! fallible client operation.
//!
//! Not every failure is an error: server-side error statuses other than 401
//! and transport failures are reported as data through
//! [`ApiResponse`](crate::models::ApiResponse) instead.
//!
//! # Security
//!
//! Credentials and tokens must never reach logs or tool output. Use
//! `sanitize_message()` on any text built from external sources.

use thiserror::Error;

/// Unified error type for all SMAX client operations.
#[derive(Error, Debug)]
pub enum SmaxError {
    /// Configuration error - missing or invalid environment variables.
    #[error("configuration error: {0}")]
    Config(String),

    /// HTTP client initialization failed.
    #[error("HTTP client error: {0}")]
    HttpClient(#[source] reqwest::Error),

    /// The login call failed.
    #[error("authentication failed: {reason}")]
    Authentication {
        /// What went wrong, safe to display.
        reason: String,
        /// The underlying transport error, if any.
        #[source]
        source: Option<reqwest::Error>,
    },

    /// A request was attempted before any token was obtained.
    #[error("not authenticated - call authenticate() before issuing requests")]
    NotAuthenticated,

    /// The server kept answering 401 after one re-authentication.
    #[error("{method} {path} still unauthorized after re-authentication")]
    RetryExhausted {
        /// HTTP method of the rejected request.
        method: String,
        /// REST path of the rejected request, relative to the tenant root.
        path: String,
    },

    /// Input validation failed before any network call.
    #[error("validation error: {0}")]
    Validation(String),

    /// JSON serialization or deserialization failed.
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SmaxError {
    /// Creates a configuration error for a missing environment variable.
    pub fn missing_env(var_name: &str) -> Self {
        SmaxError::Config(format!(
            "missing required environment variable: {}",
            var_name
        ))
    }

    /// Creates a configuration error for an invalid value.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        SmaxError::Config(message.into())
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        SmaxError::Validation(message.into())
    }

    /// Creates an authentication error without an underlying transport error.
    pub fn authentication(reason: impl Into<String>) -> Self {
        SmaxError::Authentication {
            reason: reason.into(),
            source: None,
        }
    }

    /// Creates an authentication error caused by a transport failure.
    pub fn authentication_transport(reason: impl Into<String>, source: reqwest::Error) -> Self {
        SmaxError::Authentication {
            reason: reason.into(),
            source: Some(source),
        }
    }

    /// Creates a retry-exhausted error for the given request.
    pub fn retry_exhausted(method: impl Into<String>, path: impl Into<String>) -> Self {
        SmaxError::RetryExhausted {
            method: method.into(),
            path: path.into(),
        }
    }

    /// Returns true if a fresh login might make the failed call succeed.
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            SmaxError::Authentication { .. }
                | SmaxError::NotAuthenticated
                | SmaxError::RetryExhausted { .. }
        )
    }

    /// Replaces every occurrence of each secret in `message` with `[REDACTED]`.
    ///
    /// Empty secrets are ignored so that an unset token does not blank
    /// the whole message.
    #[must_use]
    pub fn sanitize_message(message: &str, secrets: &[&str]) -> String {
        secrets
            .iter()
            .filter(|secret| !secret.is_empty())
            .fold(message.to_string(), |acc, secret| {
                acc.replace(secret, "[REDACTED]")
            })
    }
}
