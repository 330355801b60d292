//! Error types for Skyward.
//!
//! Runtime failures never abort the service. Fetch failures are recorded in
//! the cache and surface as degraded quality; the only fatal error is a
//! [`ConfigError`] detected at startup.

use serde::{Deserialize, Serialize};

use crate::cache::CacheKey;

/// Why a fetch from an upstream provider failed.
///
/// Stored verbatim as the last failure reason of a cache entry, so the
/// payloads are plain strings rather than wrapped library errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FetchError {
    /// Network or DNS failure, or the provider answered with a 5xx.
    #[error("provider unreachable: {0}")]
    Unreachable(String),

    /// The provider answered but the payload could not be understood.
    #[error("bad response: {0}")]
    BadResponse(String),

    /// The provider signalled backpressure (HTTP 429).
    #[error("rate limited by provider")]
    RateLimited,

    /// No answer within the per-call timeout.
    #[error("request timed out")]
    Timeout,
}

impl FetchError {
    /// Short machine-friendly label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Unreachable(_) => "unreachable",
            FetchError::BadResponse(_) => "bad_response",
            FetchError::RateLimited => "rate_limited",
            FetchError::Timeout => "timeout",
        }
    }

    /// Classify a transport-level error from reqwest.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_decode() || err.is_body() {
            FetchError::BadResponse(err.to_string())
        } else if let Some(status) = err.status() {
            Self::from_status(status.as_u16(), &err.to_string())
        } else {
            FetchError::Unreachable(err.to_string())
        }
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, detail: &str) -> Self {
        match status {
            429 => FetchError::RateLimited,
            500..=599 => FetchError::Unreachable(format!("HTTP {status}: {detail}")),
            _ => FetchError::BadResponse(format!("HTTP {status}: {detail}")),
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::from_reqwest(err)
    }
}

/// Cache-level conditions that are not fetch failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// No fetch for this key has completed yet, successful or not.
    #[error("{0} has not been initialized yet")]
    NotYetInitialized(CacheKey),
}

/// Misconfiguration detected at startup.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{key}: cannot parse {value:?}")]
    Unparsable { key: String, value: String },

    #[error("{key}: {reason}")]
    OutOfRange { key: String, reason: String },
}
