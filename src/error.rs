//! Error types for the limiter, the cache and the façade.

use chrono::{DateTime, Utc};

/// Invalid throttle settings. Raised once, at limiter construction.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("maximum requests per interval must be greater than 0")]
    ZeroMaxRequests,

    /// Only intervals beyond what `chrono::TimeDelta` holds (~292 million years).
    #[error("{0} is out of range")]
    DurationOutOfRange(&'static str),
}

/// Failure reported by the backing store. Never caught by the cache.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("invalid resource id: '{0}'")]
    InvalidId(String),

    #[error("invalid store url: {0}")]
    InvalidUrl(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store returned {status} for resource '{id}'")]
    Status { status: u16, id: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Error categories surfaced to API clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    TooManyRequests = 429,
    NotFound = 404,
    InternalServerError = 500,
}

/// Outcome of a façade call that did not produce a value.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("too many requests, blocked until {blocked_until}")]
    TooManyRequests { blocked_until: DateTime<Utc> },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn error_type(&self) -> ErrorType {
        match self {
            ApiError::TooManyRequests { .. } => ErrorType::TooManyRequests,
            ApiError::Store(StoreError::NotFound(_)) => ErrorType::NotFound,
            ApiError::Store(_) => ErrorType::InternalServerError,
        }
    }
}
