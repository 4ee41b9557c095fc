//! Error taxonomy shared by every client and orchestrator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of a single weather or geocoding attempt.
///
/// Clients convert every transport and parsing failure into one of these
/// before it reaches an orchestrator. None of them is fatal; all are
/// recoverable by an explicit retry.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ServiceError {
    #[error("Invalid location provided")]
    InvalidLocation,

    #[error("Invalid search query")]
    InvalidQuery,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response from service")]
    InvalidResponse,

    #[error("API key is missing or invalid")]
    ApiKeyMissing,

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ServiceError::Network("request timed out".to_string())
        } else if err.is_decode() {
            ServiceError::InvalidResponse
        } else if err.is_connect() || err.is_request() || err.is_body() {
            // reqwest errors embed the URL, which may carry an API key.
            ServiceError::Network(err.without_url().to_string())
        } else {
            ServiceError::Unknown(err.without_url().to_string())
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(_: serde_json::Error) -> Self {
        ServiceError::InvalidResponse
    }
}
