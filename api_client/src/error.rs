use std::time::Duration;

use auth::AuthError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiClientError {
    #[error("Authentication Error: {0}")]
    Auth(#[from] AuthError),
    #[error("Permission Error: {message} (the Photos Library API only exposes media items and albums created by this application)")]
    Permission { message: String },
    #[error("Transient Error (HTTP {status}): {message}")]
    Transient {
        status: u16,
        message: String,
        retry_after: Option<Duration>,
    },
    #[error("Network Error: {0}")]
    Network(String),
    #[error("Google API Error (HTTP {status}): {message}")]
    Api { status: u16, message: String },
    #[error("Invalid API response: {0}")]
    Decode(String),
}

/// Coarse buckets used when presenting an error to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Auth,
    Permission,
    Transient,
    Network,
    Other,
}

impl ApiClientError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ApiClientError::Auth(_) => ErrorCategory::Auth,
            ApiClientError::Permission { .. } => ErrorCategory::Permission,
            ApiClientError::Transient { .. } => ErrorCategory::Transient,
            ApiClientError::Network(_) => ErrorCategory::Network,
            ApiClientError::Api { .. } | ApiClientError::Decode(_) => ErrorCategory::Other,
        }
    }

    /// Whether a manual retry by the user may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Transient | ErrorCategory::Network
        )
    }
}

impl From<reqwest::Error> for ApiClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiClientError::Decode(e.to_string())
        } else {
            ApiClientError::Network(e.to_string())
        }
    }
}
