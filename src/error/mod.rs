//! Error types for Drover.

use thiserror::Error;

/// Primary error type for all Drover operations.
#[derive(Error, Debug)]
pub enum DroverError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Rate limited: retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    RateLimit,
    Network,
    Timeout,
    Server,
    Api,
    Configuration,
    Serialization,
    Unknown,
}

/// Message fragments that mark an error as transient even when the
/// status code alone does not.
const TRANSIENT_MARKERS: &[&str] = &["overloaded", "timeout", "deadline exceeded"];

/// Message fragments indicating the model identifier itself is invalid.
const UNAVAILABLE_MARKERS: &[&str] = &[
    "model not found",
    "unknown model",
    "not supported",
    "unsupported",
];

impl DroverError {
    /// Create an API error from a status code and body text.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Authentication(_) => ErrorCategory::Authentication,
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::Network(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                429 => ErrorCategory::RateLimit,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Api,
            },
            _ => ErrorCategory::Unknown,
        }
    }

    /// Whether another attempt against the same model can succeed.
    ///
    /// Rate limits, server errors, network failures, and deadline
    /// expiries are transient; so is any error whose message carries a
    /// known transient marker regardless of status code.
    pub fn is_retryable(&self) -> bool {
        match self.category() {
            ErrorCategory::RateLimit
            | ErrorCategory::Network
            | ErrorCategory::Timeout
            | ErrorCategory::Server => true,
            _ => {
                let text = self.to_string().to_ascii_lowercase();
                TRANSIENT_MARKERS.iter().any(|m| text.contains(m))
            }
        }
    }

    /// Whether the targeted model identifier is invalid or unsupported.
    ///
    /// Retrying the same identifier can never succeed, so the attempt
    /// loop advances to the next model with no backoff.
    pub fn is_model_unavailable(&self) -> bool {
        match self {
            Self::ModelNotFound(_) => true,
            Self::Api { status: 404, .. } => true,
            Self::Api { message, .. } => {
                let text = message.to_ascii_lowercase();
                UNAVAILABLE_MARKERS.iter().any(|m| text.contains(m))
            }
            _ => false,
        }
    }

    /// Server-provided delay hint, when one was returned with a rate limit.
    pub fn retry_after_hint(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_ms } => *retry_after_ms,
            _ => None,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, DroverError>;
