//! Error types for upstream data providers

use thiserror::Error;

/// Errors from a single provider fetch or probe.
///
/// Every variant is transient from the scheduler's point of view: it is
/// recorded into the provider's health and never aborts a merge pass.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Data format error: {message}")]
    FormatError { message: String },

    #[error("Authentication error: {message}")]
    AuthError { message: String },

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Service unavailable")]
    ServiceUnavailable,

    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Provider is disabled")]
    Disabled,
}

impl ProviderError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError { message: message.into() }
    }

    pub fn format(message: impl Into<String>) -> Self {
        Self::FormatError { message: message.into() }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::AuthError { message: message.into() }
    }
}

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;
