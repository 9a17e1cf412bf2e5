//! Error types for the Murasame domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for companion operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Collaborator errors ---
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures reported by a backend collaborator (text, vision, speech, capture).
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    /// The backend answered, but not in the shape the protocol requires.
    #[error("Malformed response from {backend}: {reason}")]
    MalformedResponse { backend: String, reason: String },

    #[error("Rate limited by backend, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Backend not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl BackendError {
    /// Shorthand for a [`BackendError::MalformedResponse`].
    pub fn malformed(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            backend: backend.into(),
            reason: reason.into(),
        }
    }

    /// Whether retrying the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::RateLimited { .. } => true,
            Self::ApiError { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_displays_correctly() {
        let err = Error::Backend(BackendError::ApiError {
            status_code: 502,
            message: "bad gateway".into(),
        });
        assert!(err.to_string().contains("502"));
        assert!(err.to_string().contains("bad gateway"));
    }

    #[test]
    fn malformed_is_not_transient() {
        let err = BackendError::malformed("chat", "missing field `response`");
        assert!(!err.is_transient());
        assert!(err.to_string().contains("chat"));
    }

    #[test]
    fn network_and_server_errors_are_transient() {
        assert!(BackendError::Network("reset".into()).is_transient());
        assert!(BackendError::Timeout("120s".into()).is_transient());
        assert!(
            BackendError::ApiError {
                status_code: 503,
                message: String::new()
            }
            .is_transient()
        );
        assert!(
            !BackendError::ApiError {
                status_code: 400,
                message: String::new()
            }
            .is_transient()
        );
    }
}
