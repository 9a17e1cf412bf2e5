//! Shared HTTP plumbing: client construction and status mapping.

use murasame_core::BackendError;
use std::time::Duration;
use tracing::warn;

/// Build a client with a per-request timeout.
pub(crate) fn client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

/// Map a transport failure onto a backend error.
pub(crate) fn send_error(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout(e.to_string())
    } else {
        BackendError::Network(e.to_string())
    }
}

/// Turn non-success statuses into errors, passing successful responses through.
pub(crate) async fn check_status(
    backend: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, BackendError> {
    let status = response.status().as_u16();

    if status == 429 {
        return Err(BackendError::RateLimited {
            retry_after_secs: 5,
        });
    }

    if status == 401 || status == 403 {
        return Err(BackendError::ApiError {
            status_code: status,
            message: "Invalid API key or insufficient permissions".into(),
        });
    }

    if !response.status().is_success() {
        let error_body = response.text().await.unwrap_or_default();
        warn!(backend, status, body = %error_body, "Backend returned error");
        return Err(BackendError::ApiError {
            status_code: status,
            message: error_body,
        });
    }

    Ok(response)
}
