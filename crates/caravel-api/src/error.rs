//! Error types for platform API calls.

use thiserror::Error;

/// Errors that can occur when talking to the Caravel platform.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The target application does not exist (HTTP 404 on run creation).
    #[error("application not found: {0}")]
    AppNotFound(String),

    /// The platform rejected the request with a non-success status.
    #[error("invalid status code {status} ({body})")]
    Status {
        /// HTTP status returned by the platform.
        status: u16,
        /// Trimmed response body, empty if unreadable.
        body: String,
    },

    /// The request never completed (DNS, connect, timeout, TLS).
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body did not match the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A URL needed for the call could not be built.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// Local file handling failed before the request was sent.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// Build a `Status` error from a response, consuming its body.
    pub async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map(|b| b.trim().to_string())
            .unwrap_or_default();
        Self::Status { status, body }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_not_found_display() {
        let err = ApiError::AppNotFound("myapp".into());
        assert_eq!(err.to_string(), "application not found: myapp");
    }

    #[test]
    fn status_display_includes_body() {
        let err = ApiError::Status {
            status: 422,
            body: "invalid size".into(),
        };
        assert_eq!(err.to_string(), "invalid status code 422 (invalid size)");
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = ApiError::from(io_err);
        assert!(matches!(err, ApiError::Io(_)));
    }
}
