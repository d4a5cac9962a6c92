//! CLI error types.

use thiserror::Error;

use caravel_api::ApiError;
use caravel_attach::AttachError;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Platform API call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The run/attach session failed.
    #[error(transparent)]
    Attach(#[from] AttachError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = CliError::Config("no API token".into());
        assert_eq!(err.to_string(), "configuration error: no API token");
    }

    #[test]
    fn attach_errors_pass_through_untouched() {
        let err = CliError::from(AttachError::AttachRejected { status: 404 });
        assert_eq!(err.to_string(), "fail to attach: invalid status code 404");
    }
}
