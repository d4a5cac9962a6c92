//! Error types for the attach subsystem.

use thiserror::Error;

use caravel_api::ApiError;

/// Errors that can occur while running and attaching to a one-off.
#[derive(Debug, Error)]
pub enum AttachError {
    /// A `--env` override did not parse as `KEY=VALUE`.
    #[error("invalid environment variable, format is 'KEY=VALUE': {0}")]
    EnvFormat(String),

    /// A requested upload path does not exist locally.
    #[error("can't upload {0}: no such file or directory")]
    MissingUploadFile(String),

    /// A local upload path could not be resolved to an absolute path.
    #[error("fail to resolve {path}: {source}")]
    Resolve {
        /// Path as given on the command line.
        path: String,
        /// Underlying filesystem error.
        #[source]
        source: std::io::Error,
    },

    /// Building the directory archive failed.
    #[error("fail to archive {path}: {reason}")]
    Archive {
        /// Directory being packaged.
        path: String,
        /// What went wrong.
        reason: String,
    },

    /// Uploading a specific file failed.
    #[error("fail to upload {path}: {source}")]
    Upload {
        /// File or archive being uploaded.
        path: String,
        /// Platform response or transport failure.
        #[source]
        source: ApiError,
    },

    /// The attach URL is unusable.
    #[error("invalid attach url {url}: {reason}")]
    InvalidAttachUrl {
        /// The offending URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The TCP connection to the attach host could not be established.
    #[error("fail to dial {host}: {source}")]
    Dial {
        /// Host:port being dialed.
        host: String,
        /// Underlying socket error.
        #[source]
        source: std::io::Error,
    },

    /// TLS session establishment failed.
    #[error("fail to establish tls session with {host}: {source}")]
    Tls {
        /// Host being dialed.
        host: String,
        /// Underlying handshake error.
        #[source]
        source: std::io::Error,
    },

    /// TLS handshake failed with the record-overflow signature, which
    /// almost always means something between us and the platform is
    /// rewriting the stream.
    #[error(
        "secure connection error to {host}: {reason}\n\
         Your firewall or proxy may block the connection to {host}"
    )]
    TlsInterference {
        /// Host being dialed.
        host: String,
        /// The raw handshake error.
        reason: String,
    },

    /// The server refused the attach request.
    #[error("fail to attach: invalid status code {status}")]
    AttachRejected {
        /// HTTP status on the CONNECT response.
        status: u16,
    },

    /// Switching or restoring the local terminal mode failed.
    #[error("fail to {operation}: {source}")]
    Terminal {
        /// Which terminal operation failed.
        operation: &'static str,
        /// Underlying terminal error.
        #[source]
        source: std::io::Error,
    },

    /// A platform API call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Stream I/O failed during the session.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_format_names_the_expected_shape() {
        let err = AttachError::EnvFormat("NOEQUALS".into());
        assert!(err.to_string().contains("KEY=VALUE"));
    }

    #[test]
    fn missing_upload_is_a_cant_upload_error() {
        let err = AttachError::MissingUploadFile("/tmp/missing".into());
        assert_eq!(
            err.to_string(),
            "can't upload /tmp/missing: no such file or directory"
        );
    }

    #[test]
    fn tls_interference_mentions_firewall_and_host() {
        let err = AttachError::TlsInterference {
            host: "run.example.com:443".into(),
            reason: "record overflow".into(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("firewall or proxy"));
        assert!(rendered.contains("run.example.com:443"));
    }

    #[test]
    fn attach_rejected_includes_status() {
        let err = AttachError::AttachRejected { status: 404 };
        assert_eq!(err.to_string(), "fail to attach: invalid status code 404");
    }
}
