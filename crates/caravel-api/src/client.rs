//! HTTP client for the Caravel platform API.
//!
//! This module provides the typed client used by the run subsystem.
//!
//! # Example
//!
//! ```rust,no_run
//! use caravel_api::{ApiClient, Credential, RunParams};
//!
//! # async fn example() -> Result<(), caravel_api::ApiError> {
//! let client = ApiClient::new("https://api.caravel.dev", Credential::new("tk-123"))?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::time::Duration;

use tracing::{debug, warn};

use crate::auth::Credential;
use crate::error::ApiError;
use crate::types::{RunCreated, RunParams, TtySize};

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default request timeout for run creation and uploads.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of waiting for a one-off to exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The process exited with the given code.
    Exited(i32),
    /// The platform aborted the one-off after an inactivity timeout.
    InactivityTimeout,
}

/// Typed client for the platform API.
///
/// Holds the base URL, the credential and a pooled HTTP client. The
/// one-off wait call gets its own untimed request since it blocks for the
/// whole process lifetime.
pub struct ApiClient {
    base_url: String,
    credential: Credential,
    http: reqwest::Client,
    wait_http: reqwest::Client,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client for the given platform endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, credential: Credential) -> Result<Self, ApiError> {
        Self::with_options(base_url, credential, false)
    }

    /// Create a client, optionally accepting invalid TLS certificates.
    ///
    /// Certificate verification bypass mirrors the tunnel-side TLS trust
    /// configuration so uploads and resize updates reach the same hosts
    /// the tunnel does.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn with_options(
        base_url: impl Into<String>,
        credential: Credential,
        accept_invalid_certs: bool,
    ) -> Result<Self, ApiError> {
        let base_url = base_url.into();
        let base_url = base_url.trim_end_matches('/').to_string();

        let http = reqwest::Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()?;
        // No overall timeout: /wait blocks until the remote process ends.
        let wait_http = reqwest::Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()?;

        Ok(Self {
            base_url,
            credential,
            http,
            wait_http,
        })
    }

    /// The configured platform base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The credential this client authenticates with.
    #[must_use]
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Create a one-off run for `app`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::AppNotFound`] on 404, [`ApiError::Status`] on
    /// any other non-success status.
    pub async fn create_run(&self, app: &str, params: &RunParams) -> Result<RunCreated, ApiError> {
        let url = format!("{}/apps/{}/run", self.base_url, app);
        debug!(url = %url, command = ?params.command, "creating one-off run");

        let response = self
            .credential
            .apply(self.http.post(&url))
            .json(params)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::AppNotFound(app.to_string()));
        }
        if !response.status().is_success() {
            return Err(ApiError::from_response(response).await);
        }

        let created: RunCreated = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        debug!(attach_url = %created.attach_url, container = %created.container.label(), "run created");
        Ok(created)
    }

    /// Upload a local file to a one-off's upload endpoint.
    ///
    /// The file is sent as one multipart part named `file`. The endpoint
    /// is `{attach_url}/files`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the platform
    /// answers anything but 200.
    pub async fn upload_file(&self, endpoint: &str, path: &Path) -> Result<(), ApiError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ApiError::InvalidUrl(format!("no file name in {}", path.display())))?;

        let contents = tokio::fs::read(path).await?;
        let part = reqwest::multipart::Part::bytes(contents).file_name(name);
        let form = reqwest::multipart::Form::new().part("file", part);

        debug!(endpoint = %endpoint, file = %path.display(), "uploading file");
        let response = self
            .credential
            .apply(self.http.post(endpoint))
            .multipart(form)
            .send()
            .await?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(ApiError::from_response(response).await);
        }
        Ok(())
    }

    /// Send the current terminal dimensions to a one-off.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-200 answer. Callers
    /// treat resize failures as non-fatal.
    pub async fn update_tty_size(&self, attach_url: &str, size: &TtySize) -> Result<(), ApiError> {
        let response = self
            .credential
            .apply(self.http.put(attach_url))
            .json(size)
            .send()
            .await?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(ApiError::from_response(response).await);
        }
        Ok(())
    }

    /// Wait for a one-off to exit and report its exit code.
    ///
    /// Blocks until the remote process ends. An HTTP 408 means the
    /// platform aborted the one-off for inactivity.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or an unparsable body.
    pub async fn wait_exit_code(&self, attach_url: &str) -> Result<WaitOutcome, ApiError> {
        let url = format!("{attach_url}/wait");
        let response = self
            .credential
            .apply(self.wait_http.get(&url))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::REQUEST_TIMEOUT {
            warn!("one-off aborted by the platform after inactivity timeout");
            return Ok(WaitOutcome::InactivityTimeout);
        }

        let body = response.text().await?;
        debug!(body = %body, "wait endpoint answered");
        let parsed: std::collections::HashMap<String, i32> = serde_json::from_str(&body)
            .map_err(|e| ApiError::InvalidResponse(format!("exit code body: {e}")))?;
        let code = parsed
            .get("exit_code")
            .copied()
            .ok_or_else(|| ApiError::InvalidResponse("missing exit_code field".into()))?;
        Ok(WaitOutcome::Exited(code))
    }
}
