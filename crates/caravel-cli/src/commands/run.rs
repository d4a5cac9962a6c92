//! Run command implementation.
//!
//! Launches a one-off command on an application container and attaches
//! the local terminal to it.

use std::sync::Arc;

use tracing::debug;

use caravel_api::ApiClient;
use caravel_attach::{RunRequest, TlsOptions, run_one_off};

use crate::cli::RunArgs;
use crate::error::CliError;

/// Run command executor.
pub struct RunCommand {
    api: Arc<ApiClient>,
    tls: TlsOptions,
}

impl RunCommand {
    /// Create a new run command.
    #[must_use]
    pub fn new(api: Arc<ApiClient>, tls: TlsOptions) -> Self {
        Self { api, tls }
    }

    /// Execute the run command, returning the remote exit code.
    ///
    /// # Errors
    ///
    /// Returns an error if the arguments are invalid or the session
    /// fails at any fatal step.
    pub async fn execute(&self, args: &RunArgs) -> Result<i32, CliError> {
        let request = Self::build_request(args)?;
        debug!(app = %request.app, command = ?request.command, "starting one-off");
        let code = run_one_off(&self.api, &self.tls, &request).await?;
        Ok(code)
    }

    /// Translate parsed arguments into a session request.
    ///
    /// # Errors
    ///
    /// Returns an error if no command was given.
    pub fn build_request(args: &RunArgs) -> Result<RunRequest, CliError> {
        if args.command.is_empty() {
            return Err(CliError::InvalidArgument(
                "command cannot be empty, pass it after `--`".into(),
            ));
        }
        let mut request = RunRequest::new(&args.app, args.command.clone());
        request.env = args.env.clone();
        request.files = args.file.clone();
        request.size = args.size.clone();
        request.silent = args.silent;
        request.detached = args.detached;
        Ok(request)
    }
}
