//! Caravel CLI binary entrypoint.

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use caravel_api::{ApiClient, Credential};
use caravel_attach::TlsOptions;
use caravel_cli::cli::{Cli, Commands};
use caravel_cli::commands::RunCommand;
use caravel_cli::error::CliError;

fn main() -> ExitCode {
    // Diagnostics go to stderr so they never mix into an attached
    // session's output stream.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        // The one-off's own exit code becomes ours.
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<i32, CliError> {
    let token = cli.api_token.clone().ok_or_else(|| {
        CliError::Config("no API token given, set CARAVEL_API_TOKEN or pass --api-token".into())
    })?;
    let api = Arc::new(ApiClient::with_options(
        &cli.api_url,
        Credential::new(token),
        cli.insecure,
    )?);
    let tls = TlsOptions {
        insecure_skip_verify: cli.insecure,
    };

    match cli.command {
        Commands::Run(args) => {
            let cmd = RunCommand::new(api, tls);
            cmd.execute(&args).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_run() {
        let cli = Cli::parse_from([
            "caravel",
            "--api-token",
            "tk",
            "run",
            "-a",
            "myapp",
            "--",
            "bash",
        ]);
        assert!(matches!(cli.command, Commands::Run(_)));
    }

    #[tokio::test]
    async fn run_without_token_is_a_config_error() {
        let mut cli = Cli::parse_from(["caravel", "run", "-a", "myapp", "--", "bash"]);
        // The environment may provide a token; force the unset case.
        cli.api_token = None;
        let result = run(cli).await;
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[tokio::test]
    async fn run_with_unreachable_platform_fails() {
        let mut cli = Cli::parse_from([
            "caravel",
            "--api-token",
            "tk",
            "--api-url",
            "http://127.0.0.1:1",
            "run",
            "-a",
            "myapp",
            "--",
            "bash",
        ]);
        cli.api_token = Some("tk".into());
        let result = run(cli).await;
        assert!(result.is_err());
    }
}
