//! Command-line argument parsing with clap.

use clap::{Parser, Subcommand};

/// Caravel CLI - run commands on platform containers.
#[derive(Parser, Debug, Clone)]
#[command(name = "caravel")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Platform API endpoint.
    #[arg(
        long,
        env = "CARAVEL_API_URL",
        default_value = "https://api.caravel.dev"
    )]
    pub api_url: String,

    /// Platform API token.
    #[arg(long, env = "CARAVEL_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// Skip TLS certificate verification on platform connections.
    #[arg(long)]
    pub insecure: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run a one-off command in an application container.
    Run(RunArgs),
}

/// Arguments for the run command.
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Application to run the one-off on.
    #[arg(short, long, env = "CARAVEL_APP")]
    pub app: String,

    /// Command to execute in the container.
    #[arg(last = true)]
    pub command: Vec<String>,

    /// Environment variables (KEY=VALUE, first '=' splits).
    #[arg(short, long, value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    /// Local files or directories to upload before the process starts.
    #[arg(short, long, value_name = "PATH")]
    pub file: Vec<String>,

    /// Container size.
    #[arg(long, default_value = "M")]
    pub size: String,

    /// Suppress progress output.
    #[arg(long)]
    pub silent: bool,

    /// Start the one-off without attaching; output goes to the app logs.
    #[arg(short, long)]
    pub detached: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_structure_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cli_parses_run_with_command() {
        let cli = Cli::parse_from(["caravel", "run", "-a", "myapp", "--", "echo", "hi"]);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.app, "myapp");
                assert_eq!(args.command, vec!["echo", "hi"]);
            }
        }
    }

    #[test]
    fn cli_collects_repeated_env_and_files() {
        let cli = Cli::parse_from([
            "caravel", "run", "-a", "myapp", "-e", "A=1", "-e", "B=2=3", "-f", "/tmp/x",
            "--", "rake", "db:migrate",
        ]);
        let Commands::Run(args) = cli.command;
        assert_eq!(args.env, vec!["A=1", "B=2=3"]);
        assert_eq!(args.file, vec!["/tmp/x"]);
    }

    #[test]
    fn cli_respects_insecure_and_api_url_flags() {
        let cli = Cli::parse_from([
            "caravel",
            "--api-url",
            "https://api.custom.example",
            "--insecure",
            "run",
            "-a",
            "myapp",
            "--",
            "bash",
        ]);
        assert_eq!(cli.api_url, "https://api.custom.example");
        assert!(cli.insecure);
    }

    #[test]
    fn run_defaults_are_interactive_medium() {
        let cli = Cli::parse_from(["caravel", "run", "-a", "myapp", "--", "bash"]);
        let Commands::Run(args) = cli.command;
        assert_eq!(args.size, "M");
        assert!(!args.detached);
        assert!(!args.silent);
    }
}
