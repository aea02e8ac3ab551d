//! dockspec CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid configuration
//! - 3: A command exited non-zero

use std::process::ExitCode;

use clap::Parser;
use dockspec_runner::RunnerError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_CONFIG: u8 = 2;
    pub const COMMAND_FAILED: u8 = 3;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args).await,
        Commands::CheckConfig(args) => commands::check_config::execute(args).await,
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(categorize_error(&e))
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let default = if verbose {
        "dockspec=debug"
    } else if quiet {
        "dockspec=error"
    } else {
        "dockspec=info"
    };

    let mut filter = EnvFilter::from_default_env();
    for directive in [default, "warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    // Ignore a subscriber that is already installed.
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

/// Map an error to its exit code.
fn categorize_error(e: &anyhow::Error) -> u8 {
    let invalid_config = e.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<RunnerError>(),
            Some(
                RunnerError::Configuration(_)
                    | RunnerError::Descriptor { .. }
                    | RunnerError::Yaml(_)
                    | RunnerError::Json(_)
                    | RunnerError::Toml(_)
            )
        )
    });

    if invalid_config {
        ExitCodes::INVALID_CONFIG
    } else {
        ExitCodes::GENERAL_ERROR
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_error() {
        let config: anyhow::Error =
            RunnerError::Configuration("Please specify docker_compose_file.".into()).into();
        assert_eq!(categorize_error(&config), ExitCodes::INVALID_CONFIG);

        let wrapped = anyhow::Error::from(RunnerError::Descriptor {
            path: "docker-compose.yml".into(),
            message: "no services defined".into(),
        })
        .context("Failed to start compose stack");
        assert_eq!(categorize_error(&wrapped), ExitCodes::INVALID_CONFIG);

        let other: anyhow::Error = RunnerError::ExecutionFailed("EOW".into()).into();
        assert_eq!(categorize_error(&other), ExitCodes::GENERAL_ERROR);
    }
}
