//! CLI command definitions.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dockspec_runner::{Backend, ComposeConfig};

pub mod check_config;
pub mod run;

/// dockspec - run verification commands inside Docker Compose containers
#[derive(Parser)]
#[command(name = "dockspec")]
#[command(version, about = "Run verification commands inside Docker Compose containers")]
#[command(long_about = r#"
dockspec brings up a Docker Compose stack, runs shell commands inside one of
its services, reports the results and tears the stack down again.

COMMANDS:
  run           → Start the stack and run commands in a service
  check-config  → Validate a configuration file and its compose file

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid configuration
  3 - A command exited non-zero
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a compose stack and run commands in one of its services
    Run(run::RunArgs),

    /// Validate a configuration file and the compose file it names
    #[command(name = "check-config")]
    CheckConfig(check_config::CheckConfigArgs),
}

/// Options shared by commands that build a [`ComposeConfig`].
#[derive(Args, Debug, Default)]
pub struct ConfigArgs {
    /// Configuration file (YAML, TOML or JSON)
    #[arg(short, long, env = "DOCKSPEC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Compose file, overrides docker_compose_file
    #[arg(short = 'f', long)]
    pub file: Option<PathBuf>,

    /// Service to run commands in, overrides docker_compose_container
    #[arg(long)]
    pub container: Option<String>,

    /// Docker Engine endpoint, overrides docker_url
    #[arg(long, env = "DOCKER_HOST")]
    pub docker_url: Option<String>,

    /// Compose project name
    #[arg(short, long)]
    pub project: Option<String>,

    /// Seconds to wait after the stack is up
    #[arg(short, long)]
    pub wait: Option<f64>,

    /// Run commands through lxc-attach instead of the exec API
    #[arg(long)]
    pub lxc: bool,

    /// Prefix lxc-attach with sudo
    #[arg(long, requires = "lxc")]
    pub sudo: bool,

    /// Keep the stack running after an unexpected error
    #[arg(long)]
    pub keep_on_error: bool,
}

impl ConfigArgs {
    /// Load the config file, if any, then apply flag overrides.
    pub fn resolve(&self) -> Result<ComposeConfig> {
        let mut config = match &self.config {
            Some(path) => ComposeConfig::from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => ComposeConfig::default(),
        };

        if let Some(file) = &self.file {
            config.docker_compose_file = Some(file.clone());
        }
        if let Some(container) = &self.container {
            config = config.container(container.clone());
        }
        if let Some(url) = &self.docker_url {
            config = config.docker_url(url.clone());
        }
        if let Some(project) = &self.project {
            config = config.project(project.clone());
        }
        if let Some(wait) = self.wait {
            config = config.wait(wait);
        }
        if self.lxc {
            config = config.backend(Backend::DockerComposeLxc);
        }
        if self.sudo {
            config = config.sudo(true);
        }
        if self.keep_on_error {
            config = config.teardown_on_error(false);
        }

        Ok(config)
    }
}
