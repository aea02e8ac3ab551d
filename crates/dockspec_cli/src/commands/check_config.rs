//! Check-config command - Validate configuration without starting anything.

use anyhow::Result;
use clap::Args;
use tracing::info;

use dockspec_runner::{ComposeConfig, ComposeFile, RunnerError};

use super::ConfigArgs;
use crate::ExitCodes;

#[derive(Args)]
pub struct CheckConfigArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Print the resolved configuration as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: CheckConfigArgs) -> Result<u8> {
    let config = args.config.resolve()?;
    let descriptor = check(&config)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(ExitCodes::SUCCESS);
    }

    println!("📋 Compose file: {}", descriptor.path().display());
    println!("   Backend: {}", config.backend);
    println!("   Services: {}", descriptor.services().join(", "));

    match config.docker_compose_container.as_deref() {
        Some(name) => println!("   Target service: {}", name),
        None => println!("   ⚠️  No docker_compose_container set; commands will fail"),
    }
    match config.grace_period() {
        Some(wait) => println!("   Grace period: {:?}", wait),
        None => println!("   Grace period: none"),
    }

    println!();
    println!("✅ Configuration is valid");
    Ok(ExitCodes::SUCCESS)
}

/// Load the compose file and check the target service exists in it.
fn check(config: &ComposeConfig) -> Result<ComposeFile> {
    let path = config.validate()?;
    info!("Checking compose file {}", path.display());

    let descriptor = ComposeFile::load(path)?;
    if let Some(name) = config.docker_compose_container.as_deref() {
        if !descriptor.contains(name) {
            return Err(RunnerError::Configuration(format!(
                "Service {:?} is not defined in {}",
                name,
                descriptor.path().display()
            ))
            .into());
        }
    }

    Ok(descriptor)
}
