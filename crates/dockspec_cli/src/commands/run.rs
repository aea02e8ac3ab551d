//! Run command - Start a stack and run commands in one service.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tracing::{info, warn};

use dockspec_runner::{CommandResult, CommandRunner, ExecOptions};

use super::ConfigArgs;
use crate::ExitCodes;

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// User to run commands as
    #[arg(short, long)]
    pub user: Option<String>,

    /// Working directory inside the container
    #[arg(long)]
    pub workdir: Option<String>,

    /// Environment variable for the commands (KEY=VALUE)
    #[arg(short, long = "env", value_parser = parse_env)]
    pub env: Vec<(String, String)>,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,

    /// Shell commands to run, in order
    #[arg(required = true)]
    pub commands: Vec<String>,
}

#[derive(Serialize)]
struct CommandReport<'a> {
    command: &'a str,
    #[serde(flatten)]
    result: &'a CommandResult,
}

fn parse_env(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((key, val)) if !key.is_empty() => Ok((key.to_string(), val.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {:?}", value)),
    }
}

fn exec_options(args: &RunArgs) -> ExecOptions {
    let mut options = ExecOptions::new();
    if let Some(user) = &args.user {
        options = options.user(user.clone());
    }
    if let Some(dir) = &args.workdir {
        options = options.working_dir(dir.clone());
    }
    for (key, value) in &args.env {
        options = options.env(key.clone(), value.clone());
    }
    options
}

pub async fn execute(args: RunArgs) -> Result<u8> {
    let config = args.config.resolve()?;
    let options = exec_options(&args);

    let compose_file = config.validate()?.display().to_string();
    info!("Running {} command(s) against {}", args.commands.len(), compose_file);

    let mut runner = CommandRunner::start(config)
        .await
        .with_context(|| format!("Failed to start compose stack {}", compose_file))?;

    let mut results = Vec::with_capacity(args.commands.len());
    for cmd in &args.commands {
        match runner.run_command(cmd, &options).await {
            Ok(result) => results.push((cmd.as_str(), result)),
            Err(e) => {
                if let Err(teardown) = runner.finalize().await {
                    warn!("Teardown failed: {}", teardown);
                }
                return Err(e).with_context(|| format!("Command {:?} could not run", cmd));
            }
        }
    }

    runner
        .finalize()
        .await
        .context("Failed to tear down compose stack")?;

    if args.json {
        let reports: Vec<_> = results
            .iter()
            .map(|(command, result)| CommandReport {
                command: *command,
                result,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        print_results(&results);
    }

    if results.iter().all(|(_, result)| result.success()) {
        Ok(ExitCodes::SUCCESS)
    } else {
        Ok(ExitCodes::COMMAND_FAILED)
    }
}

fn print_results(results: &[(&str, CommandResult)]) {
    for (cmd, result) in results {
        let icon = if result.success() { "✅" } else { "❌" };
        println!("{} $ {} (exit {})", icon, cmd, result.exit_status);
        if !result.stdout().is_empty() {
            println!("{}", result.stdout().trim_end());
        }
        if !result.stderr().is_empty() {
            eprintln!("{}", result.stderr().trim_end());
        }
    }

    let failed = results.iter().filter(|(_, r)| r.failure()).count();
    println!();
    if failed == 0 {
        println!("✅ All {} command(s) succeeded", results.len());
    } else {
        println!("❌ {} of {} command(s) failed", failed, results.len());
    }
}
