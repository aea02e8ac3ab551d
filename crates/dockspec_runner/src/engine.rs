//! Compose orchestration through the `docker compose` CLI.
//!
//! The engine is a trait so the session can be driven by a mock in tests.
//! [`ComposeCli`] supports both the compose plugin (`docker compose`) and the
//! standalone `docker-compose` binary, with automatic detection.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{RunnerError, RunnerResult};

/// Identifies a compose stack on the orchestration side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeProject {
    /// Absolute path to the compose file
    pub file: PathBuf,
    /// Project name passed as `-p`; compose derives one when unset
    pub name: Option<String>,
}

impl ComposeProject {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            name: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Operations the session needs from the orchestration tool.
#[async_trait]
pub trait ComposeEngine: Send + Sync {
    /// Bring the stack up, detached. `workdir` is the compose file's directory.
    async fn start(&self, project: &ComposeProject, workdir: &Path) -> RunnerResult<()>;

    /// Stop all containers of the stack.
    async fn stop(&self, project: &ComposeProject) -> RunnerResult<()>;

    /// Remove the stopped containers of the stack.
    async fn delete(&self, project: &ComposeProject) -> RunnerResult<()>;

    /// Runtime id of the container backing `service`, if it is running.
    async fn container_id(
        &self,
        project: &ComposeProject,
        service: &str,
    ) -> RunnerResult<Option<String>>;
}

const PLUGIN_ARGS: &[&str] = &["compose"];
const NO_ARGS: &[&str] = &[];

/// Which compose executable to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComposeFlavor {
    /// `docker compose` (v2 plugin)
    Plugin,
    /// `docker-compose` (standalone binary)
    Standalone,
}

impl ComposeFlavor {
    /// Get the program and the leading arguments.
    pub fn command(&self) -> (&'static str, &'static [&'static str]) {
        match self {
            Self::Plugin => ("docker", PLUGIN_ARGS),
            Self::Standalone => ("docker-compose", NO_ARGS),
        }
    }
}

impl std::fmt::Display for ComposeFlavor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plugin => write!(f, "docker compose"),
            Self::Standalone => write!(f, "docker-compose"),
        }
    }
}

/// CLI-based compose engine.
#[derive(Debug, Clone)]
pub struct ComposeCli {
    flavor: ComposeFlavor,
    docker_host: Option<String>,
}

impl ComposeCli {
    /// Create an engine with automatic flavor detection.
    ///
    /// `docker_host` is forwarded as `DOCKER_HOST` to every compose call.
    pub async fn detect(docker_host: Option<String>) -> RunnerResult<Self> {
        for flavor in [ComposeFlavor::Plugin, ComposeFlavor::Standalone] {
            if Self::is_flavor_available(flavor).await {
                info!("Using {}", flavor);
                return Ok(Self::with_flavor(flavor, docker_host));
            }
            debug!("{} not available", flavor);
        }

        Err(RunnerError::ComposeNotAvailable(
            "Neither `docker compose` nor `docker-compose` is available".to_string(),
        ))
    }

    /// Create an engine with a specific flavor.
    pub fn with_flavor(flavor: ComposeFlavor, docker_host: Option<String>) -> Self {
        Self {
            flavor,
            docker_host,
        }
    }

    pub fn flavor(&self) -> ComposeFlavor {
        self.flavor
    }

    async fn is_flavor_available(flavor: ComposeFlavor) -> bool {
        let (program, leading) = flavor.command();
        Command::new(program)
            .args(leading)
            .arg("version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Build the argument list for a compose subcommand.
    pub fn build_args(&self, project: &ComposeProject, subcommand: &[&str]) -> Vec<String> {
        let (_, leading) = self.flavor.command();
        let mut args: Vec<String> = leading.iter().map(|a| a.to_string()).collect();

        args.push("-f".to_string());
        args.push(project.file.to_string_lossy().to_string());

        if let Some(name) = &project.name {
            args.push("-p".to_string());
            args.push(name.clone());
        }

        args.extend(subcommand.iter().map(|a| a.to_string()));
        args
    }

    /// Format command for logging.
    fn format_command(&self, args: &[String]) -> String {
        let (program, _) = self.flavor.command();
        let mut cmd = program.to_string();
        for arg in args {
            if arg.contains(' ') {
                cmd.push_str(&format!(" '{}'", arg));
            } else {
                cmd.push_str(&format!(" {}", arg));
            }
        }
        cmd
    }

    /// Run a compose subcommand and return its stdout.
    async fn run(
        &self,
        project: &ComposeProject,
        subcommand: &[&str],
        workdir: Option<&Path>,
    ) -> RunnerResult<String> {
        let (program, _) = self.flavor.command();
        let args = self.build_args(project, subcommand);
        let description = self.format_command(&args);

        let mut cmd = Command::new(program);
        cmd.args(&args).stdin(Stdio::null());
        if let Some(dir) = workdir {
            cmd.current_dir(dir);
        }
        if let Some(host) = &self.docker_host {
            cmd.env("DOCKER_HOST", host);
        }

        debug!("Executing: {}", description);

        let output = cmd.output().await.map_err(|e| {
            RunnerError::ExecutionFailed(format!("Failed to spawn {}: {}", self.flavor, e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!("{} failed: {}", description, stderr);
            return Err(RunnerError::ComposeCommand {
                command: description,
                status: output.status.code().map(i64::from).unwrap_or(-1),
                stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[async_trait]
impl ComposeEngine for ComposeCli {
    async fn start(&self, project: &ComposeProject, workdir: &Path) -> RunnerResult<()> {
        self.run(project, &["up", "-d"], Some(workdir)).await?;
        Ok(())
    }

    async fn stop(&self, project: &ComposeProject) -> RunnerResult<()> {
        self.run(project, &["stop"], None).await?;
        Ok(())
    }

    async fn delete(&self, project: &ComposeProject) -> RunnerResult<()> {
        self.run(project, &["rm", "--force", "-v"], None).await?;
        Ok(())
    }

    async fn container_id(
        &self,
        project: &ComposeProject,
        service: &str,
    ) -> RunnerResult<Option<String>> {
        let stdout = self.run(project, &["ps", "-q", service], None).await?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string))
    }
}
