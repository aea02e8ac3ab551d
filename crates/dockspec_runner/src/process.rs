//! Generic subprocess execution.

use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::error::{RunnerError, RunnerResult};

/// Captured output of a finished subprocess.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: i64,
}

/// Runs an argument vector as a local subprocess.
#[async_trait]
pub trait ProcessExecutor: Send + Sync {
    async fn run(&self, argv: &[String]) -> RunnerResult<ProcessOutput>;
}

/// [`ProcessExecutor`] backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcess;

#[async_trait]
impl ProcessExecutor for SystemProcess {
    async fn run(&self, argv: &[String]) -> RunnerResult<ProcessOutput> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| RunnerError::ExecutionFailed("empty command line".to_string()))?;

        debug!("Executing: {:?}", argv);

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                RunnerError::ExecutionFailed(format!("Failed to spawn {}: {}", program, e))
            })?;

        Ok(ProcessOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            // Killed by a signal
            exit_status: output.status.code().map(i64::from).unwrap_or(-1),
        })
    }
}
