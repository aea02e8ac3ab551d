//! Command dispatch strategies.
//!
//! [`NativeExec`] goes through the container runtime's exec API.
//! [`LxcAttachExec`] enters the container namespace with `lxc-attach`, for
//! hosts on the LXC exec driver where native exec does not work.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use crate::config::{Backend, ExecOptions};
use crate::docker::ContainerRuntime;
use crate::error::{RunnerError, RunnerResult};
use crate::process::ProcessExecutor;
use crate::runner::CommandResult;
use crate::session::ContainerHandle;

type Transform = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Command rewriting applied before dispatch: `build_command` first, then
/// `add_pre_command`. Both default to the identity.
#[derive(Clone)]
pub struct CommandHooks {
    build_command: Transform,
    add_pre_command: Transform,
}

impl Default for CommandHooks {
    fn default() -> Self {
        Self {
            build_command: Arc::new(|cmd: &str| cmd.to_string()),
            add_pre_command: Arc::new(|cmd: &str| cmd.to_string()),
        }
    }
}

impl std::fmt::Debug for CommandHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHooks").finish_non_exhaustive()
    }
}

impl CommandHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build_command(mut self, f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.build_command = Arc::new(f);
        self
    }

    pub fn add_pre_command(
        mut self,
        f: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        self.add_pre_command = Arc::new(f);
        self
    }

    pub fn apply(&self, cmd: &str) -> String {
        let cmd = (self.build_command)(cmd);
        (self.add_pre_command)(&cmd)
    }
}

/// One way of running a shell command inside a resolved container.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    fn backend(&self) -> Backend;

    async fn execute(
        &self,
        container: &ContainerHandle,
        cmd: &str,
        options: &ExecOptions,
    ) -> RunnerResult<CommandResult>;
}

/// Runs `/bin/sh -c <cmd>` through the runtime's exec API.
pub struct NativeExec {
    runtime: Arc<dyn ContainerRuntime>,
}

impl NativeExec {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    pub fn shell_command(cmd: &str) -> Vec<String> {
        vec!["/bin/sh".to_string(), "-c".to_string(), cmd.to_string()]
    }
}

#[async_trait]
impl CommandExecutor for NativeExec {
    fn backend(&self) -> Backend {
        Backend::DockerCompose
    }

    async fn execute(
        &self,
        container: &ContainerHandle,
        cmd: &str,
        options: &ExecOptions,
    ) -> RunnerResult<CommandResult> {
        let output = self
            .runtime
            .exec(&container.id, &Self::shell_command(cmd), options)
            .await?;

        Ok(CommandResult::new(
            output.stdout.concat(),
            output.stderr.concat(),
            output.exit_status,
        ))
    }
}

/// Stderr prefixes written by the attach tooling itself.
const ATTACH_ERROR_PATTERN: &str = r"\A(lxc-attach|lxc_container|sudo): ";

fn attach_error_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(ATTACH_ERROR_PATTERN).expect("valid attach error pattern"))
}

/// Runs `lxc-attach -n <id> -- sh -c <cmd>` as a local subprocess.
pub struct LxcAttachExec {
    process: Arc<dyn ProcessExecutor>,
    sudo: bool,
}

impl LxcAttachExec {
    pub fn new(process: Arc<dyn ProcessExecutor>) -> Self {
        Self {
            process,
            sudo: false,
        }
    }

    pub fn sudo(mut self, enabled: bool) -> Self {
        self.sudo = enabled;
        self
    }

    pub fn attach_command(&self, container_id: &str, cmd: &str) -> Vec<String> {
        let mut argv = Vec::with_capacity(8);
        if self.sudo {
            argv.push("sudo".to_string());
        }
        argv.extend(
            ["lxc-attach", "-n", container_id, "--", "sh", "-c", cmd]
                .iter()
                .map(|a| a.to_string()),
        );
        argv
    }

    /// Reject failures raised by the attach helper rather than by `cmd`.
    pub fn check_attach_result(stderr: &str, exit_status: i64) -> RunnerResult<()> {
        if exit_status == 0 || !attach_error_pattern().is_match(stderr) {
            return Ok(());
        }
        Err(RunnerError::AttachFailed(stderr.to_string()))
    }
}

#[async_trait]
impl CommandExecutor for LxcAttachExec {
    fn backend(&self) -> Backend {
        Backend::DockerComposeLxc
    }

    async fn execute(
        &self,
        container: &ContainerHandle,
        cmd: &str,
        options: &ExecOptions,
    ) -> RunnerResult<CommandResult> {
        if !options.is_empty() {
            debug!("lxc-attach ignores exec options: {:?}", options);
        }

        let output = self
            .process
            .run(&self.attach_command(&container.id, cmd))
            .await?;
        Self::check_attach_result(&output.stderr, output.exit_status)?;

        Ok(CommandResult::new(
            output.stdout,
            output.stderr,
            output.exit_status,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::SystemProcess;

    #[test]
    fn test_hooks_default_to_identity() {
        assert_eq!(CommandHooks::default().apply("ls -la"), "ls -la");
    }

    #[test]
    fn test_hooks_order() {
        let hooks = CommandHooks::new()
            .build_command(|cmd| format!("{} 2>&1", cmd))
            .add_pre_command(|cmd| format!("cd /tmp && {}", cmd));

        assert_eq!(hooks.apply("ls"), "cd /tmp && ls 2>&1");
    }

    #[test]
    fn test_shell_command() {
        assert_eq!(NativeExec::shell_command("ls -la"), vec!["/bin/sh", "-c", "ls -la"]);
    }

    #[test]
    fn test_attach_command() {
        let exec = LxcAttachExec::new(Arc::new(SystemProcess));
        assert_eq!(
            exec.attach_command("abc123", "ls -la"),
            vec!["lxc-attach", "-n", "abc123", "--", "sh", "-c", "ls -la"]
        );

        let exec = exec.sudo(true);
        assert_eq!(exec.attach_command("abc123", "id")[..2], ["sudo", "lxc-attach"]);
    }

    #[test]
    fn test_attach_errors() {
        for stderr in ["lxc-attach: Error", "lxc_container: Error", "sudo: Error"] {
            let err = LxcAttachExec::check_attach_result(stderr, 1).unwrap_err();
            assert!(matches!(err, RunnerError::AttachFailed(ref s) if s == stderr));
        }
    }

    #[test]
    fn test_application_errors_pass_through() {
        assert!(LxcAttachExec::check_attach_result("myapp: Error", 1).is_ok());
        assert!(LxcAttachExec::check_attach_result("lxc-attach: Error", 0).is_ok());
        // Only a prefix counts
        assert!(LxcAttachExec::check_attach_result("warning\nsudo: Error", 1).is_ok());
    }
}
