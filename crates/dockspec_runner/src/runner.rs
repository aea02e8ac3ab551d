//! Command runner and result types.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error as _;
use std::path::Path;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::{Backend, ComposeConfig, ExecOptions};
use crate::docker::{ContainerRuntime, DockerRuntime};
use crate::engine::{ComposeCli, ComposeEngine};
use crate::error::{RunnerError, RunnerResult};
use crate::executor::{CommandExecutor, CommandHooks, LxcAttachExec, NativeExec};
use crate::metadata::ExampleMetadata;
use crate::process::{ProcessExecutor, SystemProcess};
use crate::session::ComposeSession;

/// Result of one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Captured stdout; `None` when the command never ran
    pub stdout: Option<String>,
    /// Captured stderr, or the error report when the command never ran
    pub stderr: Option<String>,
    pub exit_status: i64,
}

impl CommandResult {
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>, exit_status: i64) -> Self {
        Self {
            stdout: Some(stdout.into()),
            stderr: Some(stderr.into()),
            exit_status,
        }
    }

    /// Check if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }

    pub fn failure(&self) -> bool {
        !self.success()
    }

    pub fn stdout(&self) -> &str {
        self.stdout.as_deref().unwrap_or_default()
    }

    pub fn stderr(&self) -> &str {
        self.stderr.as_deref().unwrap_or_default()
    }
}

/// Builds a [`CommandRunner`]. Collaborators that are not supplied are
/// created from the configuration.
pub struct RunnerBuilder {
    config: ComposeConfig,
    engine: Option<Arc<dyn ComposeEngine>>,
    runtime: Option<Arc<dyn ContainerRuntime>>,
    process: Option<Arc<dyn ProcessExecutor>>,
    hooks: CommandHooks,
    metadata: Option<Arc<dyn ExampleMetadata>>,
}

impl RunnerBuilder {
    pub fn new(config: ComposeConfig) -> Self {
        Self {
            config,
            engine: None,
            runtime: None,
            process: None,
            hooks: CommandHooks::default(),
            metadata: None,
        }
    }

    pub fn engine(mut self, engine: Arc<dyn ComposeEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn runtime(mut self, runtime: Arc<dyn ContainerRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn process(mut self, process: Arc<dyn ProcessExecutor>) -> Self {
        self.process = Some(process);
        self
    }

    pub fn hooks(mut self, hooks: CommandHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn metadata(mut self, metadata: Arc<dyn ExampleMetadata>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Load the compose file, start the stack and wait the grace period.
    ///
    /// If startup fails the stack is torn down before the error is returned.
    pub async fn start(self) -> RunnerResult<CommandRunner> {
        self.config.validate()?;

        let executor: Box<dyn CommandExecutor> = match self.config.backend {
            Backend::DockerCompose => {
                if self.process.is_some() {
                    debug!("docker_compose backend ignores the injected process executor");
                }
                let runtime = match self.runtime {
                    Some(runtime) => runtime,
                    None => Arc::new(DockerRuntime::connect(self.config.docker_url.as_deref())?),
                };
                Box::new(NativeExec::new(runtime))
            }
            Backend::DockerComposeLxc => {
                if self.runtime.is_some() {
                    debug!("docker_compose_lxc backend ignores the injected container runtime");
                }
                let process = self.process.unwrap_or_else(|| Arc::new(SystemProcess));
                Box::new(LxcAttachExec::new(process).sudo(self.config.lxc_sudo))
            }
        };

        let engine = match self.engine {
            Some(engine) => engine,
            None => Arc::new(ComposeCli::detect(self.config.docker_url.clone()).await?),
        };

        let mut session = ComposeSession::load(&self.config, engine)?;
        if let Err(err) = session.start(self.config.grace_period()).await {
            error!("Compose startup failed: {}", err);
            if let Err(teardown) = session.finalize().await {
                warn!("Teardown after failed startup failed: {}", teardown);
            }
            return Err(err);
        }

        info!(
            "{} backend ready for {}",
            executor.backend(),
            session.descriptor().path().display()
        );

        Ok(CommandRunner {
            config: self.config,
            session,
            executor,
            hooks: self.hooks,
            metadata: self.metadata,
        })
    }

    /// Start a runner, hand it to `f`, and finalize it on every exit path
    /// of `f`.
    ///
    /// An error from `f` wins over a teardown error.
    pub async fn scoped<T, F>(self, f: F) -> RunnerResult<T>
    where
        F: for<'a> FnOnce(&'a mut CommandRunner) -> BoxFuture<'a, RunnerResult<T>>,
    {
        let mut runner = self.start().await?;
        let outcome = f(&mut runner).await;
        let teardown = runner.finalize().await;

        match (outcome, teardown) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(teardown)) => Err(teardown),
            (Err(err), teardown) => {
                if let Err(teardown) = teardown {
                    warn!("Teardown failed after error: {}", teardown);
                }
                Err(err)
            }
        }
    }
}

/// Runs shell commands inside one service of a compose stack.
///
/// The stack lives until [`CommandRunner::finalize`]. Dropping a runner
/// whose stack is still up only logs a warning; prefer
/// [`RunnerBuilder::scoped`] when the stack must never outlive the caller.
pub struct CommandRunner {
    config: ComposeConfig,
    session: ComposeSession,
    executor: Box<dyn CommandExecutor>,
    hooks: CommandHooks,
    metadata: Option<Arc<dyn ExampleMetadata>>,
}

impl CommandRunner {
    pub fn builder(config: ComposeConfig) -> RunnerBuilder {
        RunnerBuilder::new(config)
    }

    /// Start a runner with collaborators built from `config`.
    pub async fn start(config: ComposeConfig) -> RunnerResult<Self> {
        RunnerBuilder::new(config).start().await
    }

    /// Shorthand for [`RunnerBuilder::scoped`] with default collaborators.
    pub async fn scoped<T, F>(config: ComposeConfig, f: F) -> RunnerResult<T>
    where
        F: for<'a> FnOnce(&'a mut CommandRunner) -> BoxFuture<'a, RunnerResult<T>>,
    {
        RunnerBuilder::new(config).scoped(f).await
    }

    pub fn backend(&self) -> Backend {
        self.executor.backend()
    }

    pub fn session(&self) -> &ComposeSession {
        &self.session
    }

    pub fn config(&self) -> &ComposeConfig {
        &self.config
    }

    /// Service targeted by the next command.
    pub fn container(&self) -> Option<&str> {
        self.config.docker_compose_container.as_deref()
    }

    /// Target another service of the same stack.
    pub fn set_container(&mut self, name: impl Into<String>) {
        self.config.docker_compose_container = Some(name.into());
    }

    /// Attach the metadata sink of the current example, or detach with `None`.
    pub fn set_metadata(&mut self, metadata: Option<Arc<dyn ExampleMetadata>>) {
        self.metadata = metadata;
    }

    /// Run `cmd` in the target container.
    ///
    /// A non-zero exit of `cmd` is a normal result. Fatal errors (Docker API,
    /// attach helper) are returned as `Err`. Any other error tears the stack
    /// down (unless `teardown_on_error` is off) and comes back as a result
    /// with exit status 1 and the error report in stderr.
    pub async fn run_command(
        &mut self,
        cmd: &str,
        options: &ExecOptions,
    ) -> RunnerResult<CommandResult> {
        let cmd = self.hooks.apply(cmd);

        match self.dispatch(&cmd, options).await {
            Ok(result) => {
                debug!("{:?} exited with {}", cmd, result.exit_status);
                self.record_metadata(&cmd, result.stdout.as_deref(), result.stderr.as_deref());
                Ok(result)
            }
            Err(err) if err.is_fatal() => {
                error!("{:?} failed: {}", cmd, err);
                Err(err)
            }
            Err(err) => {
                warn!("{:?} failed: {}", cmd, err);
                if self.config.teardown_on_error {
                    if let Err(teardown) = self.session.finalize().await {
                        error!("Teardown failed: {}", teardown);
                    }
                }
                Ok(self.erroneous_result(&cmd, &err))
            }
        }
    }

    async fn dispatch(&self, cmd: &str, options: &ExecOptions) -> RunnerResult<CommandResult> {
        let container = self.session.resolve_container(self.container()).await?;
        self.executor.execute(&container, cmd, options).await
    }

    /// Files cannot be copied into compose containers by this backend.
    pub fn send_file(&self, _from: &Path, _to: &Path) -> RunnerResult<()> {
        Err(RunnerError::SendFileUnsupported {
            backend: self.backend().name(),
        })
    }

    /// Stop and delete the stack.
    pub async fn finalize(mut self) -> RunnerResult<()> {
        self.session.finalize().await
    }

    fn erroneous_result(&self, cmd: &str, err: &RunnerError) -> CommandResult {
        let report = error_report(err);
        self.record_metadata(cmd, None, Some(&report));
        CommandResult {
            stdout: None,
            stderr: Some(report),
            exit_status: 1,
        }
    }

    fn record_metadata(&self, cmd: &str, stdout: Option<&str>, stderr: Option<&str>) {
        if let Some(metadata) = &self.metadata {
            metadata.record(cmd, stdout, stderr);
        }
    }
}

impl Drop for CommandRunner {
    fn drop(&mut self) {
        if self.session.is_running() {
            warn!(
                "Compose stack {} dropped without finalize; containers are left running",
                self.session.descriptor().path().display()
            );
        }
    }
}

/// Error message followed by one `caused by:` line per source error.
///
/// The cause chain stands in for a stack trace: errors carry no backtrace of
/// their own, so a backtrace is only appended when `RUST_BACKTRACE` enables
/// capture, and it then shows where the report was built.
fn error_report(err: &RunnerError) -> String {
    let mut lines = vec![err.to_string()];

    let mut source = err.source();
    while let Some(cause) = source {
        lines.push(format!("caused by: {}", cause));
        source = cause.source();
    }

    let backtrace = Backtrace::capture();
    if backtrace.status() == BacktraceStatus::Captured {
        lines.push(backtrace.to_string());
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_result_status() {
        let ok = CommandResult::new("ok", "", 0);
        assert!(ok.success());
        assert!(!ok.failure());
        assert_eq!(ok.stdout(), "ok");

        let failed = CommandResult::new("", "my error", 25);
        assert!(failed.failure());
        assert_eq!(failed.stderr(), "my error");
    }

    #[test]
    fn test_error_report_starts_with_message() {
        let report = error_report(&RunnerError::ExecutionFailed("EOW".into()));
        assert!(report.starts_with("Container execution failed: EOW"));
    }

    #[test]
    fn test_error_report_lists_cause_chain_in_order() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such socket");
        let report = error_report(&RunnerError::Io(io));
        let lines: Vec<&str> = report.lines().collect();

        assert_eq!(lines[0], "IO error: no such socket");
        assert_eq!(lines[1], "caused by: no such socket");
    }

    #[test]
    fn test_error_report_includes_causes() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let report = error_report(&RunnerError::Io(io));
        assert!(report.contains("IO error: pipe closed"));
        assert!(report.contains("caused by: pipe closed"));
    }
}
