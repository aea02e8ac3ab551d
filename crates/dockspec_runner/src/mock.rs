//! Mock collaborators for testing.
//!
//! Provides configurable implementations of [`ComposeEngine`],
//! [`ContainerRuntime`] and [`ProcessExecutor`] that capture every call and
//! return predefined responses, so runners can be exercised without Docker.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::config::ExecOptions;
use crate::docker::{ContainerRuntime, ExecOutput};
use crate::engine::{ComposeEngine, ComposeProject};
use crate::error::{RunnerError, RunnerResult};
use crate::process::{ProcessExecutor, ProcessOutput};

/// Captured call information for verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedCall {
    pub method: String,
    /// Service, container id or program the call was aimed at
    pub target: Option<String>,
    pub command: Option<Vec<String>>,
    pub workdir: Option<PathBuf>,
}

impl CapturedCall {
    fn method(method: &str) -> Self {
        Self {
            method: method.to_string(),
            target: None,
            command: None,
            workdir: None,
        }
    }
}

#[derive(Debug, Default)]
struct CallLog {
    calls: RwLock<Vec<CapturedCall>>,
}

impl CallLog {
    fn record(&self, call: CapturedCall) {
        self.calls.write().push(call);
    }

    fn all(&self) -> Vec<CapturedCall> {
        self.calls.read().clone()
    }

    fn methods(&self) -> Vec<String> {
        self.calls.read().iter().map(|c| c.method.clone()).collect()
    }

    fn count(&self, method: &str) -> usize {
        self.calls.read().iter().filter(|c| c.method == method).count()
    }
}

/// Predefined response for an exec or subprocess call.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Output {
        stdout: Vec<String>,
        stderr: Vec<String>,
        exit_status: i64,
    },
    /// Fails with a Docker API error
    DockerError(String),
    /// Fails with a non-fatal execution error
    Error(String),
}

impl MockResponse {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self::Output {
            stdout: vec![stdout.into()],
            stderr: Vec::new(),
            exit_status: 0,
        }
    }

    pub fn failure(exit_status: i64, stderr: impl Into<String>) -> Self {
        Self::Output {
            stdout: Vec::new(),
            stderr: vec![stderr.into()],
            exit_status,
        }
    }

    /// Output delivered in several chunks, as the exec stream does.
    pub fn chunks(stdout: &[&str], stderr: &[&str], exit_status: i64) -> Self {
        Self::Output {
            stdout: stdout.iter().map(|s| s.to_string()).collect(),
            stderr: stderr.iter().map(|s| s.to_string()).collect(),
            exit_status,
        }
    }

    pub fn docker_error(message: impl Into<String>) -> Self {
        Self::DockerError(message.into())
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    fn into_exec_output(self) -> RunnerResult<ExecOutput> {
        match self {
            Self::Output {
                stdout,
                stderr,
                exit_status,
            } => Ok(ExecOutput {
                stdout,
                stderr,
                exit_status,
            }),
            Self::DockerError(message) => Err(RunnerError::DockerApi(
                bollard::errors::Error::DockerResponseServerError {
                    status_code: 500,
                    message,
                },
            )),
            Self::Error(message) => Err(RunnerError::ExecutionFailed(message)),
        }
    }
}

#[derive(Debug, Default)]
struct ResponseQueue {
    responses: RwLock<Vec<MockResponse>>,
    index: AtomicUsize,
}

impl ResponseQueue {
    /// Responses are served in order and cycle once exhausted.
    fn next(&self) -> MockResponse {
        let responses = self.responses.read();
        if responses.is_empty() {
            return MockResponse::success("");
        }
        let index = self.index.fetch_add(1, Ordering::SeqCst);
        responses[index % responses.len()].clone()
    }
}

/// Mock compose engine.
#[derive(Clone, Default)]
pub struct MockComposeEngine {
    calls: Arc<CallLog>,
    container_ids: Arc<RwLock<HashMap<String, Option<String>>>>,
    fail_start: Arc<RwLock<Option<String>>>,
    fail_stop: Arc<RwLock<Option<String>>>,
    start_delay: Arc<RwLock<Duration>>,
}

impl MockComposeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a service to a container id. Unmapped services resolve to
    /// `mock-<service>`.
    pub fn with_container(self, service: impl Into<String>, id: impl Into<String>) -> Self {
        self.container_ids
            .write()
            .insert(service.into(), Some(id.into()));
        self
    }

    /// Report `service` as not running.
    pub fn with_stopped_container(self, service: impl Into<String>) -> Self {
        self.container_ids.write().insert(service.into(), None);
        self
    }

    /// Make `start` take at least `delay`.
    pub fn with_start_delay(self, delay: Duration) -> Self {
        *self.start_delay.write() = delay;
        self
    }

    pub fn fail_start(self, message: impl Into<String>) -> Self {
        *self.fail_start.write() = Some(message.into());
        self
    }

    pub fn fail_stop(self, message: impl Into<String>) -> Self {
        *self.fail_stop.write() = Some(message.into());
        self
    }

    pub fn get_calls(&self) -> Vec<CapturedCall> {
        self.calls.all()
    }

    /// Method names in call order.
    pub fn methods(&self) -> Vec<String> {
        self.calls.methods()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls.count(method)
    }

    /// Working directory passed to the last `start`.
    pub fn start_workdir(&self) -> Option<PathBuf> {
        self.calls
            .all()
            .into_iter()
            .rev()
            .find(|c| c.method == "start")
            .and_then(|c| c.workdir)
    }

    fn compose_failure(command: &str, message: Option<String>) -> RunnerResult<()> {
        match message {
            Some(stderr) => Err(RunnerError::ComposeCommand {
                command: command.to_string(),
                status: 1,
                stderr,
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ComposeEngine for MockComposeEngine {
    async fn start(&self, project: &ComposeProject, workdir: &Path) -> RunnerResult<()> {
        self.calls.record(CapturedCall {
            target: Some(project.file.to_string_lossy().to_string()),
            workdir: Some(workdir.to_path_buf()),
            ..CapturedCall::method("start")
        });
        let delay = *self.start_delay.read();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Self::compose_failure("docker compose up", self.fail_start.read().clone())
    }

    async fn stop(&self, _project: &ComposeProject) -> RunnerResult<()> {
        self.calls.record(CapturedCall::method("stop"));
        Self::compose_failure("docker compose stop", self.fail_stop.read().clone())
    }

    async fn delete(&self, _project: &ComposeProject) -> RunnerResult<()> {
        self.calls.record(CapturedCall::method("delete"));
        Ok(())
    }

    async fn container_id(
        &self,
        _project: &ComposeProject,
        service: &str,
    ) -> RunnerResult<Option<String>> {
        self.calls.record(CapturedCall {
            target: Some(service.to_string()),
            ..CapturedCall::method("container_id")
        });
        Ok(self
            .container_ids
            .read()
            .get(service)
            .cloned()
            .unwrap_or_else(|| Some(format!("mock-{}", service))))
    }
}

/// Mock container runtime.
#[derive(Clone, Default)]
pub struct MockRuntime {
    calls: Arc<CallLog>,
    responses: Arc<ResponseQueue>,
    options: Arc<RwLock<Vec<ExecOptions>>>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_response(self, response: MockResponse) -> Self {
        self.responses.responses.write().push(response);
        self
    }

    pub fn with_responses(self, responses: Vec<MockResponse>) -> Self {
        *self.responses.responses.write() = responses;
        self
    }

    pub fn get_calls(&self) -> Vec<CapturedCall> {
        self.calls.all()
    }

    pub fn call_count(&self) -> usize {
        self.calls.count("exec")
    }

    /// Options passed to each exec call.
    pub fn exec_options(&self) -> Vec<ExecOptions> {
        self.options.read().clone()
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    async fn exec(
        &self,
        container_id: &str,
        argv: &[String],
        options: &ExecOptions,
    ) -> RunnerResult<ExecOutput> {
        self.calls.record(CapturedCall {
            target: Some(container_id.to_string()),
            command: Some(argv.to_vec()),
            ..CapturedCall::method("exec")
        });
        self.options.write().push(options.clone());
        self.responses.next().into_exec_output()
    }
}

/// Mock subprocess executor.
#[derive(Clone, Default)]
pub struct MockProcess {
    calls: Arc<CallLog>,
    responses: Arc<ResponseQueue>,
}

impl MockProcess {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_response(self, response: MockResponse) -> Self {
        self.responses.responses.write().push(response);
        self
    }

    pub fn get_calls(&self) -> Vec<CapturedCall> {
        self.calls.all()
    }

    pub fn call_count(&self) -> usize {
        self.calls.count("run")
    }
}

#[async_trait]
impl ProcessExecutor for MockProcess {
    async fn run(&self, argv: &[String]) -> RunnerResult<ProcessOutput> {
        self.calls.record(CapturedCall {
            target: argv.first().cloned(),
            command: Some(argv.to_vec()),
            ..CapturedCall::method("run")
        });
        let output = self.responses.next().into_exec_output()?;
        Ok(ProcessOutput {
            stdout: output.stdout.concat(),
            stderr: output.stderr.concat(),
            exit_status: output.exit_status,
        })
    }
}
