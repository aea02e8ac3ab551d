//! Docker Engine exec through bollard.

use async_trait::async_trait;
use bollard::container::LogOutput;
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::Docker;
use futures_util::StreamExt;
use tracing::debug;

use crate::config::ExecOptions;
use crate::error::{RunnerError, RunnerResult};

const CONNECT_TIMEOUT_SECS: u64 = 120;

/// Output of an exec call, as delivered by the runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Stdout chunks in arrival order
    pub stdout: Vec<String>,
    /// Stderr chunks in arrival order
    pub stderr: Vec<String>,
    pub exit_status: i64,
}

/// Execute-in-container primitive of a container runtime.
///
/// Errors of the [`RunnerError::DockerApi`] kind are treated as fatal by the
/// command runner.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn exec(
        &self,
        container_id: &str,
        argv: &[String],
        options: &ExecOptions,
    ) -> RunnerResult<ExecOutput>;
}

/// Docker-based container runtime.
pub struct DockerRuntime {
    client: Docker,
}

impl DockerRuntime {
    /// Connect to the given endpoint, or to the local defaults
    /// (`DOCKER_HOST` or the default socket) when `url` is `None`.
    pub fn connect(url: Option<&str>) -> RunnerResult<Self> {
        let client = match url {
            None => Docker::connect_with_local_defaults()?,
            Some(url) => Self::connect_with_url(url)?,
        };
        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn from_client(client: Docker) -> Self {
        Self { client }
    }

    #[cfg(unix)]
    fn connect_with_url(url: &str) -> RunnerResult<Docker> {
        if let Some(path) = url.strip_prefix("unix://") {
            return Ok(Docker::connect_with_unix(
                path,
                CONNECT_TIMEOUT_SECS,
                bollard::API_DEFAULT_VERSION,
            )?);
        }
        Self::connect_with_host(url)
    }

    #[cfg(not(unix))]
    fn connect_with_url(url: &str) -> RunnerResult<Docker> {
        Self::connect_with_host(url)
    }

    fn connect_with_host(url: &str) -> RunnerResult<Docker> {
        let host = if let Some(rest) = url.strip_prefix("tcp://") {
            format!("http://{}", rest)
        } else if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            return Err(RunnerError::Configuration(format!(
                "Unsupported docker_url: {}",
                url
            )));
        };

        Ok(Docker::connect_with_http(
            &host,
            CONNECT_TIMEOUT_SECS,
            bollard::API_DEFAULT_VERSION,
        )?)
    }

    /// Check that the daemon answers.
    pub async fn ping(&self) -> RunnerResult<()> {
        self.client.ping().await?;
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn exec(
        &self,
        container_id: &str,
        argv: &[String],
        options: &ExecOptions,
    ) -> RunnerResult<ExecOutput> {
        debug!("Docker exec in {}: {:?}", container_id, argv);

        let env: Vec<String> = options
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();

        let exec = self
            .client
            .create_exec(
                container_id,
                CreateExecOptions {
                    cmd: Some(argv.to_vec()),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    tty: Some(options.tty),
                    user: options.user.clone(),
                    working_dir: options.working_dir.clone(),
                    env: if env.is_empty() { None } else { Some(env) },
                    ..Default::default()
                },
            )
            .await?;

        let mut output = ExecOutput::default();

        if let StartExecResults::Attached { output: mut stream, .. } =
            self.client.start_exec(&exec.id, None).await?
        {
            while let Some(chunk) = stream.next().await {
                match chunk? {
                    LogOutput::StdOut { message } | LogOutput::Console { message } => {
                        output.stdout.push(String::from_utf8_lossy(&message).to_string());
                    }
                    LogOutput::StdErr { message } => {
                        output.stderr.push(String::from_utf8_lossy(&message).to_string());
                    }
                    _ => {}
                }
            }
        }

        let inspect = self.client.inspect_exec(&exec.id).await?;
        output.exit_status = inspect.exit_code.ok_or_else(|| {
            RunnerError::ExecutionFailed(format!(
                "exec {} in {} finished without an exit code",
                exec.id, container_id
            ))
        })?;

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_unknown_scheme() {
        let err = DockerRuntime::connect(Some("ftp://docker.example")).err().unwrap();
        assert_eq!(err.to_string(), "Unsupported docker_url: ftp://docker.example");
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_connect_over_tcp_is_lazy() {
        assert!(DockerRuntime::connect(Some("tcp://127.0.0.1:2375")).is_ok());
        assert!(DockerRuntime::connect(Some("http://127.0.0.1:2375")).is_ok());
    }
}
