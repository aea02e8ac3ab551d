//! Error types for the runner module.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Errors that can occur during runner operations.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("{0}")]
    Configuration(String),

    #[error("Please specify docker_compose_container.")]
    ContainerNotSpecified,

    #[error("Container not found: {0:?}")]
    ContainerNotFound(String),

    #[error("Container is not running: {0:?}")]
    ContainerNotRunning(String),

    #[error("Invalid compose file {}: {message}", path.display())]
    Descriptor { path: PathBuf, message: String },

    #[error("Docker Compose not available: {0}")]
    ComposeNotAvailable(String),

    #[error("{command} exited with status {status}: {stderr}")]
    ComposeCommand {
        command: String,
        status: i64,
        stderr: String,
    },

    #[error("Compose session already finalized")]
    SessionFinalized,

    #[error("Container execution failed: {0}")]
    ExecutionFailed(String),

    /// The attach helper failed before the command ran inside the container.
    #[error("{0}")]
    AttachFailed(String),

    #[error("{backend} does not support send_file")]
    SendFileUnsupported { backend: &'static str },

    #[error("Docker API error: {0}")]
    DockerApi(#[from] bollard::errors::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl RunnerError {
    /// Fatal errors always reach the caller. Everything else raised while
    /// running a command is turned into a failed [`crate::CommandResult`].
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::DockerApi(_) | Self::AttachFailed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let docker = RunnerError::DockerApi(bollard::errors::Error::DockerResponseServerError {
            status_code: 500,
            message: "boom".to_string(),
        });
        assert!(docker.is_fatal());
        assert!(RunnerError::AttachFailed("lxc-attach: Error".into()).is_fatal());

        assert!(!RunnerError::ContainerNotSpecified.is_fatal());
        assert!(!RunnerError::ExecutionFailed("EOW".into()).is_fatal());
        assert!(!RunnerError::SessionFinalized.is_fatal());
    }

    #[test]
    fn test_resolution_messages() {
        assert_eq!(
            RunnerError::ContainerNotSpecified.to_string(),
            "Please specify docker_compose_container."
        );
        assert_eq!(
            RunnerError::ContainerNotFound("unknown".into()).to_string(),
            "Container not found: \"unknown\""
        );
    }
}
