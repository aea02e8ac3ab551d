//! Lifecycle of one compose stack.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::ComposeConfig;
use crate::descriptor::ComposeFile;
use crate::engine::{ComposeEngine, ComposeProject};
use crate::error::{RunnerError, RunnerResult};

/// A running container that commands can target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    /// Service name from the compose file
    pub service: String,
    /// Runtime container id
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Loaded,
    Running,
    Finalized,
}

/// Owns a compose stack from `start` until `finalize`.
pub struct ComposeSession {
    descriptor: ComposeFile,
    project: ComposeProject,
    engine: Arc<dyn ComposeEngine>,
    state: SessionState,
}

impl ComposeSession {
    /// Load the compose file named by `config`. Nothing is started yet.
    pub fn load(config: &ComposeConfig, engine: Arc<dyn ComposeEngine>) -> RunnerResult<Self> {
        let descriptor = ComposeFile::load(config.validate()?)?;

        let mut project = ComposeProject::new(descriptor.path());
        if let Some(name) = &config.docker_compose_project {
            project = project.name(name.clone());
        }

        Ok(Self {
            descriptor,
            project,
            engine,
            state: SessionState::Loaded,
        })
    }

    pub fn descriptor(&self) -> &ComposeFile {
        &self.descriptor
    }

    pub fn project(&self) -> &ComposeProject {
        &self.project
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    pub fn is_finalized(&self) -> bool {
        self.state == SessionState::Finalized
    }

    /// Bring the stack up from the compose file's directory, then sleep
    /// whatever part of `grace` the startup itself did not use.
    ///
    /// Returns the time slept.
    pub async fn start(&mut self, grace: Option<Duration>) -> RunnerResult<Duration> {
        match self.state {
            SessionState::Loaded => {}
            SessionState::Running => {
                return Err(RunnerError::ExecutionFailed(
                    "compose session already started".to_string(),
                ))
            }
            SessionState::Finalized => return Err(RunnerError::SessionFinalized),
        }

        let workdir: &Path = self.descriptor.directory();
        info!(
            "Starting compose stack {} in {}",
            self.descriptor.path().display(),
            workdir.display()
        );

        let started_at = Instant::now();
        // Containers may be partially up even when start fails.
        self.state = SessionState::Running;
        self.engine.start(&self.project, workdir).await?;
        let elapsed = started_at.elapsed();

        debug!("Compose stack up after {:?}", elapsed);

        let remaining = remaining_grace(grace, elapsed);
        if let Some(wait) = remaining {
            info!("Waiting {:?} for containers to settle", wait);
            tokio::time::sleep(wait).await;
        }

        Ok(remaining.unwrap_or_default())
    }

    /// Resolve a service name to a running container.
    pub async fn resolve_container(&self, name: Option<&str>) -> RunnerResult<ContainerHandle> {
        if self.is_finalized() {
            return Err(RunnerError::SessionFinalized);
        }

        let name = match name {
            Some(name) if !name.is_empty() => name,
            _ => return Err(RunnerError::ContainerNotSpecified),
        };

        if !self.descriptor.contains(name) {
            return Err(RunnerError::ContainerNotFound(name.to_string()));
        }

        let id = self
            .engine
            .container_id(&self.project, name)
            .await?
            .ok_or_else(|| RunnerError::ContainerNotRunning(name.to_string()))?;

        debug!("Resolved container {} to {}", name, id);

        Ok(ContainerHandle {
            service: name.to_string(),
            id,
        })
    }

    /// Stop then delete the stack.
    ///
    /// Only the first call does anything; later calls return `Ok(())`. Delete
    /// is attempted even when stop fails, and the first error is returned.
    pub async fn finalize(&mut self) -> RunnerResult<()> {
        if self.is_finalized() {
            debug!("Compose session already finalized");
            return Ok(());
        }
        self.state = SessionState::Finalized;

        info!("Tearing down compose stack {}", self.descriptor.path().display());

        let stopped = self.engine.stop(&self.project).await;
        if let Err(e) = &stopped {
            warn!("Failed to stop compose stack: {}", e);
        }
        let deleted = self.engine.delete(&self.project).await;

        stopped.and(deleted)
    }
}

/// `grace - elapsed`, or `None` when there is nothing left to wait.
pub(crate) fn remaining_grace(grace: Option<Duration>, elapsed: Duration) -> Option<Duration> {
    let grace = grace?;
    if elapsed >= grace {
        return None;
    }
    Some(grace - elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining_grace() {
        let secs = Duration::from_secs;

        assert_eq!(remaining_grace(None, secs(0)), None);
        assert_eq!(remaining_grace(Some(secs(10)), secs(3)), Some(secs(7)));
        assert_eq!(remaining_grace(Some(secs(10)), secs(10)), None);
        assert_eq!(remaining_grace(Some(secs(10)), secs(11)), None);
        assert_eq!(remaining_grace(Some(secs(0)), secs(0)), None);
        assert_eq!(
            remaining_grace(Some(Duration::MAX), secs(1)),
            Some(Duration::MAX - secs(1))
        );
    }
}
