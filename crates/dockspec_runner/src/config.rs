//! Backend configuration types.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::error::{RunnerError, RunnerResult};

/// How commands reach the container under test.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Docker Engine exec API.
    #[default]
    DockerCompose,
    /// `lxc-attach` into the container namespace, for the LXC exec driver.
    DockerComposeLxc,
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Self::DockerCompose => "docker_compose",
            Self::DockerComposeLxc => "docker_compose_lxc",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Compose backend configuration.
///
/// Field names follow the option keys used by the test suites that drive
/// this backend, so a config file reads the same as the suite settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposeConfig {
    /// Execution mechanism
    #[serde(default)]
    pub backend: Backend,
    /// Docker Engine endpoint (`unix://`, `tcp://` or `http://`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_url: Option<String>,
    /// Path to the compose file
    #[serde(default)]
    pub docker_compose_file: Option<PathBuf>,
    /// Service to run commands in, read on every command
    #[serde(default)]
    pub docker_compose_container: Option<String>,
    /// Compose project name (`-p`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_compose_project: Option<String>,
    /// Seconds to wait after the stack is up
    #[serde(default, deserialize_with = "deserialize_wait")]
    pub docker_wait: Option<f64>,
    /// Tear the stack down when a command hits an unexpected error
    #[serde(default = "default_teardown_on_error")]
    pub teardown_on_error: bool,
    /// Prefix the attach helper with `sudo`
    #[serde(default)]
    pub lxc_sudo: bool,
}

fn default_teardown_on_error() -> bool {
    true
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WaitValue {
    Seconds(f64),
    Other(serde::de::IgnoredAny),
}

/// Any non-numeric `docker_wait` means "no wait", matching how suites
/// commonly leave the key set to a placeholder.
fn deserialize_wait<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<WaitValue>::deserialize(deserializer)? {
        Some(WaitValue::Seconds(seconds)) => Some(seconds),
        Some(WaitValue::Other(_)) => {
            warn!("Ignoring non-numeric docker_wait value");
            None
        }
        None => None,
    })
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            docker_url: None,
            docker_compose_file: None,
            docker_compose_container: None,
            docker_compose_project: None,
            docker_wait: None,
            teardown_on_error: true,
            lxc_sudo: false,
        }
    }
}

impl ComposeConfig {
    pub fn new(compose_file: impl Into<PathBuf>) -> Self {
        Self {
            docker_compose_file: Some(compose_file.into()),
            ..Default::default()
        }
    }

    pub fn container(mut self, name: impl Into<String>) -> Self {
        self.docker_compose_container = Some(name.into());
        self
    }

    pub fn docker_url(mut self, url: impl Into<String>) -> Self {
        self.docker_url = Some(url.into());
        self
    }

    pub fn project(mut self, name: impl Into<String>) -> Self {
        self.docker_compose_project = Some(name.into());
        self
    }

    pub fn wait(mut self, seconds: f64) -> Self {
        self.docker_wait = Some(seconds);
        self
    }

    pub fn backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    pub fn lxc(self) -> Self {
        self.backend(Backend::DockerComposeLxc)
    }

    pub fn sudo(mut self, enabled: bool) -> Self {
        self.lxc_sudo = enabled;
        self
    }

    pub fn teardown_on_error(mut self, enabled: bool) -> Self {
        self.teardown_on_error = enabled;
        self
    }

    /// Load configuration from a YAML, TOML or JSON file, picked by extension.
    pub fn from_file(path: &Path) -> RunnerResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        match extension.as_str() {
            "yml" | "yaml" => Ok(serde_yaml::from_str(&contents)?),
            "toml" => Ok(toml::from_str(&contents)?),
            "json" => Ok(serde_json::from_str(&contents)?),
            other => Err(RunnerError::Configuration(format!(
                "Unsupported config format {:?}: {}",
                other,
                path.display()
            ))),
        }
    }

    /// Check the options needed before any container is started.
    pub fn validate(&self) -> RunnerResult<&Path> {
        match self.docker_compose_file.as_deref() {
            Some(path) if !path.as_os_str().is_empty() => Ok(path),
            _ => Err(RunnerError::Configuration(
                "Please specify docker_compose_file.".to_string(),
            )),
        }
    }

    /// Grace period after startup, if `docker_wait` is a usable number.
    ///
    /// Values too large for a [`Duration`] saturate to [`Duration::MAX`].
    pub fn grace_period(&self) -> Option<Duration> {
        let seconds = self
            .docker_wait
            .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)?;

        Some(Duration::try_from_secs_f64(seconds).unwrap_or_else(|_| {
            warn!("docker_wait of {} seconds is out of range; waiting indefinitely", seconds);
            Duration::MAX
        }))
    }
}

/// Options forwarded to a single exec call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecOptions {
    /// User to run as (e.g., "1000:1000")
    pub user: Option<String>,
    /// Working directory inside the container
    pub working_dir: Option<String>,
    /// Extra environment variables
    pub env: HashMap<String, String>,
    /// Allocate a TTY
    pub tty: bool,
}

impl ExecOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn tty(mut self, enabled: bool) -> Self {
        self.tty = enabled;
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_config_builder() {
        let config = ComposeConfig::new("/srv/app/docker-compose.yml")
            .container("web")
            .wait(15.0)
            .lxc()
            .sudo(true);

        assert_eq!(config.docker_compose_container.as_deref(), Some("web"));
        assert_eq!(config.backend, Backend::DockerComposeLxc);
        assert!(config.lxc_sudo);
        assert!(config.teardown_on_error);
        assert_eq!(config.grace_period(), Some(Duration::from_secs(15)));
    }

    #[test]
    fn test_missing_compose_file() {
        let err = ComposeConfig::default().validate().unwrap_err();
        assert_eq!(err.to_string(), "Please specify docker_compose_file.");

        let err = ComposeConfig::new("").validate().unwrap_err();
        assert_eq!(err.to_string(), "Please specify docker_compose_file.");
    }

    #[test]
    fn test_yaml_keys() {
        let yaml = r#"
docker_compose_file: tests/data/docker-compose.yml
docker_compose_container: wordpress
docker_wait: 15
backend: docker_compose_lxc
"#;
        let config: ComposeConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(
            config.docker_compose_file,
            Some(PathBuf::from("tests/data/docker-compose.yml"))
        );
        assert_eq!(config.docker_wait, Some(15.0));
        assert_eq!(config.backend, Backend::DockerComposeLxc);
        assert!(config.teardown_on_error);
    }

    #[test]
    fn test_non_numeric_wait_is_ignored() {
        let yaml = "docker_compose_file: a.yml\ndocker_wait: soon\n";
        let config: ComposeConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.docker_wait, None);
        assert_eq!(config.grace_period(), None);
    }

    #[test]
    fn test_unusable_wait_values() {
        assert_eq!(ComposeConfig::new("a.yml").wait(-1.0).grace_period(), None);
        assert_eq!(ComposeConfig::new("a.yml").wait(f64::NAN).grace_period(), None);
        assert_eq!(
            ComposeConfig::new("a.yml").wait(f64::INFINITY).grace_period(),
            None
        );
        assert_eq!(
            ComposeConfig::new("a.yml").wait(0.5).grace_period(),
            Some(Duration::from_millis(500))
        );
    }

    #[test]
    fn test_huge_wait_saturates() {
        let yaml = "docker_compose_file: a.yml\ndocker_wait: 1.0e20\n";
        let config: ComposeConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.docker_wait, Some(1.0e20));
        assert_eq!(config.grace_period(), Some(Duration::MAX));
        assert_eq!(
            ComposeConfig::new("a.yml").wait(f64::MAX).grace_period(),
            Some(Duration::MAX)
        );
    }

    #[test]
    fn test_exec_options() {
        assert!(ExecOptions::new().is_empty());

        let options = ExecOptions::new().user("www-data").env("LANG", "C");
        assert!(!options.is_empty());
        assert_eq!(options.env.get("LANG"), Some(&"C".to_string()));
    }
}
