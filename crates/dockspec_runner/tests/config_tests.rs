//! Tests for loading backend configuration from files.

use std::path::PathBuf;
use std::time::Duration;

use dockspec_runner::{Backend, ComposeConfig, RunnerError};

fn write(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_load_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        &dir,
        "dockspec.yml",
        "docker_compose_file: docker-compose.yml\ndocker_compose_container: mysql\ndocker_wait: 2.5\n",
    );

    let config = ComposeConfig::from_file(&path).unwrap();

    assert_eq!(config.docker_compose_container.as_deref(), Some("mysql"));
    assert_eq!(config.grace_period(), Some(Duration::from_millis(2500)));
    assert_eq!(config.backend, Backend::DockerCompose);
}

#[test]
fn test_load_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        &dir,
        "dockspec.toml",
        r#"
backend = "docker_compose_lxc"
docker_compose_file = "stack/docker-compose.yml"
docker_compose_container = "wordpress"
docker_wait = 10
lxc_sudo = true
teardown_on_error = false
"#,
    );

    let config = ComposeConfig::from_file(&path).unwrap();

    assert_eq!(config.backend, Backend::DockerComposeLxc);
    assert!(config.lxc_sudo);
    assert!(!config.teardown_on_error);
    assert_eq!(config.grace_period(), Some(Duration::from_secs(10)));
    assert_eq!(
        config.validate().unwrap(),
        PathBuf::from("stack/docker-compose.yml").as_path()
    );
}

#[test]
fn test_load_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        &dir,
        "dockspec.json",
        r#"{"docker_compose_file": "docker-compose.yml", "docker_url": "tcp://127.0.0.1:2375"}"#,
    );

    let config = ComposeConfig::from_file(&path).unwrap();

    assert_eq!(config.docker_url.as_deref(), Some("tcp://127.0.0.1:2375"));
    assert_eq!(config.docker_compose_container, None);
    assert_eq!(config.grace_period(), None);
}

#[test]
fn test_unknown_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "dockspec.ini", "docker_compose_file=x");

    let err = ComposeConfig::from_file(&path).unwrap_err();

    assert!(matches!(err, RunnerError::Configuration(_)));
    assert!(err.to_string().contains("Unsupported config format"));
}

#[test]
fn test_missing_file() {
    let err = ComposeConfig::from_file(&PathBuf::from("/nonexistent/dockspec.yml")).unwrap_err();
    assert!(matches!(err, RunnerError::Io(_)));
}
