//! Compose file loading.

use std::path::{Path, PathBuf};

use serde_yaml::Value;
use tracing::debug;

use crate::error::{RunnerError, RunnerResult};

/// A loaded compose file.
///
/// Only the service names are kept; everything else is left to the compose
/// tool itself.
#[derive(Debug, Clone)]
pub struct ComposeFile {
    path: PathBuf,
    services: Vec<String>,
}

impl ComposeFile {
    /// Read and parse a compose file.
    ///
    /// The stored path is absolute so compose commands can run from the
    /// file's own directory.
    pub fn load(path: &Path) -> RunnerResult<Self> {
        let path = std::fs::canonicalize(path).map_err(|e| RunnerError::Descriptor {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let contents = std::fs::read_to_string(&path).map_err(|e| RunnerError::Descriptor {
            path: path.clone(),
            message: e.to_string(),
        })?;

        Self::parse(path, &contents)
    }

    /// Parse compose YAML. Both the `services:` layout and the legacy
    /// layout with services at the top level are accepted.
    pub fn parse(path: impl Into<PathBuf>, contents: &str) -> RunnerResult<Self> {
        let path = path.into();
        let invalid = |message: String| RunnerError::Descriptor {
            path: path.clone(),
            message,
        };

        let document: Value = serde_yaml::from_str(contents).map_err(|e| invalid(e.to_string()))?;
        let root = document
            .as_mapping()
            .ok_or_else(|| invalid("expected a mapping at the top level".to_string()))?;

        let services = match root.get("services") {
            Some(Value::Mapping(services)) => services,
            Some(_) => return Err(invalid("`services` must be a mapping".to_string())),
            None => root,
        };

        let names = services
            .iter()
            .map(|(key, _)| {
                key.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| invalid(format!("invalid service name: {:?}", key)))
            })
            .collect::<RunnerResult<Vec<_>>>()?;

        if names.is_empty() {
            return Err(invalid("no services defined".to_string()));
        }

        debug!("Loaded {} with services {:?}", path.display(), names);

        Ok(Self {
            path,
            services: names,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory compose commands run from, so relative build contexts resolve.
    pub fn directory(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    pub fn services(&self) -> &[String] {
        &self.services
    }

    pub fn contains(&self, service: &str) -> bool {
        self.services.iter().any(|s| s == service)
    }
}
