//! Per-example command metadata.
//!
//! Test frameworks attach command, stdout and stderr to the example that
//! ran them so failure reports can show what happened in the container.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Receives the command and its output after every execution attempt.
pub trait ExampleMetadata: Send + Sync {
    fn record(&self, command: &str, stdout: Option<&str>, stderr: Option<&str>);
}

/// One recorded execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub command: String,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// In-memory [`ExampleMetadata`] keeping every record in order.
#[derive(Debug, Clone, Default)]
pub struct MemoryMetadata {
    records: Arc<RwLock<Vec<MetadataRecord>>>,
}

impl MemoryMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<MetadataRecord> {
        self.records.read().clone()
    }

    /// The values an example would currently hold.
    pub fn last(&self) -> Option<MetadataRecord> {
        self.records.read().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn clear(&self) {
        self.records.write().clear();
    }
}

impl ExampleMetadata for MemoryMetadata {
    fn record(&self, command: &str, stdout: Option<&str>, stderr: Option<&str>) {
        self.records.write().push(MetadataRecord {
            command: command.to_string(),
            stdout: stdout.map(str::to_string),
            stderr: stderr.map(str::to_string),
            recorded_at: Utc::now(),
        });
    }
}
