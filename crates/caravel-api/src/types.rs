//! Wire types for the one-off run endpoints.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Parameters for creating a one-off run.
#[derive(Debug, Clone, Serialize)]
pub struct RunParams {
    /// Command argument vector to execute in the container.
    pub command: Vec<String>,
    /// Environment variables injected into the one-off.
    pub env: BTreeMap<String, String>,
    /// Container size (e.g. "M", "L").
    pub size: String,
    /// Run detached, without an interactive attach.
    pub detached: bool,
    /// Whether files will be uploaded before the process starts.
    pub has_uploads: bool,
}

/// Descriptor of the container hosting the one-off.
#[derive(Debug, Clone, Deserialize)]
pub struct ContainerDescriptor {
    /// Container type name (e.g. "one-off").
    #[serde(rename = "type")]
    pub container_type: String,
    /// Index of the container within its type.
    pub type_index: u32,
}

impl ContainerDescriptor {
    /// Human-readable label, e.g. `one-off-3`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}-{}", self.container_type, self.type_index)
    }
}

/// A created one-off run, ready to be attached.
#[derive(Debug, Clone, Deserialize)]
pub struct RunCreated {
    /// Session-specific endpoint for the tunnel and uploads.
    pub attach_url: String,
    /// Container hosting the process.
    pub container: ContainerDescriptor,
}

/// Terminal dimensions sent on resize.
///
/// The platform expects both fields as decimal strings.
#[derive(Debug, Clone, Serialize)]
pub struct TtySize {
    /// Column count.
    pub width: String,
    /// Row count.
    pub height: String,
}

impl TtySize {
    /// Build from numeric column/row counts.
    #[must_use]
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            width: cols.to_string(),
            height: rows.to_string(),
        }
    }
}
