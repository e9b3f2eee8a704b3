//! Process data model.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// A versioned BPMN process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Process {
    /// Unique process identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Owning project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Containing folder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
    /// Currently active version, if any version exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_version_id: Option<String>,
    /// Number of versions recorded for this process.
    #[serde(default)]
    pub version_count: u32,
    /// Creation time.
    pub created_at: Timestamp,
}

impl Process {
    /// Returns `true` if no version has been saved yet.
    pub fn is_empty(&self) -> bool {
        self.version_count == 0 && self.current_version_id.is_none()
    }
}
