//! Version history data model.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

use crate::bpmn::BpmnDocument;
use crate::{Error, Result};

/// Classification of the change a version introduces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[derive(Serialize, Deserialize)]
#[derive(AsRefStr, Display, EnumString, IntoStaticStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChangeType {
    /// Structural rework of the process.
    Major,
    /// Regular edit.
    #[default]
    Minor,
    /// Cosmetic fix such as a renamed label.
    Patch,
}

/// Immutable snapshot of a process at a point in time.
///
/// History listings omit the payload (`bpmn_json` and `xml` are both `None`);
/// a version fetched by id carries at least one of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    /// Unique version identifier.
    pub id: String,
    /// Identifier of the owning process.
    pub process_id: String,
    /// Monotonic per-process number, never reused.
    pub version_number: u32,
    /// Display label, `v{n}` unless the author chose one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_label: Option<String>,
    /// Free-text commit message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_message: Option<String>,
    /// Change classification.
    #[serde(default)]
    pub change_type: ChangeType,
    /// Whether this is the process's current version.
    #[serde(default)]
    pub is_active: bool,
    /// Creation time.
    pub created_at: Timestamp,
    /// Author of the version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    /// Version this one was edited from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_version_id: Option<String>,
    /// Opaque concurrency token assigned by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Canonical JSON payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bpmn_json: Option<serde_json::Value>,
    /// XML payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xml: Option<String>,
}

impl Version {
    /// Returns the label to display, falling back to `v{n}`.
    pub fn label(&self) -> String {
        self.version_label
            .clone()
            .unwrap_or_else(|| format!("v{}", self.version_number))
    }

    /// Returns `true` if the version carries a JSON or XML payload.
    pub fn has_payload(&self) -> bool {
        self.bpmn_json.is_some() || self.xml.is_some()
    }

    /// Decodes the JSON payload, if present.
    pub fn document(&self) -> Result<Option<BpmnDocument>> {
        let Some(value) = &self.bpmn_json else {
            return Ok(None);
        };

        let document = BpmnDocument::from_value(value.clone()).map_err(|error| {
            Error::conversion()
                .with_message(format!("Version {} has an unreadable BPMN payload", self.id))
                .with_source(error)
        })?;

        Ok(Some(document))
    }

    /// Returns a copy of this version without its payload, as history listings carry it.
    pub fn summary(&self) -> Self {
        Self {
            bpmn_json: None,
            xml: None,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version_json() -> serde_json::Value {
        serde_json::json!({
            "id": "ver-3",
            "process_id": "proc-1",
            "version_number": 3,
            "change_type": "major",
            "is_active": true,
            "created_at": "2026-01-15T10:00:00Z",
            "etag": "abc"
        })
    }

    #[test]
    fn test_deserialize_listing_entry() {
        let version: Version = serde_json::from_value(version_json()).unwrap();

        assert_eq!(version.version_number, 3);
        assert_eq!(version.change_type, ChangeType::Major);
        assert!(version.is_active);
        assert!(!version.has_payload());
        assert_eq!(version.label(), "v3");
        assert!(version.document().unwrap().is_none());
    }

    #[test]
    fn test_change_type_defaults_to_minor() {
        let mut value = version_json();
        value.as_object_mut().unwrap().remove("change_type");

        let version: Version = serde_json::from_value(value).unwrap();
        assert_eq!(version.change_type, ChangeType::Minor);
        assert_eq!(ChangeType::Patch.as_ref(), "patch");
    }

    #[test]
    fn test_document_decodes_payload() {
        let mut value = version_json();
        value["bpmn_json"] = serde_json::json!({
            "process": { "id": "Process_1", "name": "Sample" },
            "elements": [{ "id": "Start", "type": "startEvent" }],
            "flows": []
        });

        let version: Version = serde_json::from_value(value).unwrap();
        let document = version.document().unwrap().unwrap();
        assert_eq!(document.process.id, "Process_1");
        assert_eq!(document.elements.len(), 1);
        assert!(version.summary().bpmn_json.is_none());
    }

    #[test]
    fn test_document_rejects_garbage() {
        let mut value = version_json();
        value["bpmn_json"] = serde_json::json!({ "nodes": 12 });

        let version: Version = serde_json::from_value(value).unwrap();
        let error = version.document().unwrap_err();
        assert_eq!(error.kind, crate::ErrorKind::Conversion);
    }
}
