//! Request bodies sent to the ProcessLab API.

use processlab_core::ChangeType;
use processlab_core::bpmn::BpmnDocument;
use serde::{Deserialize, Serialize};

/// Persists a new version of a process.
///
/// `if_match` travels as the `If-Match` header rather than in the body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateVersionRequest {
    /// Canonical document to persist.
    #[serde(rename = "bpmn_json")]
    pub document: BpmnDocument,
    /// Free-text commit message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_message: Option<String>,
    /// Change classification.
    #[serde(default)]
    pub change_type: ChangeType,
    /// Version the document was edited from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_version_id: Option<String>,
    /// Whether the new version becomes the active one.
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// Last-seen concurrency token.
    #[serde(skip)]
    pub if_match: Option<String>,
}

fn default_active() -> bool {
    true
}

impl CreateVersionRequest {
    /// Creates a request for an active minor version.
    pub fn new(document: BpmnDocument) -> Self {
        Self {
            document,
            commit_message: None,
            change_type: ChangeType::default(),
            parent_version_id: None,
            is_active: true,
            if_match: None,
        }
    }

    /// Sets the commit message.
    pub fn with_commit_message(mut self, message: impl Into<String>) -> Self {
        self.commit_message = Some(message.into());
        self
    }

    /// Sets the change classification.
    pub fn with_change_type(mut self, change_type: ChangeType) -> Self {
        self.change_type = change_type;
        self
    }

    /// Sets the parent version.
    pub fn with_parent(mut self, parent_version_id: Option<String>) -> Self {
        self.parent_version_id = parent_version_id;
        self
    }

    /// Sets the `If-Match` precondition.
    pub fn with_if_match(mut self, etag: Option<String>) -> Self {
        self.if_match = etag;
        self
    }
}

/// Appends a new version duplicating an existing one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreVersionRequest {
    /// Version to restore.
    pub version_id: String,
    /// Commit message of the new version; the server supplies one when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_message: Option<String>,
}

impl RestoreVersionRequest {
    /// Creates a restore request.
    pub fn new(version_id: impl Into<String>) -> Self {
        Self {
            version_id: version_id.into(),
            commit_message: None,
        }
    }

    /// Sets the commit message.
    pub fn with_commit_message(mut self, message: Option<String>) -> Self {
        self.commit_message = message;
        self
    }
}

/// Creates a process without any version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProcessRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
}

impl CreateProcessRequest {
    /// Creates a request for a process with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            project_id: None,
            folder_id: None,
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    /// Sets the owning project.
    pub fn with_project(mut self, project_id: Option<String>) -> Self {
        self.project_id = project_id;
        self
    }

    /// Sets the containing folder.
    pub fn with_folder(mut self, folder_id: Option<String>) -> Self {
        self.folder_id = folder_id;
        self
    }
}

/// A natural-language edit of a document.
///
/// Exactly one of `bpmn` and `bpmn_xml` is expected; JSON is preferred.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bpmn: Option<BpmnDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bpmn_xml: Option<String>,
    /// Free-text instruction.
    pub command: String,
    /// Version the document was loaded from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version_id: Option<String>,
    /// Concurrency token of `model_version_id`.
    #[serde(rename = "ifMatch", default, skip_serializing_if = "Option::is_none")]
    pub if_match: Option<String>,
}

impl EditRequest {
    /// Creates an edit of a JSON document.
    pub fn from_document(document: BpmnDocument, command: impl Into<String>) -> Self {
        Self {
            bpmn: Some(document),
            bpmn_xml: None,
            command: command.into(),
            model_version_id: None,
            if_match: None,
        }
    }

    /// Creates an edit of an XML document.
    pub fn from_xml(xml: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            bpmn: None,
            bpmn_xml: Some(xml.into()),
            command: command.into(),
            model_version_id: None,
            if_match: None,
        }
    }

    /// Sets the version the document was loaded from and its token.
    pub fn with_version(mut self, version_id: Option<String>, etag: Option<String>) -> Self {
        self.model_version_id = version_id;
        self.if_match = etag;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_version_wire_format() {
        let request = CreateVersionRequest::new(BpmnDocument::empty("Onboarding"))
            .with_commit_message("First draft")
            .with_change_type(ChangeType::Major)
            .with_parent(Some("ver-1".into()))
            .with_if_match(Some("etag-1".into()));

        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["bpmn_json"]["process"]["name"], "Onboarding");
        assert_eq!(value["commit_message"], "First draft");
        assert_eq!(value["change_type"], "major");
        assert_eq!(value["parent_version_id"], "ver-1");
        assert_eq!(value["is_active"], true);
        assert!(value.get("if_match").is_none());
    }

    #[test]
    fn test_edit_request_wire_format() {
        let request = EditRequest::from_xml("<definitions/>", "add start event")
            .with_version(Some("ver-2".into()), Some("etag-2".into()));

        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["bpmn_xml"], "<definitions/>");
        assert_eq!(value["model_version_id"], "ver-2");
        assert_eq!(value["ifMatch"], "etag-2");
        assert!(value.get("bpmn").is_none());
    }

    #[test]
    fn test_create_process_skips_missing_fields() {
        let request = CreateProcessRequest::new("Claims").with_project(Some("proj-1".into()));

        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(
            value,
            serde_json::json!({ "name": "Claims", "project_id": "proj-1" })
        );
    }
}
