//! Response bodies returned by the ProcessLab API.

use processlab_core::Version;
use processlab_core::bpmn::BpmnDocument;
use serde::{Deserialize, Serialize};

/// Version history of a process, as returned by the listing endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionList {
    pub process_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_name: Option<String>,
    /// Versions without payloads, in server order.
    #[serde(default)]
    pub versions: Vec<Version>,
    #[serde(default)]
    pub total_count: u32,
}

impl VersionList {
    /// Returns the versions sorted descending by number.
    pub fn into_sorted(self) -> Vec<Version> {
        let mut versions = self.versions;
        versions.sort_by(|a, b| b.version_number.cmp(&a.version_number));
        versions
    }
}

/// Result of a natural-language edit. The edited document is already persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditResponse {
    /// The edited document.
    pub bpmn: BpmnDocument,
    /// Version created for the edit.
    #[serde(rename = "versionId")]
    pub version_id: String,
    /// Human-readable descriptions of the applied changes.
    #[serde(default)]
    pub changes: Vec<String>,
}

impl EditResponse {
    /// One-line summary of the change list.
    pub fn summary(&self) -> String {
        match self.changes.as_slice() {
            [] => "Done. No changes were needed.".to_owned(),
            [only] => format!("Done. {only}."),
            changes => format!("Done. {}.", changes.join("; ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_list_sorts_descending() {
        let list: VersionList = serde_json::from_value(serde_json::json!({
            "process_id": "proc-1",
            "process_name": "Claims",
            "total_count": 3,
            "versions": [
                { "id": "a", "process_id": "proc-1", "version_number": 1, "created_at": "2026-01-01T00:00:00Z" },
                { "id": "c", "process_id": "proc-1", "version_number": 3, "created_at": "2026-01-03T00:00:00Z" },
                { "id": "b", "process_id": "proc-1", "version_number": 2, "created_at": "2026-01-02T00:00:00Z" }
            ]
        }))
        .unwrap();

        let numbers: Vec<u32> = list.into_sorted().iter().map(|v| v.version_number).collect();
        assert_eq!(numbers, vec![3, 2, 1]);
    }

    #[test]
    fn test_edit_response_summary() {
        let mut response = EditResponse {
            bpmn: BpmnDocument::empty("Claims"),
            version_id: "ver-4".into(),
            changes: vec![],
        };
        assert_eq!(response.summary(), "Done. No changes were needed.");

        response.changes = vec!["Added task 'Review'".into(), "Connected 'Start' to 'Review'".into()];
        assert_eq!(
            response.summary(),
            "Done. Added task 'Review'; Connected 'Start' to 'Review'."
        );
    }

    #[test]
    fn test_edit_response_reads_camel_case_version() {
        let response: EditResponse = serde_json::from_value(serde_json::json!({
            "bpmn": { "process": { "id": "Process_1" } },
            "versionId": "ver-9"
        }))
        .unwrap();

        assert_eq!(response.version_id, "ver-9");
        assert!(response.changes.is_empty());
    }
}
