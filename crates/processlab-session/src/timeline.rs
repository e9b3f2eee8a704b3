//! Timeline entries and the two-click compare protocol.

use jiff::Timestamp;
use processlab_core::{ChangeType, Version};
use serde::{Deserialize, Serialize};

/// Compare affordance shown on an entry while comparing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareRole {
    /// The first version picked.
    Base,
    /// Any other version, offered as the candidate.
    Compare,
}

/// One row of the version timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub version_id: String,
    pub version_number: u32,
    pub label: String,
    pub commit_message: Option<String>,
    pub change_type: ChangeType,
    pub created_at: Timestamp,
    pub created_by: Option<String>,
    /// The process's current version.
    pub is_active: bool,
    /// The version shown in the editor.
    pub is_selected: bool,
    pub can_restore: bool,
    pub compare_role: Option<CompareRole>,
}

/// Versions picked for a comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparePair {
    pub base: String,
    pub candidate: String,
}

/// Result of a click in compare mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompareOutcome {
    /// Compare mode entered with the clicked version as base.
    Started,
    /// A candidate was picked; compare mode is left.
    Ready(ComparePair),
    /// The base was clicked again; compare mode is left.
    Cancelled,
}

/// Presentation state of the version timeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionTimeline {
    compare_base: Option<String>,
}

impl VersionTimeline {
    /// Creates an idle timeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the timeline rows, newest first.
    pub fn entries(&self, versions: &[Version], selected: Option<&str>) -> Vec<TimelineEntry> {
        let mut entries: Vec<TimelineEntry> = versions
            .iter()
            .map(|version| TimelineEntry {
                version_id: version.id.clone(),
                version_number: version.version_number,
                label: version.label(),
                commit_message: version.commit_message.clone(),
                change_type: version.change_type,
                created_at: version.created_at,
                created_by: version.created_by.clone(),
                is_active: version.is_active,
                is_selected: selected == Some(version.id.as_str()),
                can_restore: !version.is_active,
                compare_role: self.compare_base.as_ref().map(|base| {
                    if *base == version.id {
                        CompareRole::Base
                    } else {
                        CompareRole::Compare
                    }
                }),
            })
            .collect();

        entries.sort_by(|a, b| b.version_number.cmp(&a.version_number));
        entries
    }

    /// Handles a compare click on `version_id`.
    pub fn compare_click(&mut self, version_id: &str) -> CompareOutcome {
        match self.compare_base.take() {
            None => {
                self.compare_base = Some(version_id.to_owned());
                CompareOutcome::Started
            }
            Some(base) if base == version_id => CompareOutcome::Cancelled,
            Some(base) => CompareOutcome::Ready(ComparePair {
                base,
                candidate: version_id.to_owned(),
            }),
        }
    }

    /// Leaves compare mode. Returns `false` if it was not active.
    pub fn cancel_compare(&mut self) -> bool {
        self.compare_base.take().is_some()
    }

    /// Returns `true` while a base version is picked.
    pub fn is_comparing(&self) -> bool {
        self.compare_base.is_some()
    }

    /// Returns the picked base version.
    pub fn compare_base(&self) -> Option<&str> {
        self.compare_base.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(number: u32, is_active: bool) -> Version {
        Version {
            id: format!("v{number}"),
            process_id: "proc-1".into(),
            version_number: number,
            version_label: None,
            commit_message: Some(format!("Revision {number}")),
            change_type: ChangeType::Minor,
            is_active,
            created_at: Timestamp::UNIX_EPOCH,
            created_by: None,
            parent_version_id: None,
            etag: None,
            bpmn_json: None,
            xml: None,
        }
    }

    fn history() -> Vec<Version> {
        vec![version(1, false), version(3, true), version(2, false)]
    }

    #[test]
    fn test_entries_are_sorted_with_distinct_flags() {
        let timeline = VersionTimeline::new();
        let entries = timeline.entries(&history(), Some("v2"));

        let ids: Vec<&str> = entries.iter().map(|e| e.version_id.as_str()).collect();
        assert_eq!(ids, vec!["v3", "v2", "v1"]);

        assert!(entries[0].is_active && !entries[0].is_selected);
        assert!(!entries[1].is_active && entries[1].is_selected);
        assert!(!entries[0].can_restore);
        assert!(entries[1].can_restore && entries[2].can_restore);
        assert!(entries.iter().all(|e| e.compare_role.is_none()));
        assert_eq!(entries[2].label, "v1");
    }

    #[test]
    fn test_compare_two_versions() {
        let mut timeline = VersionTimeline::new();

        assert_eq!(timeline.compare_click("v2"), CompareOutcome::Started);
        assert!(timeline.is_comparing());

        let entries = timeline.entries(&history(), None);
        let role = |id: &str| entries.iter().find(|e| e.version_id == id).unwrap().compare_role;
        assert_eq!(role("v2"), Some(CompareRole::Base));
        assert_eq!(role("v3"), Some(CompareRole::Compare));
        assert_eq!(role("v1"), Some(CompareRole::Compare));

        assert_eq!(
            timeline.compare_click("v3"),
            CompareOutcome::Ready(ComparePair {
                base: "v2".into(),
                candidate: "v3".into(),
            })
        );
        assert!(!timeline.is_comparing());
    }

    #[test]
    fn test_clicking_base_again_cancels() {
        let mut timeline = VersionTimeline::new();
        timeline.compare_click("v2");

        assert_eq!(timeline.compare_click("v2"), CompareOutcome::Cancelled);
        assert!(!timeline.is_comparing());
        assert!(timeline.compare_base().is_none());
    }

    #[test]
    fn test_cancel_compare() {
        let mut timeline = VersionTimeline::new();
        assert!(!timeline.cancel_compare());

        timeline.compare_click("v1");
        assert!(timeline.cancel_compare());
        assert!(!timeline.is_comparing());
    }
}
