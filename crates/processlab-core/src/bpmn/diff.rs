//! Structural comparison of two documents.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::document::{BpmnDocument, Element, Lane, SequenceFlow};

/// An element present in both documents whose content differs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modified<T> {
    pub before: T,
    pub after: T,
}

/// Changes between a base document and a candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDiff {
    pub process_changed: bool,
    pub added_elements: Vec<Element>,
    pub removed_elements: Vec<Element>,
    pub modified_elements: Vec<Modified<Element>>,
    pub added_flows: Vec<SequenceFlow>,
    pub removed_flows: Vec<SequenceFlow>,
    pub modified_flows: Vec<Modified<SequenceFlow>>,
    pub added_lanes: Vec<Lane>,
    pub removed_lanes: Vec<Lane>,
    pub modified_lanes: Vec<Modified<Lane>>,
}

/// Compares `base` with `candidate`.
///
/// Elements and lanes are keyed by id, flows by id or `source->target` when
/// unnamed. Entries are reported in the order they appear in their document.
pub fn diff(base: &BpmnDocument, candidate: &BpmnDocument) -> DocumentDiff {
    let (added_elements, removed_elements, modified_elements) =
        compare(&base.elements, &candidate.elements, |e| e.id.clone());
    let (added_flows, removed_flows, modified_flows) =
        compare(&base.flows, &candidate.flows, SequenceFlow::key);
    let (added_lanes, removed_lanes, modified_lanes) =
        compare(&base.lanes, &candidate.lanes, |l| l.id.clone());

    DocumentDiff {
        process_changed: base.process != candidate.process,
        added_elements,
        removed_elements,
        modified_elements,
        added_flows,
        removed_flows,
        modified_flows,
        added_lanes,
        removed_lanes,
        modified_lanes,
    }
}

type Comparison<T> = (Vec<T>, Vec<T>, Vec<Modified<T>>);

fn compare<T, K>(base: &[T], candidate: &[T], key: K) -> Comparison<T>
where
    T: Clone + PartialEq,
    K: Fn(&T) -> String,
{
    let base = keyed(base, &key);
    let candidate = keyed(candidate, &key);
    let base_index: HashMap<&str, &T> = base.iter().map(|(k, item)| (k.as_str(), *item)).collect();
    let candidate_index: HashMap<&str, &T> =
        candidate.iter().map(|(k, item)| (k.as_str(), *item)).collect();

    let mut added = Vec::new();
    let mut modified = Vec::new();
    for (key, item) in &candidate {
        match base_index.get(key.as_str()) {
            None => added.push((*item).clone()),
            Some(before) if before != item => modified.push(Modified {
                before: (*before).clone(),
                after: (*item).clone(),
            }),
            Some(_) => {}
        }
    }

    let removed = base
        .iter()
        .filter(|(key, _)| !candidate_index.contains_key(key.as_str()))
        .map(|(_, item)| (*item).clone())
        .collect();

    (added, removed, modified)
}

/// Pairs items with their keys; repeated keys get an occurrence suffix.
fn keyed<'a, T, K>(items: &'a [T], key: &K) -> Vec<(String, &'a T)>
where
    K: Fn(&T) -> String,
{
    let mut seen: HashMap<String, usize> = HashMap::new();
    items
        .iter()
        .map(|item| {
            let key = key(item);
            let occurrence = seen.entry(key.clone()).or_default();
            *occurrence += 1;
            match *occurrence {
                1 => (key, item),
                n => (format!("{key}#{n}"), item),
            }
        })
        .collect()
}

impl DocumentDiff {
    /// Returns `true` if the documents are structurally identical.
    pub fn is_empty(&self) -> bool {
        !self.process_changed
            && self.added_elements.is_empty()
            && self.removed_elements.is_empty()
            && self.modified_elements.is_empty()
            && self.added_flows.is_empty()
            && self.removed_flows.is_empty()
            && self.modified_flows.is_empty()
            && self.added_lanes.is_empty()
            && self.removed_lanes.is_empty()
            && self.modified_lanes.is_empty()
    }

    /// Total number of changed entries.
    pub fn change_count(&self) -> usize {
        usize::from(self.process_changed)
            + self.added_elements.len()
            + self.removed_elements.len()
            + self.modified_elements.len()
            + self.added_flows.len()
            + self.removed_flows.len()
            + self.modified_flows.len()
            + self.added_lanes.len()
            + self.removed_lanes.len()
            + self.modified_lanes.len()
    }

    /// Human-readable change lines, e.g. `Added 2 elements`.
    pub fn summary(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if self.process_changed {
            lines.push("Updated process details".to_owned());
        }

        let groups = [
            ("Added", self.added_elements.len(), "element"),
            ("Removed", self.removed_elements.len(), "element"),
            ("Modified", self.modified_elements.len(), "element"),
            ("Added", self.added_flows.len(), "flow"),
            ("Removed", self.removed_flows.len(), "flow"),
            ("Modified", self.modified_flows.len(), "flow"),
            ("Added", self.added_lanes.len(), "lane"),
            ("Removed", self.removed_lanes.len(), "lane"),
            ("Modified", self.modified_lanes.len(), "lane"),
        ];
        for (verb, count, noun) in groups {
            match count {
                0 => {}
                1 => lines.push(format!("{verb} 1 {noun}")),
                n => lines.push(format!("{verb} {n} {noun}s")),
            }
        }

        if lines.is_empty() {
            lines.push("No changes detected".to_owned());
        }
        lines
    }

    /// Detailed per-entry lines, one per changed element, flow or lane.
    pub fn details(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for element in &self.added_elements {
            lines.push(format!(
                "+ {} '{}' ({})",
                element.kind.display_name(),
                element.label(),
                element.id
            ));
        }
        for element in &self.removed_elements {
            lines.push(format!(
                "- {} '{}' ({})",
                element.kind.display_name(),
                element.label(),
                element.id
            ));
        }
        for change in &self.modified_elements {
            lines.push(format!(
                "~ {} ({})",
                describe_element_change(&change.before, &change.after),
                change.after.id
            ));
        }
        for flow in &self.added_flows {
            lines.push(format!("+ flow {} -> {}", flow.source, flow.target));
        }
        for flow in &self.removed_flows {
            lines.push(format!("- flow {} -> {}", flow.source, flow.target));
        }
        for change in &self.modified_flows {
            lines.push(format!(
                "~ flow {} now {} -> {}",
                change.after.key(),
                change.after.source,
                change.after.target
            ));
        }
        for lane in &self.added_lanes {
            lines.push(format!("+ lane '{}'", lane.name.as_deref().unwrap_or(&lane.id)));
        }
        for lane in &self.removed_lanes {
            lines.push(format!("- lane '{}'", lane.name.as_deref().unwrap_or(&lane.id)));
        }
        for change in &self.modified_lanes {
            lines.push(format!("~ lane '{}'", change.after.id));
        }
        lines
    }
}

fn describe_element_change(before: &Element, after: &Element) -> String {
    if before.kind != after.kind {
        format!(
            "converted '{}' from {} to {}",
            after.label(),
            before.kind.display_name(),
            after.kind.display_name()
        )
    } else if before.name != after.name {
        format!("renamed '{}' to '{}'", before.label(), after.label())
    } else if before.lane_id != after.lane_id {
        format!("moved '{}' to another lane", after.label())
    } else {
        format!("updated '{}'", after.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bpmn::ElementType;

    fn base() -> BpmnDocument {
        let mut document = BpmnDocument::new("Process_1", Some("Sample".into()));
        document.elements = vec![
            Element::new("Start", ElementType::StartEvent),
            Element::new("Task_1", ElementType::Task).with_name("Review"),
            Element::new("End", ElementType::EndEvent),
        ];
        document.flows = vec![
            SequenceFlow::new("Flow_1", "Start", "Task_1"),
            SequenceFlow {
                id: None,
                ..SequenceFlow::new("", "Task_1", "End")
            },
        ];
        document
    }

    #[test]
    fn test_identical_documents_have_no_changes() {
        let changes = diff(&base(), &base());

        assert!(changes.is_empty());
        assert_eq!(changes.change_count(), 0);
        assert_eq!(changes.summary(), vec!["No changes detected".to_owned()]);
        assert!(changes.details().is_empty());
    }

    #[test]
    fn test_detects_added_removed_and_modified() {
        let mut candidate = base();
        candidate.elements[1].name = Some("Approve".into());
        candidate.elements.remove(0);
        candidate
            .elements
            .push(Element::new("Task_2", ElementType::UserTask).with_name("Sign"));
        candidate
            .elements
            .push(Element::new("Task_3", ElementType::ServiceTask));
        candidate.flows.remove(0);

        let changes = diff(&base(), &candidate);

        assert_eq!(changes.added_elements.len(), 2);
        assert_eq!(changes.removed_elements[0].id, "Start");
        assert_eq!(changes.modified_elements[0].after.name.as_deref(), Some("Approve"));
        assert_eq!(changes.removed_flows[0].key(), "Flow_1");
        assert!(!changes.process_changed);
        assert_eq!(
            changes.summary(),
            vec![
                "Added 2 elements".to_owned(),
                "Removed 1 element".to_owned(),
                "Modified 1 element".to_owned(),
                "Removed 1 flow".to_owned(),
            ]
        );
        assert!(
            changes
                .details()
                .contains(&"~ renamed 'Review' to 'Approve' (Task_1)".to_owned())
        );
    }

    #[test]
    fn test_unnamed_flows_are_keyed_by_endpoints() {
        let mut candidate = base();
        candidate.flows[1].name = Some("done".into());

        let changes = diff(&base(), &candidate);

        assert_eq!(changes.modified_flows.len(), 1);
        assert_eq!(changes.modified_flows[0].after.key(), "Task_1->End");
        assert!(changes.added_flows.is_empty());
    }

    #[test]
    fn test_repeated_unnamed_flows_are_counted() {
        let original = base();
        let mut candidate = original.clone();
        candidate.flows.push(candidate.flows[1].clone());

        let changes = diff(&original, &candidate);
        assert_eq!(changes.added_flows.len(), 1);
        assert_eq!(changes.added_flows[0].key(), "Task_1->End");
        assert!(changes.removed_flows.is_empty());

        let changes = diff(&candidate, &original);
        assert_eq!(changes.removed_flows.len(), 1);
        assert!(changes.added_flows.is_empty());
    }

    #[test]
    fn test_detects_process_and_lane_changes() {
        let mut candidate = base();
        candidate.process.documentation = Some("Now documented".into());
        candidate.lanes.push(Lane {
            id: "Lane_1".into(),
            name: Some("Ops".into()),
            child_element_ids: vec!["Task_1".into()],
        });

        let changes = diff(&base(), &candidate);

        assert!(changes.process_changed);
        assert_eq!(changes.added_lanes.len(), 1);
        assert_eq!(
            changes.summary(),
            vec![
                "Updated process details".to_owned(),
                "Added 1 lane".to_owned()
            ]
        );
    }

    #[test]
    fn test_conversion_is_described() {
        let mut candidate = base();
        candidate.elements[1].kind = ElementType::UserTask;

        let changes = diff(&base(), &candidate);
        assert_eq!(
            changes.details(),
            vec!["~ converted 'Review' from task to user task (Task_1)".to_owned()]
        );
    }
}
