//! Deterministic document mutations.
//!
//! Element references accept an id or a case-insensitive element name. A
//! batch is applied to a copy, so the input document is untouched when any
//! operation fails.

use serde::{Deserialize, Serialize};

use super::document::{BpmnDocument, Element, ElementType, SequenceFlow};
use crate::{Error, Result, TRACING_TARGET_BPMN};

/// A single mutation of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "args", rename_all = "snake_case")]
#[serde(rename_all_fields = "camelCase")]
pub enum PatchOp {
    /// Adds a flow node, generating an id when none is given.
    AddNode {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(rename = "type")]
        kind: ElementType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lane_id: Option<String>,
    },
    /// Adds a sequence flow between two elements.
    Connect {
        source: String,
        target: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// Removes an element with its flows and lane membership, or a flow by id.
    Remove { target: String },
    /// Renames an element, or a flow by id.
    Rename { target: String, name: String },
    /// Changes the kind of an element.
    Convert {
        target: String,
        #[serde(rename = "type")]
        kind: ElementType,
    },
    /// Moves an element into a lane.
    MoveToLane { target: String, lane_id: String },
}

impl PatchOp {
    /// Applies this operation in place and describes the change.
    ///
    /// On error the document may be partially modified; use [`apply`] for
    /// all-or-nothing semantics.
    pub fn apply_to(&self, document: &mut BpmnDocument) -> Result<String> {
        match self {
            Self::AddNode {
                id,
                kind,
                name,
                lane_id,
            } => add_node(document, id.as_deref(), *kind, name.as_deref(), lane_id.as_deref()),
            Self::Connect {
                source,
                target,
                name,
            } => connect(document, source, target, name.as_deref()),
            Self::Remove { target } => remove(document, target),
            Self::Rename { target, name } => rename(document, target, name),
            Self::Convert { target, kind } => convert(document, target, *kind),
            Self::MoveToLane { target, lane_id } => move_to_lane(document, target, lane_id),
        }
    }
}

/// Applies a batch of operations to a copy of `document`.
///
/// Returns the patched document and one description per operation.
pub fn apply(document: &BpmnDocument, ops: &[PatchOp]) -> Result<(BpmnDocument, Vec<String>)> {
    let mut patched = document.clone();
    let mut changes = Vec::with_capacity(ops.len());
    for op in ops {
        changes.push(op.apply_to(&mut patched)?);
    }

    tracing::debug!(
        target: TRACING_TARGET_BPMN,
        process_id = %patched.process.id,
        operations = ops.len(),
        "Applied patch operations"
    );

    Ok((patched, changes))
}

fn resolve_id(document: &BpmnDocument, reference: &str) -> Result<String> {
    document
        .resolve_element(reference)
        .map(|e| e.id.clone())
        .ok_or_else(|| Error::not_found().with_message(format!("No element named '{reference}'")))
}

fn require_lane(document: &BpmnDocument, lane_id: &str) -> Result<()> {
    match document.lane(lane_id) {
        Some(_) => Ok(()),
        None => Err(Error::not_found().with_message(format!("No lane '{lane_id}'"))),
    }
}

fn add_node(
    document: &mut BpmnDocument,
    id: Option<&str>,
    kind: ElementType,
    name: Option<&str>,
    lane_id: Option<&str>,
) -> Result<String> {
    let id = match id {
        Some(id) if document.element(id).is_some() => {
            return Err(Error::invalid_input().with_message(format!("Element '{id}' already exists")));
        }
        Some(id) => id.to_owned(),
        None => document.next_id(kind.id_prefix()),
    };
    if let Some(lane_id) = lane_id {
        require_lane(document, lane_id)?;
    }

    let mut element = Element::new(id.clone(), kind);
    element.name = name.map(str::to_owned);
    element.lane_id = lane_id.map(str::to_owned);
    let label = element.label().to_owned();

    if let Some(lane) = lane_id.and_then(|l| document.lanes.iter_mut().find(|lane| lane.id == l)) {
        lane.child_element_ids.push(id);
    }
    document.elements.push(element);

    Ok(format!("Added {} '{label}'", kind.display_name()))
}

fn connect(
    document: &mut BpmnDocument,
    source: &str,
    target: &str,
    name: Option<&str>,
) -> Result<String> {
    let source = resolve_id(document, source)?;
    let target = resolve_id(document, target)?;
    if source == target {
        return Err(Error::invalid_input().with_message(format!("Cannot connect '{source}' to itself")));
    }
    if document
        .flows
        .iter()
        .any(|f| f.source == source && f.target == target)
    {
        return Err(Error::invalid_input()
            .with_message(format!("'{source}' is already connected to '{target}'")));
    }

    let mut flow = SequenceFlow::new(document.next_id("Flow"), source.clone(), target.clone());
    flow.name = name.map(str::to_owned);
    document.flows.push(flow);

    Ok(format!(
        "Connected '{}' to '{}'",
        label_of(document, &source),
        label_of(document, &target)
    ))
}

fn remove(document: &mut BpmnDocument, target: &str) -> Result<String> {
    if let Ok(id) = resolve_id(document, target) {
        let label = label_of(document, &id);
        document.elements.retain(|e| e.id != id);
        let before = document.flows.len();
        document.flows.retain(|f| f.source != id && f.target != id);
        let dropped = before - document.flows.len();
        for lane in &mut document.lanes {
            lane.child_element_ids.retain(|c| *c != id);
        }

        return Ok(match dropped {
            0 => format!("Removed '{label}'"),
            1 => format!("Removed '{label}' and 1 connected flow"),
            n => format!("Removed '{label}' and {n} connected flows"),
        });
    }

    let before = document.flows.len();
    document.flows.retain(|f| f.id.as_deref() != Some(target));
    if document.flows.len() == before {
        return Err(Error::not_found().with_message(format!("No element or flow named '{target}'")));
    }
    Ok(format!("Removed flow '{target}'"))
}

fn rename(document: &mut BpmnDocument, target: &str, name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::invalid_input().with_message("New name must not be empty"));
    }

    if let Ok(id) = resolve_id(document, target) {
        let old = label_of(document, &id);
        if let Some(element) = document.element_mut(&id) {
            element.name = Some(name.to_owned());
        }
        return Ok(format!("Renamed '{old}' to '{name}'"));
    }

    match document
        .flows
        .iter_mut()
        .find(|f| f.id.as_deref() == Some(target))
    {
        Some(flow) => {
            flow.name = Some(name.to_owned());
            Ok(format!("Renamed flow '{target}' to '{name}'"))
        }
        None => Err(Error::not_found().with_message(format!("No element or flow named '{target}'"))),
    }
}

fn convert(document: &mut BpmnDocument, target: &str, kind: ElementType) -> Result<String> {
    let id = resolve_id(document, target)?;
    let label = label_of(document, &id);
    if let Some(element) = document.element_mut(&id) {
        element.kind = kind;
    }
    Ok(format!("Converted '{label}' to {}", kind.display_name()))
}

fn move_to_lane(document: &mut BpmnDocument, target: &str, lane_id: &str) -> Result<String> {
    let id = resolve_id(document, target)?;
    require_lane(document, lane_id)?;

    for lane in &mut document.lanes {
        lane.child_element_ids.retain(|c| *c != id);
        if lane.id == lane_id {
            lane.child_element_ids.push(id.clone());
        }
    }
    if let Some(element) = document.element_mut(&id) {
        element.lane_id = Some(lane_id.to_owned());
    }

    let lane_label = document
        .lane(lane_id)
        .and_then(|l| l.name.clone())
        .unwrap_or_else(|| lane_id.to_owned());
    Ok(format!("Moved '{}' to lane '{lane_label}'", label_of(document, &id)))
}

fn label_of(document: &BpmnDocument, id: &str) -> String {
    document
        .element(id)
        .map(|e| e.label().to_owned())
        .unwrap_or_else(|| id.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::bpmn::Lane;

    fn document() -> BpmnDocument {
        let mut document = BpmnDocument::new("Process_1", Some("Sample".into()));
        document.lanes.push(Lane {
            id: "Lane_1".into(),
            name: Some("Sales".into()),
            child_element_ids: vec!["Task_1".into()],
        });
        document.lanes.push(Lane {
            id: "Lane_2".into(),
            name: Some("Finance".into()),
            child_element_ids: vec![],
        });
        document.elements = vec![
            Element::new("StartEvent_1", ElementType::StartEvent),
            Element::new("Task_1", ElementType::Task)
                .with_name("Review")
                .with_lane("Lane_1"),
            Element::new("EndEvent_1", ElementType::EndEvent),
        ];
        document.flows = vec![
            SequenceFlow::new("Flow_1", "StartEvent_1", "Task_1"),
            SequenceFlow::new("Flow_2", "Task_1", "EndEvent_1"),
        ];
        document
    }

    #[test]
    fn test_add_node_generates_ids() {
        let op = PatchOp::AddNode {
            id: None,
            kind: ElementType::UserTask,
            name: Some("Approve".into()),
            lane_id: Some("Lane_2".into()),
        };

        let (patched, changes) = apply(&document(), &[op]).unwrap();

        let added = patched.element("Task_2").unwrap();
        assert_eq!(added.lane_id.as_deref(), Some("Lane_2"));
        assert_eq!(patched.lanes[1].child_element_ids, vec!["Task_2".to_owned()]);
        assert_eq!(changes, vec!["Added user task 'Approve'".to_owned()]);
        patched.validate().unwrap();
    }

    #[test]
    fn test_connect_resolves_names() {
        let ops = [
            PatchOp::AddNode {
                id: Some("Task_9".into()),
                kind: ElementType::ServiceTask,
                name: Some("Notify".into()),
                lane_id: None,
            },
            PatchOp::Connect {
                source: "review".into(),
                target: "notify".into(),
                name: None,
            },
        ];

        let (patched, changes) = apply(&document(), &ops).unwrap();

        let flow = patched.flows.last().unwrap();
        assert_eq!(flow.id.as_deref(), Some("Flow_3"));
        assert_eq!((flow.source.as_str(), flow.target.as_str()), ("Task_1", "Task_9"));
        assert_eq!(changes[1], "Connected 'Review' to 'Notify'");
    }

    #[test]
    fn test_remove_drops_flows_and_membership() {
        let op = PatchOp::Remove {
            target: "Review".into(),
        };

        let (patched, changes) = apply(&document(), &[op]).unwrap();

        assert!(patched.element("Task_1").is_none());
        assert!(patched.flows.is_empty());
        assert!(patched.lanes[0].child_element_ids.is_empty());
        assert_eq!(changes[0], "Removed 'Review' and 2 connected flows");
        patched.validate().unwrap();
    }

    #[test]
    fn test_rename_and_convert() {
        let ops = [
            PatchOp::Rename {
                target: "Task_1".into(),
                name: "Approve".into(),
            },
            PatchOp::Convert {
                target: "approve".into(),
                kind: ElementType::UserTask,
            },
            PatchOp::Rename {
                target: "Flow_2".into(),
                name: "done".into(),
            },
        ];

        let (patched, _) = apply(&document(), &ops).unwrap();

        let task = patched.element("Task_1").unwrap();
        assert_eq!(task.name.as_deref(), Some("Approve"));
        assert_eq!(task.kind, ElementType::UserTask);
        assert_eq!(patched.flow("Flow_2").unwrap().name.as_deref(), Some("done"));
    }

    #[test]
    fn test_move_to_lane() {
        let op = PatchOp::MoveToLane {
            target: "Review".into(),
            lane_id: "Lane_2".into(),
        };

        let (patched, changes) = apply(&document(), &[op]).unwrap();

        assert!(patched.lanes[0].child_element_ids.is_empty());
        assert_eq!(patched.lanes[1].child_element_ids, vec!["Task_1".to_owned()]);
        assert_eq!(patched.element("Task_1").unwrap().lane_id.as_deref(), Some("Lane_2"));
        assert_eq!(changes[0], "Moved 'Review' to lane 'Finance'");
    }

    #[test]
    fn test_failed_batch_leaves_document_untouched() {
        let original = document();
        let ops = [
            PatchOp::Rename {
                target: "Task_1".into(),
                name: "Approve".into(),
            },
            PatchOp::Connect {
                source: "Approve".into(),
                target: "Ghost".into(),
                name: None,
            },
        ];

        let error = apply(&original, &ops).unwrap_err();

        assert_eq!(error.kind, ErrorKind::NotFound);
        assert_eq!(original, document());
    }

    #[test]
    fn test_rejects_invalid_operations() {
        let duplicate = PatchOp::Connect {
            source: "StartEvent_1".into(),
            target: "Task_1".into(),
            name: None,
        };
        assert_eq!(
            apply(&document(), &[duplicate]).unwrap_err().kind,
            ErrorKind::InvalidInput
        );

        let missing_lane = PatchOp::MoveToLane {
            target: "Task_1".into(),
            lane_id: "Lane_9".into(),
        };
        assert_eq!(
            apply(&document(), &[missing_lane]).unwrap_err().kind,
            ErrorKind::NotFound
        );

        let blank = PatchOp::Rename {
            target: "Task_1".into(),
            name: "  ".into(),
        };
        assert_eq!(
            apply(&document(), &[blank]).unwrap_err().kind,
            ErrorKind::InvalidInput
        );
    }

    #[test]
    fn test_wire_format() {
        let op: PatchOp = serde_json::from_value(serde_json::json!({
            "op": "move_to_lane",
            "args": { "target": "Task_1", "laneId": "Lane_2" }
        }))
        .unwrap();

        assert_eq!(
            op,
            PatchOp::MoveToLane {
                target: "Task_1".into(),
                lane_id: "Lane_2".into()
            }
        );
    }
}
