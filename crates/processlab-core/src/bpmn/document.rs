//! Canonical JSON form of a BPMN process.

use std::collections::{HashMap, HashSet};
use std::fmt::Write;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

use crate::{Error, Result, TRACING_TARGET_BPMN};

/// Flow type used when a flow does not name one.
pub const DEFAULT_FLOW_TYPE: &str = "sequenceFlow";

/// Kind of a BPMN flow node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize)]
#[derive(AsRefStr, Display, EnumString, IntoStaticStr)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum ElementType {
    Task,
    UserTask,
    ServiceTask,
    StartEvent,
    EndEvent,
    ExclusiveGateway,
    ParallelGateway,
}

impl ElementType {
    /// Returns `true` for the activity kinds.
    pub const fn is_task(&self) -> bool {
        matches!(self, Self::Task | Self::UserTask | Self::ServiceTask)
    }

    /// Returns `true` for start and end events.
    pub const fn is_event(&self) -> bool {
        matches!(self, Self::StartEvent | Self::EndEvent)
    }

    /// Returns `true` for the gateway kinds.
    pub const fn is_gateway(&self) -> bool {
        matches!(self, Self::ExclusiveGateway | Self::ParallelGateway)
    }

    /// Human-readable name used in change summaries and default labels.
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::UserTask => "user task",
            Self::ServiceTask => "service task",
            Self::StartEvent => "start event",
            Self::EndEvent => "end event",
            Self::ExclusiveGateway => "exclusive gateway",
            Self::ParallelGateway => "parallel gateway",
        }
    }

    /// Prefix used when generating ids for new elements of this kind.
    pub const fn id_prefix(&self) -> &'static str {
        match self {
            Self::Task | Self::UserTask | Self::ServiceTask => "Task",
            Self::StartEvent => "StartEvent",
            Self::EndEvent => "EndEvent",
            Self::ExclusiveGateway | Self::ParallelGateway => "Gateway",
        }
    }
}

/// Process-level metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProcessInfo {
    /// Process identifier.
    pub id: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Free-text documentation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
}

/// A swimlane grouping flow nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lane {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Ids of the elements placed in this lane.
    #[serde(default)]
    pub child_element_ids: Vec<String>,
}

/// Provenance of an element extracted from a source artifact.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_artifact_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
}

/// A flow node: task, event or gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ElementType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lane_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ElementMeta>,
}

impl Element {
    /// Creates an unnamed element outside any lane.
    pub fn new(id: impl Into<String>, kind: ElementType) -> Self {
        Self {
            id: id.into(),
            kind,
            name: None,
            lane_id: None,
            meta: None,
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the lane.
    pub fn with_lane(mut self, lane_id: impl Into<String>) -> Self {
        self.lane_id = Some(lane_id.into());
        self
    }

    /// Returns the name, or the id when the element is unnamed.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// A directed connection between two elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceFlow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub source: String,
    pub target: String,
    #[serde(rename = "type", default = "default_flow_type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

fn default_flow_type() -> String {
    DEFAULT_FLOW_TYPE.to_owned()
}

impl SequenceFlow {
    /// Creates a plain sequence flow.
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            source: source.into(),
            target: target.into(),
            kind: default_flow_type(),
            name: None,
        }
    }

    /// Sets the condition label.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Key identifying this flow: its id, or `source->target` when unnamed.
    pub fn key(&self) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => format!("{}->{}", self.source, self.target),
        }
    }
}

/// The canonical BPMN document. XML is derived from it, never the reverse.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BpmnDocument {
    pub process: ProcessInfo,
    #[serde(default)]
    pub lanes: Vec<Lane>,
    #[serde(default)]
    pub elements: Vec<Element>,
    #[serde(default)]
    pub flows: Vec<SequenceFlow>,
}

impl BpmnDocument {
    /// Creates an empty document for a process.
    pub fn new(process_id: impl Into<String>, name: Option<String>) -> Self {
        Self {
            process: ProcessInfo {
                id: process_id.into(),
                name,
                documentation: None,
            },
            ..Default::default()
        }
    }

    /// Creates the empty working copy of a freshly created process.
    pub fn empty(name: impl Into<String>) -> Self {
        Self::new("Process_1", Some(name.into()))
    }

    /// Decodes a document from a JSON value.
    pub fn from_value(value: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    /// Decodes a document from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Encodes the document as a JSON value.
    pub fn to_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Encodes the document as indented JSON text.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Returns `true` if the document has no elements, flows or lanes.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() && self.flows.is_empty() && self.lanes.is_empty()
    }

    /// Concurrency token: lowercase hex SHA-256 of the compact, key-sorted JSON encoding.
    pub fn etag(&self) -> Result<String> {
        let value = self.to_value()?;
        let mut canonical = String::new();
        write_canonical(&value, &mut canonical)?;

        let digest = Sha256::digest(canonical.as_bytes());
        Ok(hex::encode(digest))
    }

    /// Looks up an element by id.
    pub fn element(&self, id: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.id == id)
    }

    /// Looks up an element by id for mutation.
    pub fn element_mut(&mut self, id: &str) -> Option<&mut Element> {
        self.elements.iter_mut().find(|e| e.id == id)
    }

    /// Looks up a lane by id.
    pub fn lane(&self, id: &str) -> Option<&Lane> {
        self.lanes.iter().find(|l| l.id == id)
    }

    /// Looks up a flow by id.
    pub fn flow(&self, id: &str) -> Option<&SequenceFlow> {
        self.flows.iter().find(|f| f.id.as_deref() == Some(id))
    }

    /// Resolves an element reference: exact id first, then a case-insensitive name match.
    pub fn resolve_element(&self, reference: &str) -> Option<&Element> {
        let reference = reference.trim();
        self.element(reference).or_else(|| {
            let lowered = reference.to_lowercase();
            self.elements.iter().find(|e| {
                e.id.to_lowercase() == lowered
                    || e.name.as_deref().is_some_and(|n| n.to_lowercase() == lowered)
            })
        })
    }

    /// Lane an element belongs to, from its `laneId` or lane membership.
    pub fn lane_of(&self, element_id: &str) -> Option<&Lane> {
        if let Some(lane_id) = self.element(element_id).and_then(|e| e.lane_id.as_deref()) {
            return self.lane(lane_id);
        }
        self.lanes
            .iter()
            .find(|l| l.child_element_ids.iter().any(|c| c == element_id))
    }

    /// Flows leaving an element.
    pub fn outgoing<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a SequenceFlow> + 'a {
        self.flows.iter().filter(move |f| f.source == id)
    }

    /// Flows entering an element.
    pub fn incoming<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a SequenceFlow> + 'a {
        self.flows.iter().filter(move |f| f.target == id)
    }

    /// Returns a fresh id `{prefix}_{n}` not used by any element, lane or flow.
    pub fn next_id(&self, prefix: &str) -> String {
        let taken = self.all_ids();
        (1..)
            .map(|n| format!("{prefix}_{n}"))
            .find(|candidate| !taken.contains(candidate.as_str()))
            .unwrap_or_else(|| format!("{prefix}_0"))
    }

    fn all_ids(&self) -> HashSet<&str> {
        let mut ids: HashSet<&str> = HashSet::new();
        ids.insert(self.process.id.as_str());
        ids.extend(self.elements.iter().map(|e| e.id.as_str()));
        ids.extend(self.lanes.iter().map(|l| l.id.as_str()));
        ids.extend(self.flows.iter().filter_map(|f| f.id.as_deref()));
        ids
    }

    /// Checks the structural invariants of the document.
    ///
    /// Element ids must be unique, every id referenced by a flow or a lane must
    /// exist, an element's `laneId` must name an existing lane, a flow's source
    /// and target must differ, and flow ids (when present) must be unique.
    pub fn validate(&self) -> Result<()> {
        let mut element_ids = HashSet::new();
        for element in &self.elements {
            if element.id.trim().is_empty() {
                return Err(Error::invalid_input().with_message("Element with an empty id"));
            }
            if !element_ids.insert(element.id.as_str()) {
                return Err(Error::invalid_input()
                    .with_message(format!("Duplicate element id '{}'", element.id)));
            }
        }

        let mut lane_ids = HashSet::new();
        for lane in &self.lanes {
            if !lane_ids.insert(lane.id.as_str()) {
                return Err(
                    Error::invalid_input().with_message(format!("Duplicate lane id '{}'", lane.id))
                );
            }
            if let Some(missing) = lane
                .child_element_ids
                .iter()
                .find(|c| !element_ids.contains(c.as_str()))
            {
                return Err(Error::invalid_input().with_message(format!(
                    "Lane '{}' references unknown element '{missing}'",
                    lane.id
                )));
            }
        }

        for element in &self.elements {
            if let Some(lane_id) = &element.lane_id
                && !lane_ids.contains(lane_id.as_str())
            {
                return Err(Error::invalid_input().with_message(format!(
                    "Element '{}' references unknown lane '{lane_id}'",
                    element.id
                )));
            }
        }

        let mut flow_ids = HashSet::new();
        for flow in &self.flows {
            let key = flow.key();
            for endpoint in [&flow.source, &flow.target] {
                if !element_ids.contains(endpoint.as_str()) {
                    return Err(Error::invalid_input().with_message(format!(
                        "Flow '{key}' references unknown element '{endpoint}'"
                    )));
                }
            }
            if flow.source == flow.target {
                return Err(Error::invalid_input()
                    .with_message(format!("Flow '{key}' connects '{}' to itself", flow.source)));
            }
            if let Some(id) = &flow.id
                && !flow_ids.insert(id.as_str())
            {
                return Err(Error::invalid_input().with_message(format!("Duplicate flow id '{id}'")));
            }
        }

        tracing::trace!(
            target: TRACING_TARGET_BPMN,
            process_id = %self.process.id,
            elements = self.elements.len(),
            flows = self.flows.len(),
            "Document validated"
        );

        Ok(())
    }

    /// Counts elements per kind.
    pub fn kind_counts(&self) -> HashMap<ElementType, usize> {
        let mut counts = HashMap::new();
        for element in &self.elements {
            *counts.entry(element.kind).or_insert(0) += 1;
        }
        counts
    }
}

/// Writes compact JSON with object keys sorted at every level.
fn write_canonical(value: &serde_json::Value, out: &mut String) -> Result<()> {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
                write_canonical(&map[key], out)?;
            }
            out.push('}');
        }
        serde_json::Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out)?;
            }
            out.push(']');
        }
        scalar => write!(out, "{scalar}")?,
    }
    Ok(())
}
