//! Canonical BPMN document and its derived forms.
//!
//! The JSON [`BpmnDocument`] is the source of truth; XML is regenerated from it
//! with [`to_xml`] and decoded back with [`from_xml`].

mod document;
mod xml;

pub mod diff;
pub mod lint;
pub mod patch;

pub use diff::{DocumentDiff, Modified, diff};
pub use document::{
    BpmnDocument, DEFAULT_FLOW_TYPE, Element, ElementMeta, ElementType, Lane, ProcessInfo,
    SequenceFlow,
};
pub use lint::{LintIssue, Severity, lint};
pub use patch::{PatchOp, apply};
pub use xml::{PROCESSLAB_NS, from_xml, to_xml};
