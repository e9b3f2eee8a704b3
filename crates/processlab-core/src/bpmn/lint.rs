//! Structural checks that go beyond document validity.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

use super::document::{BpmnDocument, ElementType};

/// How serious a lint finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(Serialize, Deserialize, AsRefStr, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single lint finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintIssue {
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
    pub message: String,
}

impl LintIssue {
    fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            element_id: None,
            message: message.into(),
        }
    }

    fn warning(element_id: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            element_id: Some(element_id.to_owned()),
            message: message.into(),
        }
    }
}

/// Runs every structural check; errors come before warnings.
pub fn lint(document: &BpmnDocument) -> Vec<LintIssue> {
    let mut issues = Vec::new();

    let has = |kind: ElementType| document.elements.iter().any(|e| e.kind == kind);
    if !has(ElementType::StartEvent) {
        issues.push(LintIssue::error("Process has no start event"));
    }
    if !has(ElementType::EndEvent) {
        issues.push(LintIssue::error("Process has no end event"));
    }

    for element in &document.elements {
        let incoming = document.incoming(&element.id).count();
        let outgoing = document.outgoing(&element.id).count();
        let label = element.label();

        match element.kind {
            ElementType::StartEvent if outgoing == 0 => issues.push(LintIssue::warning(
                &element.id,
                format!("Start event '{label}' has no outgoing flow"),
            )),
            ElementType::EndEvent if incoming == 0 => issues.push(LintIssue::warning(
                &element.id,
                format!("End event '{label}' has no incoming flow"),
            )),
            ElementType::StartEvent | ElementType::EndEvent => {}
            kind => {
                if incoming == 0 {
                    issues.push(LintIssue::warning(
                        &element.id,
                        format!("{} '{label}' has no incoming flow", capitalize(kind.display_name())),
                    ));
                }
                if outgoing == 0 {
                    issues.push(LintIssue::warning(
                        &element.id,
                        format!("{} '{label}' has no outgoing flow", capitalize(kind.display_name())),
                    ));
                }
                if kind == ElementType::ExclusiveGateway && outgoing == 1 {
                    issues.push(LintIssue::warning(
                        &element.id,
                        format!("Exclusive gateway '{label}' should have at least two outgoing flows"),
                    ));
                }
            }
        }
    }

    issues.sort_by_key(|issue| issue.severity);
    issues
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bpmn::{Element, SequenceFlow};

    fn linear() -> BpmnDocument {
        let mut document = BpmnDocument::new("Process_1", None);
        document.elements = vec![
            Element::new("Start", ElementType::StartEvent),
            Element::new("Task_1", ElementType::Task).with_name("Review"),
            Element::new("End", ElementType::EndEvent),
        ];
        document.flows = vec![
            SequenceFlow::new("Flow_1", "Start", "Task_1"),
            SequenceFlow::new("Flow_2", "Task_1", "End"),
        ];
        document
    }

    #[test]
    fn test_connected_process_is_clean() {
        assert!(lint(&linear()).is_empty());
    }

    #[test]
    fn test_missing_events_are_errors() {
        let issues = lint(&BpmnDocument::empty("Blank"));

        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.severity == Severity::Error));
    }

    #[test]
    fn test_disconnected_nodes_are_warnings() {
        let mut document = linear();
        document
            .elements
            .push(Element::new("Gateway_1", ElementType::ExclusiveGateway));
        document
            .flows
            .push(SequenceFlow::new("Flow_3", "Task_1", "Gateway_1"));
        document
            .flows
            .push(SequenceFlow::new("Flow_4", "Gateway_1", "End"));

        let issues = lint(&document);

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Warning);
        assert_eq!(issues[0].element_id.as_deref(), Some("Gateway_1"));
        assert!(issues[0].message.contains("at least two outgoing"));
    }

    #[test]
    fn test_errors_sort_before_warnings() {
        let mut document = linear();
        document.elements.retain(|e| e.id != "End");
        document.flows.retain(|f| f.target != "End");

        let issues = lint(&document);

        assert_eq!(issues[0].severity, Severity::Error);
        assert_eq!(issues[1].message, "Task 'Review' has no outgoing flow");
    }
}
