//! Commands that work on local files only.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use processlab_core::bpmn::{self, LintIssue, Severity};

use super::document::{DocumentFormat, read_document, render_document};

/// Converts a document between JSON and BPMN XML.
#[derive(Debug, Clone, Args)]
pub struct ConvertArgs {
    /// Input file (.json, .bpmn or .xml)
    pub input: PathBuf,

    /// Output file; the format follows its extension. Prints to stdout when omitted
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl ConvertArgs {
    pub async fn run(self) -> anyhow::Result<String> {
        let source = DocumentFormat::from_path(&self.input)?;
        let document = read_document(&self.input).await?;

        let target = match &self.output {
            Some(path) => DocumentFormat::from_path(path)?,
            None => source.other(),
        };
        let rendered = render_document(&document, target).context("failed to encode document")?;

        match self.output {
            Some(path) => {
                tokio::fs::write(&path, rendered)
                    .await
                    .with_context(|| format!("failed to write '{}'", path.display()))?;
                Ok(format!("Wrote {}", path.display()))
            }
            None => Ok(rendered),
        }
    }
}

/// Reports structural problems in a document.
#[derive(Debug, Clone, Args)]
pub struct LintArgs {
    /// Document to check (.json, .bpmn or .xml)
    pub file: PathBuf,
}

impl LintArgs {
    pub async fn run(self) -> anyhow::Result<String> {
        let document = read_document(&self.file).await?;
        let issues = bpmn::lint(&document);

        let report = render_issues(&issues);
        let errors = issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count();
        if errors > 0 {
            anyhow::bail!("{report}\n{errors} error(s) found in '{}'", self.file.display());
        }

        Ok(report)
    }
}

pub fn render_issues(issues: &[LintIssue]) -> String {
    if issues.is_empty() {
        return "No issues found".to_owned();
    }

    issues
        .iter()
        .map(|issue| {
            format!(
                "{:<7} {:<12} {}",
                issue.severity.as_ref(),
                issue.element_id.as_deref().unwrap_or("-"),
                issue.message
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use processlab_core::bpmn::{BpmnDocument, Element, ElementType};

    use super::*;

    #[test]
    fn test_render_issues() {
        assert_eq!(render_issues(&[]), "No issues found");

        let mut document = BpmnDocument::new("Process_1", None);
        document
            .elements
            .push(Element::new("Task_1", ElementType::Task).with_name("Review"));

        let report = render_issues(&bpmn::lint(&document));
        let lines: Vec<&str> = report.lines().collect();

        assert!(lines[0].starts_with("error"));
        assert!(lines.iter().any(|l| l.contains("Task_1")));
    }
}
