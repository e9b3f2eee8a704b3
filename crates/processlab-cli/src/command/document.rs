//! Reading and writing documents on disk.

use std::path::Path;

use anyhow::Context;
use processlab_core::Result;
use processlab_core::bpmn::{self, BpmnDocument};

/// On-disk representation of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// Canonical JSON (`.json`).
    Json,
    /// BPMN 2.0 XML (`.bpmn`, `.xml`).
    Xml,
}

impl DocumentFormat {
    /// Infers the format from a file extension.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("json") => Ok(Self::Json),
            Some("bpmn" | "xml") => Ok(Self::Xml),
            _ => anyhow::bail!(
                "cannot infer the format of '{}' (expected .json, .bpmn or .xml)",
                path.display()
            ),
        }
    }

    /// The format a conversion produces by default.
    pub fn other(self) -> Self {
        match self {
            Self::Json => Self::Xml,
            Self::Xml => Self::Json,
        }
    }
}

pub fn parse_document(text: &str, format: DocumentFormat) -> Result<BpmnDocument> {
    match format {
        DocumentFormat::Json => BpmnDocument::from_json(text),
        DocumentFormat::Xml => bpmn::from_xml(text),
    }
}

pub fn render_document(document: &BpmnDocument, format: DocumentFormat) -> Result<String> {
    match format {
        DocumentFormat::Json => document.to_json_pretty(),
        DocumentFormat::Xml => bpmn::to_xml(document),
    }
}

/// Reads and decodes a document, inferring its format from the extension.
pub async fn read_document(path: &Path) -> anyhow::Result<BpmnDocument> {
    let format = DocumentFormat::from_path(path)?;
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read '{}'", path.display()))?;

    parse_document(&text, format).with_context(|| format!("failed to decode '{}'", path.display()))
}
