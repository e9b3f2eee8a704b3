//! Commands that read or extend a process's version history.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use processlab_core::ChangeType;
use processlab_core::bpmn::DocumentDiff;
use processlab_session::{LoadMode, TimelineEntry, VersionTimeline};

use super::Editor;
use super::document::{DocumentFormat, read_document, render_document};

/// Lists the versions of a process, newest first.
#[derive(Debug, Clone, Args)]
pub struct VersionsArgs {
    /// Process identifier
    pub process_id: String,
}

impl VersionsArgs {
    pub async fn run(self, editor: &Editor) -> anyhow::Result<String> {
        let store = editor.session.store();
        store
            .load_versions(&self.process_id, LoadMode::Foreground)
            .await
            .with_context(|| format!("failed to list versions of '{}'", self.process_id))?;

        let versions = store.versions().await;
        let selected = store.selected_version_id().await;
        let entries = VersionTimeline::new().entries(&versions, selected.as_deref());

        Ok(render_timeline(&entries))
    }
}

pub fn render_timeline(entries: &[TimelineEntry]) -> String {
    if entries.is_empty() {
        return "No versions yet".to_owned();
    }

    entries
        .iter()
        .map(|entry| {
            let marker = if entry.is_active { '*' } else { ' ' };
            let mut line = format!(
                "{marker} {:<5} {:<6} {}",
                entry.label,
                entry.change_type.as_ref(),
                entry.created_at.strftime("%Y-%m-%d %H:%M"),
            );
            if let Some(author) = &entry.created_by {
                line.push_str(&format!("  {author}"));
            }
            if let Some(message) = &entry.commit_message {
                line.push_str(&format!("  {message}"));
            }
            line.push_str(&format!("  ({})", entry.version_id));
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prints the document of a version.
#[derive(Debug, Clone, Args)]
pub struct ShowArgs {
    /// Process identifier
    pub process_id: String,

    /// Version to show; defaults to the active version
    #[arg(long)]
    pub version_id: Option<String>,

    /// Print BPMN XML instead of JSON
    #[arg(long)]
    pub xml: bool,
}

impl ShowArgs {
    pub async fn run(self, editor: &Editor) -> anyhow::Result<String> {
        let session = &editor.session;
        session
            .load(&self.process_id)
            .await
            .with_context(|| format!("failed to load process '{}'", self.process_id))?;

        if let Some(version_id) = &self.version_id {
            session
                .select_version(version_id)
                .await
                .with_context(|| format!("failed to load version '{version_id}'"))?;
        }

        if self.xml {
            return Ok(session.xml().await);
        }
        let document = session.document().await;
        Ok(render_document(&document, DocumentFormat::Json)?)
    }
}

/// Creates a new, empty process.
#[derive(Debug, Clone, Args)]
pub struct CreateArgs {
    /// Process name
    pub name: String,

    /// Optional description
    #[arg(short, long)]
    pub description: Option<String>,
}

impl CreateArgs {
    pub async fn run(self, editor: &Editor) -> anyhow::Result<String> {
        let process = editor
            .session
            .create(&self.name, self.description)
            .await
            .context("failed to create process")?;

        Ok(format!("Created process '{}' ({})", process.name, process.id))
    }
}

/// Saves a local document as a new version.
#[derive(Debug, Clone, Args)]
pub struct SaveArgs {
    /// Process identifier
    pub process_id: String,

    /// Document to save (.json, .bpmn or .xml)
    pub file: PathBuf,

    /// Commit message
    #[arg(short, long)]
    pub message: Option<String>,

    /// Kind of change: major, minor or patch
    #[arg(long, default_value = "minor")]
    pub change_type: ChangeType,
}

impl SaveArgs {
    pub async fn run(self, editor: &Editor) -> anyhow::Result<String> {
        let document = read_document(&self.file).await?;
        let session = &editor.session;
        session
            .load(&self.process_id)
            .await
            .with_context(|| format!("failed to load process '{}'", self.process_id))?;

        if !session.apply_document(document).await? {
            return Ok("No changes to save".to_owned());
        }

        let version = session
            .save(self.message, self.change_type)
            .await
            .context("failed to save version")?;
        Ok(format!("Saved {} ({})", version.label(), version.id))
    }
}

/// Makes an earlier version current again.
#[derive(Debug, Clone, Args)]
pub struct RestoreArgs {
    /// Process identifier
    pub process_id: String,

    /// Version to restore
    pub version_id: String,

    /// Commit message for the restoring version
    #[arg(short, long)]
    pub message: Option<String>,
}

impl RestoreArgs {
    pub async fn run(self, editor: &Editor) -> anyhow::Result<String> {
        let session = &editor.session;
        session
            .load(&self.process_id)
            .await
            .with_context(|| format!("failed to load process '{}'", self.process_id))?;

        let version = session
            .restore_version(&self.version_id, self.message)
            .await
            .with_context(|| format!("failed to restore version '{}'", self.version_id))?;
        Ok(format!("Restored as {} ({})", version.label(), version.id))
    }
}

/// Compares two versions of a process.
#[derive(Debug, Clone, Args)]
pub struct DiffArgs {
    /// Process identifier
    pub process_id: String,

    /// Base version
    pub base: String,

    /// Version compared against the base
    pub candidate: String,
}

impl DiffArgs {
    pub async fn run(self, editor: &Editor) -> anyhow::Result<String> {
        editor
            .session
            .store()
            .load_versions(&self.process_id, LoadMode::Foreground)
            .await
            .with_context(|| format!("failed to list versions of '{}'", self.process_id))?;

        let diff = editor
            .session
            .compare(&self.base, &self.candidate)
            .await
            .context("failed to compare versions")?;
        Ok(render_diff(&diff))
    }
}

pub fn render_diff(diff: &DocumentDiff) -> String {
    if diff.is_empty() {
        return "No differences".to_owned();
    }

    let mut lines = diff.summary();
    lines.push(String::new());
    lines.extend(diff.details());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use processlab_api::mock::MockBackend;
    use processlab_core::ErrorKind;
    use processlab_core::bpmn::{BpmnDocument, Element, ElementType, SequenceFlow};
    use processlab_session::SessionContext;

    use super::*;

    const PROCESS_ID: &str = "proc-orders";

    fn orders(task_name: &str) -> BpmnDocument {
        let mut document = BpmnDocument::new("Process_1", Some("Orders".into()));
        document.elements = vec![
            Element::new("Start_1", ElementType::StartEvent).with_name("Order placed"),
            Element::new("Task_1", ElementType::Task).with_name(task_name),
            Element::new("End_1", ElementType::EndEvent).with_name("Shipped"),
        ];
        document.flows = vec![
            SequenceFlow::new("Flow_1", "Start_1", "Task_1"),
            SequenceFlow::new("Flow_2", "Task_1", "End_1"),
        ];
        document
    }

    fn seeded() -> MockBackend {
        let backend = MockBackend::new();
        backend.seed_process(PROCESS_ID, "Orders");
        backend
            .seed_version(PROCESS_ID, &orders("Pack"), Some("First draft"))
            .unwrap();
        backend
            .seed_version(PROCESS_ID, &orders("Pack and label"), None)
            .unwrap();
        backend
    }

    fn editor(backend: &MockBackend) -> Editor {
        Editor::new(SessionContext::new(), backend.clone().into_services())
    }

    #[tokio::test]
    async fn test_versions_lists_newest_first() {
        let backend = seeded();
        let args = VersionsArgs {
            process_id: PROCESS_ID.into(),
        };

        let output = args.run(&editor(&backend)).await.unwrap();
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("* v2"));
        assert!(lines[1].starts_with("  v1"));
        assert!(lines[1].contains("First draft"));
    }

    #[tokio::test]
    async fn test_versions_of_empty_process() {
        let backend = MockBackend::new();
        backend.seed_process("proc-empty", "Empty");
        let args = VersionsArgs {
            process_id: "proc-empty".into(),
        };

        let output = args.run(&editor(&backend)).await.unwrap();
        assert_eq!(output, "No versions yet");
    }

    #[tokio::test]
    async fn test_show_selected_version_as_xml() {
        let backend = seeded();
        let args = ShowArgs {
            process_id: PROCESS_ID.into(),
            version_id: Some(format!("{PROCESS_ID}-v1")),
            xml: true,
        };

        let output = args.run(&editor(&backend)).await.unwrap();
        assert!(output.contains("name=\"Pack\""));
        assert!(!output.contains("Pack and label"));
    }

    #[tokio::test]
    async fn test_save_local_document() {
        let backend = seeded();
        let path = std::env::temp_dir().join(format!("processlab-save-{}.bpmn", std::process::id()));
        let xml = processlab_core::bpmn::to_xml(&orders("Pack, label and weigh")).unwrap();
        tokio::fs::write(&path, xml).await.unwrap();

        let args = SaveArgs {
            process_id: PROCESS_ID.into(),
            file: path.clone(),
            message: Some("Weigh parcels".into()),
            change_type: ChangeType::Patch,
        };
        let output = args.clone().run(&editor(&backend)).await.unwrap();
        assert_eq!(output, format!("Saved v3 ({PROCESS_ID}-v3)"));

        let saved = backend.versions(PROCESS_ID).pop().unwrap();
        assert_eq!(saved.commit_message.as_deref(), Some("Weigh parcels"));
        assert_eq!(saved.change_type, ChangeType::Patch);

        let output = args.run(&editor(&backend)).await.unwrap();
        assert_eq!(output, "No changes to save");

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_restore_creates_new_active_version() {
        let backend = seeded();
        let args = RestoreArgs {
            process_id: PROCESS_ID.into(),
            version_id: format!("{PROCESS_ID}-v1"),
            message: None,
        };

        let output = args.run(&editor(&backend)).await.unwrap();
        assert_eq!(output, format!("Restored as v3 ({PROCESS_ID}-v3)"));

        let versions = backend.versions(PROCESS_ID);
        let active = versions.iter().find(|v| v.is_active).unwrap();
        assert_eq!(active.version_number, 3);
        assert_eq!(active.change_type, ChangeType::Major);
    }

    #[tokio::test]
    async fn test_restore_of_active_version_is_refused() {
        let backend = seeded();
        let args = RestoreArgs {
            process_id: PROCESS_ID.into(),
            version_id: format!("{PROCESS_ID}-v2"),
            message: None,
        };

        let error = args.run(&editor(&backend)).await.unwrap_err();
        let cause = error.downcast_ref::<processlab_core::Error>().unwrap();
        assert_eq!(cause.kind(), ErrorKind::InvalidState);
        assert_eq!(backend.versions(PROCESS_ID).len(), 2);
    }

    #[tokio::test]
    async fn test_diff_between_versions() {
        let backend = seeded();
        let args = DiffArgs {
            process_id: PROCESS_ID.into(),
            base: format!("{PROCESS_ID}-v1"),
            candidate: format!("{PROCESS_ID}-v2"),
        };

        let output = args.run(&editor(&backend)).await.unwrap();
        assert!(output.contains("Task_1"));
    }

    #[test]
    fn test_render_empty_diff() {
        let document = orders("Pack");
        let diff = processlab_core::bpmn::diff(&document, &document);
        assert_eq!(render_diff(&diff), "No differences");
    }
}
