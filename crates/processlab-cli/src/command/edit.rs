//! Natural-language edits.

use clap::Args;
use processlab_session::TranscriptRole;

use super::Editor;

/// Applies a free-text change to the active version, e.g.
/// `processlab edit proc-1 add task called Archive`.
#[derive(Debug, Clone, Args)]
pub struct EditArgs {
    /// Process identifier
    pub process_id: String,

    /// The change to make, in plain words
    #[arg(required = true, num_args = 1.., trailing_var_arg = true)]
    pub command: Vec<String>,
}

impl EditArgs {
    pub async fn run(self, editor: &Editor) -> anyhow::Result<String> {
        let session = &editor.session;
        session.load(&self.process_id).await?;

        let command = self.command.join(" ");
        match editor.bridge.submit(&command).await {
            Ok(response) => Ok(format!(
                "{}\nSaved as {}",
                response.summary(),
                response.version_id
            )),
            Err(error) => {
                // The bridge already phrased the failure for the transcript.
                let transcript = editor.bridge.transcript().await;
                match transcript.iter().rev().find(|e| e.role == TranscriptRole::Error) {
                    Some(entry) => Err(anyhow::Error::new(error).context(entry.text.clone())),
                    None => Err(error.into()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use processlab_api::mock::MockBackend;
    use processlab_core::bpmn::{BpmnDocument, Element, ElementType};
    use processlab_session::SessionContext;

    use super::*;

    fn seeded() -> MockBackend {
        let backend = MockBackend::new();
        backend.seed_process("proc-1", "Support");

        let mut document = BpmnDocument::new("Process_1", Some("Support".into()));
        document.elements = vec![Element::new("Task_1", ElementType::Task).with_name("Triage")];
        backend.seed_version("proc-1", &document, None).unwrap();
        backend
    }

    fn args(words: &[&str]) -> EditArgs {
        EditArgs {
            process_id: "proc-1".into(),
            command: words.iter().map(|w| (*w).to_owned()).collect(),
        }
    }

    #[tokio::test]
    async fn test_edit_saves_new_version() {
        let backend = seeded();
        let editor = Editor::new(SessionContext::new(), backend.clone().into_services());

        let output = args(&["add", "task", "called", "Escalate"])
            .run(&editor)
            .await
            .unwrap();

        assert_eq!(
            output,
            "Done. Added task 'Escalate'.\nSaved as proc-1-v2"
        );
        assert_eq!(backend.versions("proc-1").len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_command_is_reported() {
        let backend = seeded();
        let editor = Editor::new(SessionContext::new(), backend.clone().into_services());

        let error = args(&["make", "it", "better"]).run(&editor).await.unwrap_err();

        assert!(error.to_string().starts_with("Sorry, I couldn't apply that change."));
        assert_eq!(backend.versions("proc-1").len(), 1);
    }
}
