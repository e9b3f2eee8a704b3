//! Natural-language edits of the working copy.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use jiff::Timestamp;
use processlab_api::{EditRequest, EditResponse, EditService};
use processlab_core::{ChangeType, Error, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::TRACING_TARGET_BRIDGE as TRACING_TARGET;
use crate::session::ProcessSession;

/// Commit message of the version saved before editing a process without versions.
const INITIAL_COMMIT_MESSAGE: &str = "Initial version";

/// Author of a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptRole {
    User,
    Assistant,
    Error,
}

/// One line of the edit conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: TranscriptRole,
    pub text: String,
    pub at: Timestamp,
}

#[derive(Debug, Default)]
struct BridgeState {
    transcript: Vec<TranscriptEntry>,
    focus_requested: bool,
}

/// Sends free-text commands to the edit service and applies the results.
///
/// Every edit the service returns is already persisted as a new version;
/// the bridge adopts it without marking the session dirty.
#[derive(Clone)]
pub struct EditBridge {
    session: ProcessSession,
    edits: EditService,
    state: Arc<RwLock<BridgeState>>,
}

impl fmt::Debug for EditBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditBridge")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl EditBridge {
    /// Creates a bridge editing `session` through `edits`.
    pub fn new(session: ProcessSession, edits: EditService) -> Self {
        Self {
            session,
            edits,
            state: Arc::new(RwLock::new(BridgeState::default())),
        }
    }

    /// Applies `command` to the working copy.
    ///
    /// Blank commands are rejected without contacting the service. Failures
    /// are recorded in the transcript and raise a focus request; they are
    /// not retried.
    pub async fn submit(&self, command: &str) -> Result<EditResponse> {
        let command = command.trim();
        if command.is_empty() {
            return Err(Error::invalid_input().with_message("Describe the change you want to make"));
        }

        self.record(TranscriptRole::User, command).await;
        let started_at = Instant::now();

        match self.run(command).await {
            Ok(response) => {
                tracing::info!(
                    target: TRACING_TARGET,
                    version_id = %response.version_id,
                    changes = response.changes.len(),
                    elapsed_ms = started_at.elapsed().as_millis(),
                    "Edit adopted"
                );
                self.record(TranscriptRole::Assistant, response.summary())
                    .await;
                Ok(response)
            }
            Err(error) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    error = %error,
                    elapsed_ms = started_at.elapsed().as_millis(),
                    "Edit failed"
                );
                let text = format!("Sorry, I couldn't apply that change. {}", error.user_message());
                let mut state = self.state.write().await;
                state.transcript.push(entry(TranscriptRole::Error, text));
                state.focus_requested = true;
                Err(error)
            }
        }
    }

    async fn run(&self, command: &str) -> Result<EditResponse> {
        if self.session.process_id().await.is_none() {
            return Err(Error::invalid_state().with_message("Open a process before editing it"));
        }
        if self.session.loaded_version_id().await.is_none() {
            // Edits extend a version, so a process without one gets its first.
            self.session
                .save(Some(INITIAL_COMMIT_MESSAGE.to_owned()), ChangeType::Minor)
                .await?;
        }

        let document = self.session.document().await;
        let version_id = self.session.loaded_version_id().await;
        // An unsaved working copy has no server-side token to match.
        let etag = if self.session.is_dirty().await {
            None
        } else {
            self.session.store().etag().await
        };

        let request = EditRequest::from_document(document, command).with_version(version_id, etag);
        let response = self.edits.edit(&request).await?;

        self.session
            .apply_persisted(&response.version_id, response.bpmn.clone())
            .await?;
        Ok(response)
    }

    async fn record(&self, role: TranscriptRole, text: impl Into<String>) {
        self.state.write().await.transcript.push(entry(role, text));
    }

    /// Returns the conversation so far.
    pub async fn transcript(&self) -> Vec<TranscriptEntry> {
        self.state.read().await.transcript.clone()
    }

    /// Returns `true` once after a failed edit, asking the host to focus the input.
    pub async fn take_focus_request(&self) -> bool {
        std::mem::take(&mut self.state.write().await.focus_requested)
    }

    /// Clears the conversation.
    pub async fn clear_transcript(&self) {
        self.state.write().await.transcript.clear();
    }
}

fn entry(role: TranscriptRole, text: impl Into<String>) -> TranscriptEntry {
    TranscriptEntry {
        role,
        text: text.into(),
        at: Timestamp::now(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use processlab_api::mock::MockBackend;
    use processlab_core::ErrorKind;

    use super::*;
    use crate::test_support::*;

    async fn bridge_for(backend: &MockBackend) -> EditBridge {
        let services = backend.clone().into_services();
        let session = ProcessSession::new(crate::VersionStore::new(
            crate::SessionContext::new(),
            services.versions,
        ));
        session.load(PROCESS_ID).await.unwrap();
        EditBridge::new(session, services.edits)
    }

    #[tokio::test]
    async fn test_blank_command_is_rejected_locally() {
        let backend = seeded_backend();
        let bridge = bridge_for(&backend).await;
        let calls = backend.call_count();

        let error = bridge.submit("   ").await.unwrap_err();

        assert_eq!(error.kind, ErrorKind::InvalidInput);
        assert_eq!(backend.call_count(), calls);
        assert!(bridge.transcript().await.is_empty());
    }

    #[tokio::test]
    async fn test_successful_edit_is_adopted() {
        let backend = seeded_backend();
        let bridge = bridge_for(&backend).await;

        let response = bridge.submit("add task called Archive").await.unwrap();

        let session = &bridge.session;
        assert!(!session.is_dirty().await);
        assert_eq!(session.loaded_version_id().await, Some(response.version_id.clone()));
        assert!(session.document().await.resolve_element("Archive").is_some());
        assert_eq!(
            session.store().selected_version_id().await,
            Some(response.version_id.clone())
        );
        assert_eq!(backend.versions(PROCESS_ID).len(), 4);

        let transcript = bridge.transcript().await;
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].role, TranscriptRole::User);
        assert_eq!(transcript[0].text, "add task called Archive");
        assert_eq!(transcript[1].role, TranscriptRole::Assistant);
        assert_eq!(transcript[1].text, "Done. Added task 'Archive'.");
        assert!(!bridge.take_focus_request().await);
    }

    #[tokio::test]
    async fn test_failed_edit_records_error_and_requests_focus() {
        let backend = seeded_backend();
        let bridge = bridge_for(&backend).await;

        let error = bridge.submit("rename Ghost to Phantom").await.unwrap_err();
        assert_eq!(error.kind, ErrorKind::NotFound);

        let transcript = bridge.transcript().await;
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[1].role, TranscriptRole::Error);
        assert!(transcript[1].text.starts_with("Sorry"));

        assert!(bridge.take_focus_request().await);
        assert!(!bridge.take_focus_request().await);
        assert_eq!(backend.versions(PROCESS_ID).len(), 3);
    }

    #[tokio::test]
    async fn test_edit_of_process_without_versions() {
        let backend = MockBackend::new();
        let services = backend.clone().into_services();
        let session = ProcessSession::new(crate::VersionStore::new(
            crate::SessionContext::new(),
            services.versions,
        ));
        let bridge = EditBridge::new(session.clone(), services.edits);

        let error = bridge.submit("add task called Intake").await.unwrap_err();
        assert_eq!(error.kind, ErrorKind::InvalidState);

        let process = session.create("Onboarding", None).await.unwrap();
        let response = bridge.submit("add task called Intake").await.unwrap();

        let versions = backend.versions(&process.id);
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].commit_message.as_deref(), Some("Initial version"));
        assert_eq!(versions[1].id, response.version_id);
        assert_eq!(versions[1].parent_version_id, Some(versions[0].id.clone()));

        let store = session.store();
        assert_eq!(store.selected_version_id().await, Some(response.version_id.clone()));
        let content = store
            .load_version_content(&response.version_id)
            .await
            .unwrap()
            .unwrap();
        assert!(content.document.resolve_element("Intake").is_some());
    }

    #[tokio::test]
    async fn test_edit_is_listed_when_refresh_fails() {
        let backend = seeded_backend();
        let provider = ScriptedProvider::new(backend.clone());
        let fail_lists = provider.fail_lists.clone();
        let session = ProcessSession::new(store_with(provider));
        session.load(PROCESS_ID).await.unwrap();
        let bridge = EditBridge::new(session.clone(), backend.clone().into_services().edits);

        fail_lists.store(true, Ordering::SeqCst);
        let response = bridge.submit("add task called Archive").await.unwrap();

        let store = session.store();
        let versions = store.versions().await;
        assert_eq!(versions.len(), 4);
        assert_eq!(versions[0].id, response.version_id);
        assert_eq!(versions[0].version_number, 4);
        assert_eq!(
            store.active_version().await.map(|v| v.id),
            Some(response.version_id.clone())
        );
        assert_eq!(store.selected_version_id().await, Some(response.version_id));
    }

    #[tokio::test]
    async fn test_edit_of_unsaved_changes() {
        let backend = seeded_backend();
        let bridge = bridge_for(&backend).await;

        let mut edited = claims_revision(3);
        edited.elements[0].name = Some("Claim received".into());
        bridge.session.apply_document(edited).await.unwrap();

        bridge.submit("add end event named Rejected").await.unwrap();

        let document = bridge.session.document().await;
        assert_eq!(document.elements[0].name.as_deref(), Some("Claim received"));
        assert!(document.resolve_element("Rejected").is_some());
        assert!(!bridge.session.is_dirty().await);
    }
}
