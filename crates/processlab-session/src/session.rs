//! The working copy of a process being edited.

use std::fmt;
use std::sync::Arc;

use processlab_core::bpmn::{self, BpmnDocument, DocumentDiff, LintIssue};
use processlab_core::{ChangeType, Error, ErrorKind, Process, Result, Version};
use tokio::sync::RwLock;

use crate::TRACING_TARGET_SESSION as TRACING_TARGET;
use crate::generation::{Generation, Ticket};
use crate::store::{LoadMode, VersionContent, VersionStore};

/// Name given to the working copy of a process whose name is unknown.
const UNTITLED_PROCESS: &str = "Untitled process";

/// Failure of the most recent load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadError {
    pub process_id: String,
    pub kind: ErrorKind,
    /// User-facing message.
    pub message: String,
}

#[derive(Debug, Default)]
struct SessionState {
    process_id: Option<String>,
    process_name: Option<String>,
    document: BpmnDocument,
    /// Document as loaded or last saved; target of `discard_changes`.
    baseline: BpmnDocument,
    xml: String,
    dirty: bool,
    loaded_version_id: Option<String>,
    last_error: Option<LoadError>,
    loads: Generation,
}

impl SessionState {
    fn adopt(
        &mut self,
        process_id: String,
        process_name: Option<String>,
        document: BpmnDocument,
        xml: String,
        version_id: Option<String>,
    ) {
        self.process_id = Some(process_id);
        self.process_name = process_name;
        self.baseline = document.clone();
        self.document = document;
        self.xml = xml;
        self.dirty = false;
        self.loaded_version_id = version_id;
        self.last_error = None;
    }

    fn adopt_content(&mut self, content: VersionContent) {
        self.baseline = content.document.clone();
        self.document = content.document;
        self.xml = content.xml;
        self.dirty = false;
        self.loaded_version_id = Some(content.version_id);
    }

    fn ensure_clean(&self, action: &str) -> Result<()> {
        if self.dirty {
            return Err(Error::invalid_state()
                .with_message(format!("Save or discard your changes before you {action}")));
        }
        Ok(())
    }
}

/// Editing session over one process.
///
/// Holds the canonical document being edited, its derived XML and whether
/// it differs from the version it was loaded from. Cloning is cheap; clones
/// share state.
#[derive(Clone)]
pub struct ProcessSession {
    store: VersionStore,
    state: Arc<RwLock<SessionState>>,
}

impl fmt::Debug for ProcessSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessSession")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl ProcessSession {
    /// Creates a session with nothing loaded.
    pub fn new(store: VersionStore) -> Self {
        Self {
            store,
            state: Arc::new(RwLock::new(SessionState::default())),
        }
    }

    /// Returns the version store backing this session.
    pub fn store(&self) -> &VersionStore {
        &self.store
    }

    /// Loads a process and adopts its selected version as the working copy.
    ///
    /// Does nothing when the process is already loaded and the previous load
    /// succeeded. A process without versions gets an empty working copy.
    pub async fn load(&self, process_id: &str) -> Result<()> {
        let ticket = {
            let mut state = self.state.write().await;
            if state.process_id.as_deref() == Some(process_id) && state.last_error.is_none() {
                tracing::debug!(target: TRACING_TARGET, process_id, "Process already loaded");
                return Ok(());
            }
            state.loads.issue()
        };

        let result = self.load_selected(process_id, ticket).await;
        if let Err(error) = &result {
            let mut state = self.state.write().await;
            if state.loads.is_current(ticket) {
                state.last_error = Some(LoadError {
                    process_id: process_id.to_owned(),
                    kind: error.kind(),
                    message: error.user_message(),
                });
            }
        }

        result
    }

    async fn load_selected(&self, process_id: &str, ticket: Ticket) -> Result<()> {
        self.store
            .load_versions(process_id, LoadMode::Foreground)
            .await?;
        let process_name = self.store.process_name().await;

        let content = match self.store.selected_version_id().await {
            Some(version_id) => match self.store.load_version_content(&version_id).await? {
                Some(content) => Some(content),
                None => return Ok(()),
            },
            None => None,
        };

        let (document, xml, version_id) = match content {
            Some(content) => (content.document, content.xml, Some(content.version_id)),
            None => {
                let name = process_name.as_deref().unwrap_or(UNTITLED_PROCESS);
                let document = BpmnDocument::empty(name);
                let xml = bpmn::to_xml(&document)?;
                (document, xml, None)
            }
        };

        let mut state = self.state.write().await;
        if !state.loads.is_current(ticket) {
            tracing::warn!(target: TRACING_TARGET, process_id, "Discarding superseded load");
            return Ok(());
        }

        tracing::info!(
            target: TRACING_TARGET,
            process_id,
            version_id = ?version_id,
            elements = document.elements.len(),
            "Process loaded"
        );
        state.adopt(process_id.to_owned(), process_name, document, xml, version_id);
        Ok(())
    }

    /// Creates a new, empty process and adopts it.
    pub async fn create(&self, name: &str, description: Option<String>) -> Result<Process> {
        let ticket = self.state.write().await.loads.issue();
        let process = self.store.create_process(name, description).await?;

        let document = BpmnDocument::empty(process.name.clone());
        let xml = bpmn::to_xml(&document)?;

        let mut state = self.state.write().await;
        if state.loads.is_current(ticket) {
            state.adopt(
                process.id.clone(),
                Some(process.name.clone()),
                document,
                xml,
                None,
            );
        }

        Ok(process)
    }

    /// Replaces the working copy with an edited document.
    ///
    /// Returns `false` when the document equals the working copy.
    pub async fn apply_document(&self, document: BpmnDocument) -> Result<bool> {
        let mut state = self.state.write().await;
        if state.document == document {
            return Ok(false);
        }

        state.xml = bpmn::to_xml(&document)?;
        state.document = document;
        state.dirty = true;
        Ok(true)
    }

    /// Decodes XML into the canonical form and applies it.
    ///
    /// The session is untouched when the XML cannot be decoded.
    pub async fn apply_xml(&self, xml: &str) -> Result<bool> {
        let document = bpmn::from_xml(xml)?;
        self.apply_document(document).await
    }

    /// Adopts a document that was already persisted as `version_id`.
    pub async fn apply_persisted(&self, version_id: &str, document: BpmnDocument) -> Result<()> {
        self.store.adopt_persisted(version_id, &document).await?;
        let xml = bpmn::to_xml(&document)?;

        let mut state = self.state.write().await;
        state.baseline = document.clone();
        state.document = document;
        state.xml = xml;
        state.dirty = false;
        state.loaded_version_id = Some(version_id.to_owned());

        tracing::info!(target: TRACING_TARGET, version_id, "Persisted edit applied");
        Ok(())
    }

    /// Persists the working copy as a new version.
    ///
    /// Edits made while the save was in flight keep the session dirty.
    pub async fn save(
        &self,
        commit_message: Option<String>,
        change_type: ChangeType,
    ) -> Result<Version> {
        let document = self.state.read().await.document.clone();
        let version = self
            .store
            .save_version(&document, commit_message, change_type)
            .await?;

        let mut state = self.state.write().await;
        state.loaded_version_id = Some(version.id.clone());
        state.dirty = state.document != document;
        state.baseline = document;

        Ok(version)
    }

    /// Loads a version and adopts it as the working copy.
    ///
    /// Refused while there are unsaved changes. Returns `false` when a newer
    /// request superseded this one.
    pub async fn select_version(&self, version_id: &str) -> Result<bool> {
        let ticket = {
            let mut state = self.state.write().await;
            state.ensure_clean("switch versions")?;
            state.loads.issue()
        };

        let pending = self.store.fetch_pending(version_id).await?;

        // The store follows the selection only when the session adopts it.
        let mut state = self.state.write().await;
        if !state.loads.is_current(ticket) || state.dirty {
            tracing::warn!(target: TRACING_TARGET, version_id, "Discarding superseded selection");
            return Ok(false);
        }
        if !self.store.commit_pending(&pending).await {
            return Ok(false);
        }

        state.adopt_content(pending.into_content());
        Ok(true)
    }

    /// Reverts the working copy to the version it was loaded from.
    pub async fn discard_changes(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.dirty {
            return Ok(());
        }

        state.xml = bpmn::to_xml(&state.baseline)?;
        state.document = state.baseline.clone();
        state.dirty = false;
        Ok(())
    }

    /// Restores an earlier version and adopts the result.
    ///
    /// Refused while there are unsaved changes.
    pub async fn restore_version(
        &self,
        version_id: &str,
        commit_message: Option<String>,
    ) -> Result<Version> {
        let ticket = {
            let mut state = self.state.write().await;
            state.ensure_clean("restore a version")?;
            state.loads.issue()
        };

        let (version, content) = self
            .store
            .restore_version(version_id, commit_message)
            .await?;

        let mut state = self.state.write().await;
        if state.loads.is_current(ticket) {
            state.adopt_content(content);
        }

        Ok(version)
    }

    /// Compares two versions of the loaded process.
    pub async fn compare(&self, base_id: &str, candidate_id: &str) -> Result<DocumentDiff> {
        self.store.compare_versions(base_id, candidate_id).await
    }

    /// Structural warnings for the working copy.
    pub async fn lint(&self) -> Vec<LintIssue> {
        bpmn::lint(&self.state.read().await.document)
    }

    /// Returns the loaded process id.
    pub async fn process_id(&self) -> Option<String> {
        self.state.read().await.process_id.clone()
    }

    /// Returns the loaded process name.
    pub async fn process_name(&self) -> Option<String> {
        self.state.read().await.process_name.clone()
    }

    /// Returns the working copy.
    pub async fn document(&self) -> BpmnDocument {
        self.state.read().await.document.clone()
    }

    /// Returns the XML derived from the working copy.
    pub async fn xml(&self) -> String {
        self.state.read().await.xml.clone()
    }

    /// Returns `true` if the working copy has unsaved changes.
    pub async fn is_dirty(&self) -> bool {
        self.state.read().await.dirty
    }

    /// Returns the id of the version the working copy was loaded from.
    pub async fn loaded_version_id(&self) -> Option<String> {
        self.state.read().await.loaded_version_id.clone()
    }

    /// Returns the failure of the most recent load, if any.
    pub async fn last_error(&self) -> Option<LoadError> {
        self.state.read().await.last_error.clone()
    }
}
