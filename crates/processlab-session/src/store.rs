//! Client-side view of a process's version history.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use processlab_api::{
    CreateProcessRequest, CreateVersionRequest, RestoreVersionRequest, VersionList,
    VersionService,
};
use processlab_core::bpmn::{self, BpmnDocument, DocumentDiff};
use jiff::Timestamp;
use processlab_core::{ChangeType, Error, ErrorKind, Process, Result, Version};
use tokio::sync::RwLock;

use crate::TRACING_TARGET_STORE as TRACING_TARGET;
use crate::context::SessionContext;
use crate::generation::{Generation, Ticket};

/// How failures of a list load are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMode {
    /// Errors are returned to the caller.
    #[default]
    Foreground,
    /// Errors are logged; the current list stays as it is.
    Silent,
}

/// Origin of the XML held for a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlSource {
    /// Sent by the server alongside the version.
    Server,
    /// Generated locally from the canonical document.
    Derived,
}

/// Resolved payload of one version.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionContent {
    pub version_id: String,
    /// Canonical document.
    pub document: BpmnDocument,
    /// XML projection of `document`.
    pub xml: String,
    pub xml_source: XmlSource,
    /// Concurrency token to send with the next save.
    pub etag: Option<String>,
}

impl VersionContent {
    /// Resolves the payload of a fetched version.
    ///
    /// JSON wins when both forms are present. An XML-only payload is decoded
    /// into the canonical document; a version with neither form, or with a
    /// form that cannot be converted, is a `Conversion` error.
    pub fn resolve(version: &Version) -> Result<Self> {
        let (document, xml, xml_source) = match (version.document()?, &version.xml) {
            (Some(document), Some(xml)) => (document, xml.clone(), XmlSource::Server),
            (Some(document), None) => {
                let xml = bpmn::to_xml(&document)?;
                (document, xml, XmlSource::Derived)
            }
            (None, Some(xml)) => {
                let document = bpmn::from_xml(xml).map_err(|error| {
                    Error::conversion()
                        .with_message(format!("Version {} has unreadable XML", version.id))
                        .with_source(error)
                })?;
                (document, xml.clone(), XmlSource::Server)
            }
            (None, None) => {
                return Err(Error::conversion()
                    .with_message(format!("Version {} has no BPMN payload", version.id)));
            }
        };

        let etag = match &version.etag {
            Some(etag) => etag.clone(),
            None => document.etag()?,
        };

        Ok(Self {
            version_id: version.id.clone(),
            document,
            xml,
            xml_source,
            etag: Some(etag),
        })
    }

    /// Builds the content of a version persisted from a local document.
    pub fn derived(
        version_id: impl Into<String>,
        document: BpmnDocument,
        etag: Option<String>,
    ) -> Result<Self> {
        let xml = bpmn::to_xml(&document)?;
        Ok(Self {
            version_id: version_id.into(),
            document,
            xml,
            xml_source: XmlSource::Derived,
            etag,
        })
    }
}

#[derive(Debug, Default)]
struct StoreState {
    process_id: Option<String>,
    process_name: Option<String>,
    /// Descending by version number.
    versions: Vec<Version>,
    selected_version_id: Option<String>,
    /// Token of the selected content.
    etag: Option<String>,
    /// Token of the active version; sent as `If-Match` with the next save.
    head_etag: Option<String>,
    content: Option<VersionContent>,
    lists: Generation,
    contents: Generation,
}

impl StoreState {
    fn is_showing(&self, process_id: &str) -> bool {
        self.process_id.as_deref() == Some(process_id)
    }

    fn apply_list(&mut self, process_id: &str, list: VersionList) {
        let process_name = list.process_name.clone();
        let versions = list.into_sorted();

        let same_process = self.is_showing(process_id);
        let keep_selection = same_process
            && self
                .selected_version_id
                .as_ref()
                .is_some_and(|id| versions.iter().any(|v| &v.id == id));

        if !same_process {
            self.contents.advance();
            self.content = None;
            self.etag = None;
            self.head_etag = None;
        }
        if let Some(etag) = versions
            .iter()
            .find(|v| v.is_active)
            .and_then(|v| v.etag.clone())
        {
            self.head_etag = Some(etag);
        }
        if !keep_selection {
            self.selected_version_id = default_selection(&versions);
        }

        self.process_id = Some(process_id.to_owned());
        if process_name.is_some() || !same_process {
            self.process_name = process_name;
        }
        self.versions = versions;
    }

    fn apply_content(&mut self, content: VersionContent) {
        if self
            .versions
            .iter()
            .any(|v| v.id == content.version_id && v.is_active)
        {
            self.head_etag = content.etag.clone();
        }
        self.selected_version_id = Some(content.version_id.clone());
        self.etag = content.etag.clone();
        self.content = Some(content);
    }

    fn ensure_listed(&mut self, version: &Version) {
        if self.versions.iter().any(|v| v.id == version.id) {
            return;
        }
        if version.is_active {
            for other in &mut self.versions {
                other.is_active = false;
            }
        }
        self.versions.push(version.summary());
        self.versions
            .sort_by(|a, b| b.version_number.cmp(&a.version_number));
    }

    fn reset(&mut self, process: &Process) {
        self.lists.advance();
        self.contents.advance();
        self.process_id = Some(process.id.clone());
        self.process_name = Some(process.name.clone());
        self.versions.clear();
        self.selected_version_id = None;
        self.etag = None;
        self.head_etag = None;
        self.content = None;
    }

    fn next_version_number(&self) -> u32 {
        self.versions
            .iter()
            .map(|v| v.version_number)
            .max()
            .unwrap_or(0)
            + 1
    }
}

/// Version content fetched for selection but not yet applied.
#[derive(Debug)]
pub(crate) struct PendingContent {
    process_id: String,
    ticket: Ticket,
    content: VersionContent,
}

impl PendingContent {
    pub(crate) fn into_content(self) -> VersionContent {
        self.content
    }
}

/// The active version, or the highest number when none is active.
fn default_selection(versions: &[Version]) -> Option<String> {
    versions
        .iter()
        .find(|v| v.is_active)
        .or_else(|| versions.iter().max_by_key(|v| v.version_number))
        .map(|v| v.id.clone())
}

fn no_process() -> Error {
    Error::invalid_state().with_message("No process is loaded")
}

/// Version history, selection and persistence for one process at a time.
///
/// Cloning is cheap; clones share state. Each request takes a generation
/// ticket, and a response is applied only while its ticket is current.
#[derive(Clone)]
pub struct VersionStore {
    versions: VersionService,
    context: Arc<SessionContext>,
    state: Arc<RwLock<StoreState>>,
}

impl fmt::Debug for VersionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionStore")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl VersionStore {
    /// Creates an empty store.
    pub fn new(context: SessionContext, versions: VersionService) -> Self {
        Self {
            versions,
            context: Arc::new(context),
            state: Arc::new(RwLock::new(StoreState::default())),
        }
    }

    /// Returns the session context.
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Fetches the version list of `process_id` and updates the selection.
    ///
    /// The selected version is kept when it is still listed for the same
    /// process; otherwise the active version is selected, or the highest
    /// number when none is active.
    pub async fn load_versions(&self, process_id: &str, mode: LoadMode) -> Result<()> {
        let ticket = self.state.write().await.lists.issue();
        let started_at = Instant::now();

        let list = match self.versions.list_versions(process_id).await {
            Ok(list) => list,
            Err(error) if mode == LoadMode::Silent => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    process_id,
                    error = %error,
                    "Background refresh of the version list failed"
                );
                return Ok(());
            }
            Err(error) => return Err(error),
        };

        let mut state = self.state.write().await;
        if !state.lists.is_current(ticket) {
            tracing::warn!(
                target: TRACING_TARGET,
                process_id,
                "Discarding superseded version list"
            );
            return Ok(());
        }

        state.apply_list(process_id, list);
        tracing::debug!(
            target: TRACING_TARGET,
            process_id,
            versions = state.versions.len(),
            selected = ?state.selected_version_id,
            elapsed_ms = started_at.elapsed().as_millis(),
            "Version list loaded"
        );

        Ok(())
    }

    /// Fetches a version's payload and makes it the selected content.
    ///
    /// Returns `None` when a newer load or a save superseded this one while
    /// it was in flight; the store is left untouched in that case.
    pub async fn load_version_content(&self, version_id: &str) -> Result<Option<VersionContent>> {
        let pending = self.fetch_pending(version_id).await?;
        if !self.commit_pending(&pending).await {
            return Ok(None);
        }
        Ok(Some(pending.into_content()))
    }

    /// Fetches a version's payload under a fresh content ticket.
    pub(crate) async fn fetch_pending(&self, version_id: &str) -> Result<PendingContent> {
        let (process_id, ticket) = {
            let mut state = self.state.write().await;
            let process_id = state.process_id.clone().ok_or_else(no_process)?;
            (process_id, state.contents.issue())
        };

        let version = self.versions.get_version(&process_id, version_id).await?;
        let content = VersionContent::resolve(&version)?;

        Ok(PendingContent {
            process_id,
            ticket,
            content,
        })
    }

    /// Makes fetched content the selection unless it was superseded.
    pub(crate) async fn commit_pending(&self, pending: &PendingContent) -> bool {
        let PendingContent {
            process_id,
            ticket,
            content,
        } = pending;

        let mut state = self.state.write().await;
        if !state.contents.is_current(*ticket) || !state.is_showing(process_id) {
            tracing::warn!(
                target: TRACING_TARGET,
                process_id,
                version_id = %content.version_id,
                "Discarding superseded version content"
            );
            return false;
        }

        tracing::debug!(
            target: TRACING_TARGET,
            process_id,
            version_id = %content.version_id,
            xml_source = ?content.xml_source,
            "Version content loaded"
        );
        state.apply_content(content.clone());
        true
    }

    /// Fetches and resolves a version's payload without touching the store.
    pub async fn fetch_content(&self, version_id: &str) -> Result<VersionContent> {
        let process_id = self.process_id().await.ok_or_else(no_process)?;
        let version = self.versions.get_version(&process_id, version_id).await?;
        VersionContent::resolve(&version)
    }

    /// Persists `document` as a new version of the loaded process.
    ///
    /// The parent is the selected version. The token of the active version,
    /// as last seen, travels as an `If-Match` precondition. On success
    /// the new version is selected and its XML is available immediately; the
    /// list is then refreshed in the background.
    pub async fn save_version(
        &self,
        document: &BpmnDocument,
        commit_message: Option<String>,
        change_type: ChangeType,
    ) -> Result<Version> {
        let (process_id, parent_version_id, etag) = {
            let state = self.state.read().await;
            let process_id = state.process_id.clone().ok_or_else(no_process)?;
            (process_id, state.selected_version_id.clone(), state.head_etag.clone())
        };

        document.validate()?;
        let xml = bpmn::to_xml(document)?;

        let mut request = CreateVersionRequest::new(document.clone())
            .with_change_type(change_type)
            .with_parent(parent_version_id)
            .with_if_match(etag);
        if let Some(message) = commit_message {
            request = request.with_commit_message(message);
        }

        let version = self.versions.create_version(&process_id, &request).await?;
        let etag = match &version.etag {
            Some(etag) => etag.clone(),
            None => document.etag()?,
        };

        let content = VersionContent {
            version_id: version.id.clone(),
            document: document.clone(),
            xml,
            xml_source: XmlSource::Derived,
            etag: Some(etag),
        };

        tracing::info!(
            target: TRACING_TARGET,
            process_id,
            version_id = %version.id,
            version_number = version.version_number,
            actor = ?self.context.actor,
            "Version saved"
        );

        let ticket = self.apply_written(&process_id, content).await;
        self.refresh_after_write(&process_id, &version.id, Some(&version), ticket)
            .await;

        Ok(version)
    }

    /// Appends a new version duplicating `version_id` and selects it.
    ///
    /// Refused for the active version. Existing versions are not modified.
    pub async fn restore_version(
        &self,
        version_id: &str,
        commit_message: Option<String>,
    ) -> Result<(Version, VersionContent)> {
        let process_id = {
            let state = self.state.read().await;
            let process_id = state.process_id.clone().ok_or_else(no_process)?;
            if state
                .versions
                .iter()
                .any(|v| v.id == version_id && v.is_active)
            {
                return Err(Error::invalid_state()
                    .with_message("This version is already the active version"));
            }
            process_id
        };

        let request = RestoreVersionRequest::new(version_id).with_commit_message(commit_message);
        let version = self.versions.restore_version(&process_id, &request).await?;
        let version = if version.has_payload() {
            version
        } else {
            self.versions.get_version(&process_id, &version.id).await?
        };
        let content = VersionContent::resolve(&version)?;

        tracing::info!(
            target: TRACING_TARGET,
            process_id,
            restored_from = version_id,
            version_id = %version.id,
            version_number = version.version_number,
            actor = ?self.context.actor,
            "Version restored"
        );

        let ticket = self.apply_written(&process_id, content.clone()).await;
        self.refresh_after_write(&process_id, &version.id, Some(&version), ticket)
            .await;

        Ok((version, content))
    }

    /// Fetches two versions and compares their documents.
    pub async fn compare_versions(
        &self,
        base_id: &str,
        candidate_id: &str,
    ) -> Result<DocumentDiff> {
        let (base, candidate) = tokio::try_join!(
            self.fetch_content(base_id),
            self.fetch_content(candidate_id)
        )?;

        let diff = bpmn::diff(&base.document, &candidate.document);
        tracing::debug!(
            target: TRACING_TARGET,
            base_id,
            candidate_id,
            changes = diff.change_count(),
            "Versions compared"
        );
        Ok(diff)
    }

    /// Selects a version that was persisted outside the store.
    ///
    /// The version must belong to the loaded process. It is listed as the
    /// active version even when the following refresh fails.
    pub async fn adopt_persisted(&self, version_id: &str, document: &BpmnDocument) -> Result<()> {
        let process_id = self.process_id().await.ok_or_else(no_process)?;
        let etag = document.etag()?;

        let version = match self.versions.get_version(&process_id, version_id).await {
            Ok(version) => version.summary(),
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return Err(Error::invalid_state()
                    .with_message(format!(
                        "Version {version_id} does not belong to process {process_id}"
                    ))
                    .with_source(error));
            }
            Err(error) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    process_id,
                    version_id,
                    error = %error,
                    "Listing persisted version provisionally"
                );
                self.provisional_version(&process_id, version_id, &etag)
                    .await
            }
        };

        let content = VersionContent::derived(version_id, document.clone(), Some(etag))?;
        let ticket = self.apply_written(&process_id, content).await;
        self.refresh_after_write(&process_id, version_id, Some(&version), ticket)
            .await;
        Ok(())
    }

    /// Summary of a version known only by id, numbered after the listed ones.
    ///
    /// Replaced by the server's entry on the next successful list load.
    async fn provisional_version(&self, process_id: &str, version_id: &str, etag: &str) -> Version {
        let state = self.state.read().await;
        Version {
            id: version_id.to_owned(),
            process_id: process_id.to_owned(),
            version_number: state.next_version_number(),
            version_label: None,
            commit_message: None,
            change_type: ChangeType::default(),
            is_active: true,
            created_at: Timestamp::now(),
            created_by: self.context.actor.clone(),
            parent_version_id: state.selected_version_id.clone(),
            etag: Some(etag.to_owned()),
            bpmn_json: None,
            xml: None,
        }
    }

    /// Creates a process in the context's project and switches to it.
    pub async fn create_process(
        &self,
        name: impl Into<String>,
        description: Option<String>,
    ) -> Result<Process> {
        let request = CreateProcessRequest::new(name)
            .with_description(description)
            .with_project(self.context.project_id.clone())
            .with_folder(self.context.folder_id.clone());

        let process = self.versions.create_process(&request).await?;
        self.state.write().await.reset(&process);

        Ok(process)
    }

    /// Applies a write result unless the store moved to another process.
    async fn apply_written(&self, process_id: &str, content: VersionContent) -> Option<Ticket> {
        let mut state = self.state.write().await;
        if !state.is_showing(process_id) {
            return None;
        }

        state.contents.advance();
        state.head_etag = content.etag.clone();
        state.apply_content(content);
        Some(state.contents.current())
    }

    /// Refreshes the list silently and keeps the written version visible.
    async fn refresh_after_write(
        &self,
        process_id: &str,
        version_id: &str,
        written: Option<&Version>,
        ticket: Option<Ticket>,
    ) {
        let Some(ticket) = ticket else {
            return;
        };

        let _ = self.load_versions(process_id, LoadMode::Silent).await;

        let mut state = self.state.write().await;
        if !state.is_showing(process_id) {
            return;
        }
        if let Some(version) = written {
            state.ensure_listed(version);
        }
        if state.contents.is_current(ticket) {
            state.selected_version_id = Some(version_id.to_owned());
        }
    }

    /// Returns the loaded process id.
    pub async fn process_id(&self) -> Option<String> {
        self.state.read().await.process_id.clone()
    }

    /// Returns the loaded process name.
    pub async fn process_name(&self) -> Option<String> {
        self.state.read().await.process_name.clone()
    }

    /// Returns the version list, descending by number.
    pub async fn versions(&self) -> Vec<Version> {
        self.state.read().await.versions.clone()
    }

    /// Returns the selected version id.
    pub async fn selected_version_id(&self) -> Option<String> {
        self.state.read().await.selected_version_id.clone()
    }

    /// Returns the selected version's list entry.
    pub async fn selected_version(&self) -> Option<Version> {
        let state = self.state.read().await;
        let selected = state.selected_version_id.as_ref()?;
        state.versions.iter().find(|v| &v.id == selected).cloned()
    }

    /// Returns the active version's list entry.
    pub async fn active_version(&self) -> Option<Version> {
        self.state
            .read()
            .await
            .versions
            .iter()
            .find(|v| v.is_active)
            .cloned()
    }

    /// Returns the token of the selected content.
    pub async fn etag(&self) -> Option<String> {
        self.state.read().await.etag.clone()
    }

    /// Returns the token of the active version as last seen.
    pub async fn head_etag(&self) -> Option<String> {
        self.state.read().await.head_etag.clone()
    }

    /// Returns the selected content.
    pub async fn content(&self) -> Option<VersionContent> {
        self.state.read().await.content.clone()
    }
}
