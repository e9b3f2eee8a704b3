//! In-memory implementation of the API providers for testing.
//!
//! [`MockBackend`] keeps processes and their versions in memory and follows the
//! same numbering, activation and concurrency rules as the hosted API. Failures
//! and latency can be injected to exercise error paths.
//!
//! # Feature Flag
//!
//! This module is only available when the `test-utils` feature is enabled:
//!
//! ```toml
//! [dev-dependencies]
//! processlab-api = { version = "...", features = ["test-utils"] }
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use processlab_api::mock::MockBackend;
//!
//! let backend = MockBackend::default();
//! backend.seed_process("proc-1", "Claims");
//! let services = backend.clone().into_services();
//! ```

mod command;

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use jiff::Timestamp;
use processlab_core::bpmn::{self, BpmnDocument};
use processlab_core::{ChangeType, ErrorKind};

pub use self::command::interpret;
use crate::{
    ApiServices, CreateProcessRequest, CreateVersionRequest, EditProvider, EditRequest,
    EditResponse, EditService, Error, Process, RestoreVersionRequest, Result, TRACING_TARGET,
    Version, VersionList, VersionProvider, VersionService,
};

/// Message returned when a concurrency token is stale.
pub const CONFLICT_MESSAGE: &str = "Process changed since you started editing.";

/// Name given to processes created by an edit without a source version.
pub const EDITED_PROCESS_NAME: &str = "Edited Process";

#[derive(Debug, Default)]
struct MockState {
    processes: BTreeMap<String, StoredProcess>,
    failures: VecDeque<ErrorKind>,
    latency: Option<Duration>,
    offline: bool,
    calls: usize,
}

#[derive(Debug)]
struct StoredProcess {
    process: Process,
    versions: Vec<Version>,
}

/// Payload and metadata of a version about to be appended.
struct Draft {
    bpmn_json: Option<serde_json::Value>,
    xml: Option<String>,
    etag: Option<String>,
    commit_message: Option<String>,
    change_type: ChangeType,
    parent_version_id: Option<String>,
    is_active: bool,
}

impl StoredProcess {
    fn new(process: Process) -> Self {
        Self {
            process,
            versions: Vec::new(),
        }
    }

    fn active(&self) -> Option<&Version> {
        self.versions.iter().find(|v| v.is_active)
    }

    fn find(&self, version_id: &str) -> Option<&Version> {
        self.versions.iter().find(|v| v.id == version_id)
    }

    fn next_number(&self) -> u32 {
        self.versions
            .iter()
            .map(|v| v.version_number)
            .max()
            .unwrap_or(0)
            + 1
    }

    fn insert(&mut self, version: Version) {
        if version.is_active {
            for other in &mut self.versions {
                other.is_active = false;
            }
            self.process.current_version_id = Some(version.id.clone());
        }
        self.versions.push(version);
        self.process.version_count = self.versions.len() as u32;
    }

    fn append(&mut self, draft: Draft) -> Version {
        let number = self.next_number();
        let version = Version {
            id: format!("{}-v{number}", self.process.id),
            process_id: self.process.id.clone(),
            version_number: number,
            version_label: Some(format!("v{number}")),
            commit_message: draft.commit_message,
            change_type: draft.change_type,
            is_active: draft.is_active,
            created_at: Timestamp::now(),
            created_by: None,
            parent_version_id: draft.parent_version_id,
            etag: draft.etag,
            bpmn_json: draft.bpmn_json,
            xml: draft.xml,
        };

        self.insert(version.clone());
        version
    }
}

impl Draft {
    fn from_document(document: &BpmnDocument) -> Result<Self> {
        Ok(Self {
            bpmn_json: Some(document.to_value()?),
            xml: None,
            etag: Some(document.etag()?),
            commit_message: None,
            change_type: ChangeType::default(),
            parent_version_id: None,
            is_active: true,
        })
    }
}

/// In-memory ProcessLab backend.
///
/// Cloning is cheap; all clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a process without versions.
    pub fn seed_process(&self, id: impl Into<String>, name: impl Into<String>) -> Process {
        let process = Process {
            id: id.into(),
            name: name.into(),
            description: None,
            project_id: None,
            folder_id: None,
            current_version_id: None,
            version_count: 0,
            created_at: Timestamp::now(),
        };

        self.lock()
            .processes
            .insert(process.id.clone(), StoredProcess::new(process.clone()));
        process
    }

    /// Stores a version as-is, registering its process if needed.
    ///
    /// Useful for histories the API would not produce itself, such as
    /// XML-only or unreadable payloads.
    pub fn push_version(&self, version: Version) {
        let mut state = self.lock();
        let stored = state
            .processes
            .entry(version.process_id.clone())
            .or_insert_with(|| {
                StoredProcess::new(Process {
                    id: version.process_id.clone(),
                    name: version.process_id.clone(),
                    description: None,
                    project_id: None,
                    folder_id: None,
                    current_version_id: None,
                    version_count: 0,
                    created_at: Timestamp::now(),
                })
            });
        stored.insert(version);
    }

    /// Appends an active version holding `document`, as a save would.
    pub fn seed_version(
        &self,
        process_id: &str,
        document: &BpmnDocument,
        commit_message: Option<&str>,
    ) -> Result<Version> {
        let mut state = self.lock();
        let stored = state
            .processes
            .get_mut(process_id)
            .ok_or_else(|| process_not_found(process_id))?;

        let mut draft = Draft::from_document(document)?;
        draft.commit_message = commit_message.map(str::to_owned);
        draft.parent_version_id = stored.process.current_version_id.clone();
        Ok(stored.append(draft))
    }

    /// Returns the stored versions of a process, payloads included.
    pub fn versions(&self, process_id: &str) -> Vec<Version> {
        self.lock()
            .processes
            .get(process_id)
            .map(|stored| stored.versions.clone())
            .unwrap_or_default()
    }

    /// Returns the stored process record.
    pub fn process(&self, process_id: &str) -> Option<Process> {
        self.lock()
            .processes
            .get(process_id)
            .map(|stored| stored.process.clone())
    }

    /// Makes the next call fail with `kind`. Calls queue up in order.
    pub fn fail_next(&self, kind: ErrorKind) {
        self.lock().failures.push_back(kind);
    }

    /// Makes every call fail with a network error until reset.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Delays every call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.lock().latency = latency;
    }

    /// Number of provider calls received so far.
    pub fn call_count(&self) -> usize {
        self.lock().calls
    }

    /// Wraps this backend into a complete set of API services.
    pub fn into_services(self) -> ApiServices {
        ApiServices::new(VersionService::new(self.clone()), EditService::new(self))
    }

    /// Accounts for a call and applies injected latency and failures.
    async fn begin(&self, operation: &'static str) -> Result<()> {
        let latency = {
            let mut state = self.lock();
            state.calls += 1;
            state.latency
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.lock();
        if state.offline {
            return Err(Error::network_error().with_message("Backend is offline"));
        }
        if let Some(kind) = state.failures.pop_front() {
            tracing::debug!(target: TRACING_TARGET, operation, %kind, "Injecting failure");
            return Err(Error::new(kind).with_message(format!("Injected {kind} failure")));
        }
        Ok(())
    }
}

fn process_not_found(process_id: &str) -> Error {
    Error::not_found().with_message(format!("Process {process_id} not found"))
}

fn version_not_found(version_id: &str) -> Error {
    Error::not_found().with_message(format!("Version {version_id} not found"))
}

#[async_trait::async_trait]
impl VersionProvider for MockBackend {
    async fn list_versions(&self, process_id: &str) -> Result<VersionList> {
        self.begin("list_versions").await?;

        let state = self.lock();
        let stored = state
            .processes
            .get(process_id)
            .ok_or_else(|| process_not_found(process_id))?;

        Ok(VersionList {
            process_id: process_id.to_owned(),
            process_name: Some(stored.process.name.clone()),
            versions: stored.versions.iter().map(Version::summary).collect(),
            total_count: stored.versions.len() as u32,
        })
    }

    async fn get_version(&self, process_id: &str, version_id: &str) -> Result<Version> {
        self.begin("get_version").await?;

        let state = self.lock();
        let stored = state
            .processes
            .get(process_id)
            .ok_or_else(|| process_not_found(process_id))?;

        stored
            .find(version_id)
            .cloned()
            .ok_or_else(|| version_not_found(version_id))
    }

    async fn create_version(
        &self,
        process_id: &str,
        request: &CreateVersionRequest,
    ) -> Result<Version> {
        self.begin("create_version").await?;
        request.document.validate()?;

        let mut state = self.lock();
        let stored = state
            .processes
            .get_mut(process_id)
            .ok_or_else(|| process_not_found(process_id))?;

        if let Some(token) = &request.if_match
            && let Some(active) = stored.active()
            && active.etag.as_deref() != Some(token.as_str())
        {
            return Err(Error::conflict().with_message(CONFLICT_MESSAGE));
        }

        let mut draft = Draft::from_document(&request.document)?;
        draft.commit_message = request.commit_message.clone();
        draft.change_type = request.change_type;
        draft.parent_version_id = request.parent_version_id.clone();
        draft.is_active = request.is_active;
        Ok(stored.append(draft))
    }

    async fn restore_version(
        &self,
        process_id: &str,
        request: &RestoreVersionRequest,
    ) -> Result<Version> {
        self.begin("restore_version").await?;

        let mut state = self.lock();
        let stored = state
            .processes
            .get_mut(process_id)
            .ok_or_else(|| process_not_found(process_id))?;
        let source = stored
            .find(&request.version_id)
            .cloned()
            .ok_or_else(|| version_not_found(&request.version_id))?;

        let commit_message = request
            .commit_message
            .clone()
            .unwrap_or_else(|| format!("Restored to version {}", source.version_number));
        let parent_version_id = stored.process.current_version_id.clone();

        Ok(stored.append(Draft {
            bpmn_json: source.bpmn_json,
            xml: source.xml,
            etag: source.etag,
            commit_message: Some(commit_message),
            change_type: ChangeType::Major,
            parent_version_id,
            is_active: true,
        }))
    }

    async fn create_process(&self, request: &CreateProcessRequest) -> Result<Process> {
        self.begin("create_process").await?;

        if request.name.trim().is_empty() {
            return Err(Error::invalid_input().with_message("Process name must not be empty"));
        }

        let process = Process {
            id: uuid::Uuid::now_v7().to_string(),
            name: request.name.clone(),
            description: request.description.clone(),
            project_id: request.project_id.clone(),
            folder_id: request.folder_id.clone(),
            current_version_id: None,
            version_count: 0,
            created_at: Timestamp::now(),
        };

        self.lock()
            .processes
            .insert(process.id.clone(), StoredProcess::new(process.clone()));
        Ok(process)
    }
}

#[async_trait::async_trait]
impl EditProvider for MockBackend {
    async fn edit(&self, request: &EditRequest) -> Result<EditResponse> {
        self.begin("edit").await?;

        let document = match (&request.bpmn, &request.bpmn_xml) {
            (Some(document), _) => document.clone(),
            (None, Some(xml)) => bpmn::from_xml(xml)?,
            (None, None) => {
                return Err(Error::invalid_input().with_message("Either bpmn or bpmn_xml is required"));
            }
        };

        if let Some(token) = &request.if_match
            && *token != document.etag()?
        {
            return Err(Error::conflict().with_message(CONFLICT_MESSAGE));
        }

        let op = interpret(&request.command).ok_or_else(|| {
            Error::invalid_input().with_message(format!("Command not understood: {}", request.command))
        })?;
        let (edited, changes) = bpmn::apply(&document, &[op])?;

        let mut state = self.lock();
        let owner = request.model_version_id.as_deref().and_then(|version_id| {
            state
                .processes
                .iter()
                .find(|(_, stored)| stored.find(version_id).is_some())
                .map(|(id, _)| id.clone())
        });

        let process_id = match owner {
            Some(process_id) => process_id,
            None => {
                let id = uuid::Uuid::now_v7().to_string();
                let process = Process {
                    id: id.clone(),
                    name: EDITED_PROCESS_NAME.to_owned(),
                    description: None,
                    project_id: None,
                    folder_id: None,
                    current_version_id: None,
                    version_count: 0,
                    created_at: Timestamp::now(),
                };
                state.processes.insert(id.clone(), StoredProcess::new(process));
                id
            }
        };

        let stored = state
            .processes
            .get_mut(&process_id)
            .ok_or_else(|| process_not_found(&process_id))?;

        let mut draft = Draft::from_document(&edited)?;
        draft.commit_message = Some(request.command.clone());
        draft.parent_version_id = request.model_version_id.clone();
        let version = stored.append(draft);

        Ok(EditResponse {
            bpmn: edited,
            version_id: version.id,
            changes,
        })
    }
}

#[cfg(test)]
mod tests {
    use processlab_core::bpmn::{Element, ElementType, SequenceFlow};

    use super::*;

    fn claims() -> BpmnDocument {
        let mut document = BpmnDocument::new("Process_Claims", Some("Claims".into()));
        document.elements = vec![
            Element::new("Start_1", ElementType::StartEvent).with_name("Start"),
            Element::new("Task_1", ElementType::Task).with_name("Review"),
            Element::new("End_1", ElementType::EndEvent).with_name("End"),
        ];
        document.flows = vec![
            SequenceFlow::new("Flow_1", "Start_1", "Task_1"),
            SequenceFlow::new("Flow_2", "Task_1", "End_1"),
        ];
        document
    }

    #[tokio::test]
    async fn test_create_version_numbers_and_activates() {
        let backend = MockBackend::new();
        backend.seed_process("proc-1", "Claims");

        let first = backend
            .create_version("proc-1", &CreateVersionRequest::new(claims()))
            .await
            .unwrap();
        let second = backend
            .create_version(
                "proc-1",
                &CreateVersionRequest::new(claims())
                    .with_commit_message("Second")
                    .with_parent(Some(first.id.clone())),
            )
            .await
            .unwrap();

        assert_eq!(first.version_number, 1);
        assert_eq!(second.version_number, 2);
        assert_eq!(second.version_label.as_deref(), Some("v2"));
        assert_eq!(second.etag, Some(claims().etag().unwrap()));

        let list = backend.list_versions("proc-1").await.unwrap();
        assert_eq!(list.total_count, 2);
        assert!(list.versions.iter().all(|v| !v.has_payload()));
        assert_eq!(list.versions.iter().filter(|v| v.is_active).count(), 1);

        let process = backend.process("proc-1").unwrap();
        assert_eq!(process.current_version_id, Some(second.id));
        assert_eq!(process.version_count, 2);
    }

    #[tokio::test]
    async fn test_create_version_rejects_stale_token() {
        let backend = MockBackend::new();
        backend.seed_process("proc-1", "Claims");
        let first = backend.seed_version("proc-1", &claims(), None).unwrap();

        let mut edited = claims();
        edited.elements[1].name = Some("Approve".into());
        backend.seed_version("proc-1", &edited, Some("Concurrent edit")).unwrap();

        let error = backend
            .create_version(
                "proc-1",
                &CreateVersionRequest::new(claims()).with_if_match(first.etag),
            )
            .await
            .unwrap_err();

        assert_eq!(error.kind, ErrorKind::Conflict);
        assert_eq!(error.message.as_deref(), Some(CONFLICT_MESSAGE));
        assert_eq!(backend.versions("proc-1").len(), 2);
    }

    #[tokio::test]
    async fn test_create_version_rejects_invalid_document() {
        let backend = MockBackend::new();
        backend.seed_process("proc-1", "Claims");

        let mut broken = claims();
        broken.flows.push(SequenceFlow::new("Flow_3", "Task_1", "Missing"));

        let error = backend
            .create_version("proc-1", &CreateVersionRequest::new(broken))
            .await
            .unwrap_err();
        assert_eq!(error.kind, ErrorKind::InvalidInput);

        let error = backend
            .create_version("proc-404", &CreateVersionRequest::new(claims()))
            .await
            .unwrap_err();
        assert_eq!(error.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_restore_appends_major_version() {
        let backend = MockBackend::new();
        backend.seed_process("proc-1", "Claims");
        let first = backend.seed_version("proc-1", &claims(), None).unwrap();
        let mut edited = claims();
        edited.elements.pop();
        edited.flows.pop();
        let second = backend.seed_version("proc-1", &edited, None).unwrap();

        let restored = backend
            .restore_version("proc-1", &RestoreVersionRequest::new(first.id.clone()))
            .await
            .unwrap();

        assert_eq!(restored.version_number, 3);
        assert_eq!(restored.change_type, ChangeType::Major);
        assert_eq!(restored.commit_message.as_deref(), Some("Restored to version 1"));
        assert_eq!(restored.parent_version_id, Some(second.id));
        assert_eq!(restored.bpmn_json, first.bpmn_json);
        assert!(restored.is_active);

        let error = backend
            .restore_version("proc-1", &RestoreVersionRequest::new("missing"))
            .await
            .unwrap_err();
        assert_eq!(error.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_edit_persists_new_version() {
        let backend = MockBackend::new();
        backend.seed_process("proc-1", "Claims");
        let base = backend.seed_version("proc-1", &claims(), None).unwrap();

        let request = EditRequest::from_document(claims(), "add user task called Approve")
            .with_version(Some(base.id.clone()), base.etag.clone());
        let response = backend.edit(&request).await.unwrap();

        assert_eq!(response.changes, vec!["Added user task 'Approve'".to_owned()]);
        assert!(response.bpmn.resolve_element("approve").is_some());

        let versions = backend.versions("proc-1");
        let created = versions.iter().find(|v| v.id == response.version_id).unwrap();
        assert_eq!(created.commit_message.as_deref(), Some("add user task called Approve"));
        assert_eq!(created.parent_version_id, Some(base.id));
        assert!(created.is_active);
    }

    #[tokio::test]
    async fn test_edit_rejects_stale_token_and_unknown_command() {
        let backend = MockBackend::new();

        let request = EditRequest::from_document(claims(), "rename Review to Approve")
            .with_version(None, Some("stale".into()));
        let error = backend.edit(&request).await.unwrap_err();
        assert_eq!(error.kind, ErrorKind::Conflict);

        let request = EditRequest::from_document(claims(), "make it better");
        let error = backend.edit(&request).await.unwrap_err();
        assert_eq!(error.kind, ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_edit_without_version_creates_process() {
        let backend = MockBackend::new();
        let xml = bpmn::to_xml(&claims()).unwrap();

        let response = backend
            .edit(&EditRequest::from_xml(xml, "remove Review"))
            .await
            .unwrap();

        assert!(response.bpmn.element("Task_1").is_none());
        let state = backend.lock();
        let (_, stored) = state.processes.iter().next().unwrap();
        assert_eq!(stored.process.name, EDITED_PROCESS_NAME);
        assert_eq!(stored.versions.len(), 1);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let backend = MockBackend::new();
        backend.seed_process("proc-1", "Claims");

        backend.fail_next(ErrorKind::ServerError);
        let error = backend.list_versions("proc-1").await.unwrap_err();
        assert_eq!(error.kind, ErrorKind::ServerError);
        assert!(backend.list_versions("proc-1").await.is_ok());

        backend.set_offline(true);
        let error = backend.list_versions("proc-1").await.unwrap_err();
        assert_eq!(error.kind, ErrorKind::NetworkError);
        backend.set_offline(false);

        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn test_services_share_state() {
        let backend = MockBackend::new();
        backend.seed_process("proc-1", "Claims");
        let services = backend.clone().into_services();

        services
            .versions
            .create_version("proc-1", &CreateVersionRequest::new(claims()))
            .await
            .unwrap();

        assert_eq!(backend.versions("proc-1").len(), 1);
    }
}
