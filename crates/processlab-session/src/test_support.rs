//! Fixtures shared by the unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use processlab_api::mock::MockBackend;
use processlab_api::{
    CreateProcessRequest, CreateVersionRequest, Error, Process, RestoreVersionRequest, Result,
    Version, VersionList, VersionProvider, VersionService,
};
use processlab_core::bpmn::{BpmnDocument, Element, ElementType, Lane, SequenceFlow};
use tokio::sync::Notify;

use crate::{SessionContext, VersionStore};

pub const PROCESS_ID: &str = "proc-claims";

pub fn version_id(number: u32) -> String {
    format!("{PROCESS_ID}-v{number}")
}

pub fn claims_document() -> BpmnDocument {
    let mut document = BpmnDocument::new("Process_Claims", Some("Claims".into()));
    document.lanes = vec![Lane {
        id: "Lane_1".into(),
        name: Some("Clerk".into()),
        child_element_ids: vec!["Task_1".into()],
    }];
    document.elements = vec![
        Element::new("Start_1", ElementType::StartEvent).with_name("Received"),
        Element::new("Task_1", ElementType::UserTask)
            .with_name("Review")
            .with_lane("Lane_1"),
        Element::new("End_1", ElementType::EndEvent).with_name("Done"),
    ];
    document.flows = vec![
        SequenceFlow::new("Flow_1", "Start_1", "Task_1"),
        SequenceFlow::new("Flow_2", "Task_1", "End_1"),
    ];
    document
}

/// Claims document at revision `n`: the review task is renamed each time.
pub fn claims_revision(n: u32) -> BpmnDocument {
    let mut document = claims_document();
    if n > 1 {
        document.elements[1].name = Some(format!("Review (rev {n})"));
    }
    document
}

/// Backend holding the claims process at v3 (active), v2 and v1.
pub fn seeded_backend() -> MockBackend {
    let backend = MockBackend::new();
    backend.seed_process(PROCESS_ID, "Claims");
    for n in 1..=3 {
        backend
            .seed_version(PROCESS_ID, &claims_revision(n), Some(&format!("Revision {n}")))
            .unwrap();
    }
    backend
}

pub fn store_with<P>(provider: P) -> VersionStore
where
    P: VersionProvider + 'static,
{
    VersionStore::new(
        SessionContext::new().with_actor("tester").with_project("proj-1"),
        VersionService::new(provider),
    )
}

/// Provider that can fail listings and hold one request until released.
#[derive(Clone)]
pub struct ScriptedProvider {
    inner: MockBackend,
    pub fail_lists: Arc<AtomicBool>,
    held: Option<String>,
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl ScriptedProvider {
    pub fn new(inner: MockBackend) -> Self {
        Self {
            inner,
            fail_lists: Arc::new(AtomicBool::new(false)),
            held: None,
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }

    /// Holds requests for `id` (a process id for listings, a version id for fetches).
    pub fn hold(mut self, id: impl Into<String>) -> Self {
        self.held = Some(id.into());
        self
    }

    async fn maybe_hold(&self, id: &str) {
        if self.held.as_deref() == Some(id) {
            self.entered.notify_one();
            self.release.notified().await;
        }
    }
}

#[async_trait::async_trait]
impl VersionProvider for ScriptedProvider {
    async fn list_versions(&self, process_id: &str) -> Result<VersionList> {
        self.maybe_hold(process_id).await;
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(Error::network_error().with_message("Connection reset"));
        }
        self.inner.list_versions(process_id).await
    }

    async fn get_version(&self, process_id: &str, version_id: &str) -> Result<Version> {
        self.maybe_hold(version_id).await;
        self.inner.get_version(process_id, version_id).await
    }

    async fn create_version(
        &self,
        process_id: &str,
        request: &CreateVersionRequest,
    ) -> Result<Version> {
        self.inner.create_version(process_id, request).await
    }

    async fn restore_version(
        &self,
        process_id: &str,
        request: &RestoreVersionRequest,
    ) -> Result<Version> {
        self.inner.restore_version(process_id, request).await
    }

    async fn create_process(&self, request: &CreateProcessRequest) -> Result<Process> {
        self.inner.create_process(request).await
    }
}
