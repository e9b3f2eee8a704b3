//! Service wrappers with observability.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::{
    CreateProcessRequest, CreateVersionRequest, EditProvider, EditRequest, EditResponse, Process,
    RestoreVersionRequest, Result, TRACING_TARGET, Version, VersionList, VersionProvider,
};

/// Version store wrapper with observability.
///
/// This wrapper adds structured logging to any [`VersionProvider`].
/// The inner provider is wrapped in `Arc` for cheap cloning.
#[derive(Clone)]
pub struct VersionService {
    inner: Arc<dyn VersionProvider>,
}

impl fmt::Debug for VersionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionService").finish_non_exhaustive()
    }
}

impl VersionService {
    /// Create a new version service wrapper.
    pub fn new<P>(provider: P) -> Self
    where
        P: VersionProvider + 'static,
    {
        Self {
            inner: Arc::new(provider),
        }
    }

    /// Lists all versions of a process, without payloads.
    pub async fn list_versions(&self, process_id: &str) -> Result<VersionList> {
        let started_at = Instant::now();
        tracing::debug!(target: TRACING_TARGET, process_id, "Listing versions");

        let result = self.inner.list_versions(process_id).await;
        let elapsed_ms = started_at.elapsed().as_millis();

        match &result {
            Ok(list) => tracing::debug!(
                target: TRACING_TARGET,
                process_id,
                versions = list.versions.len(),
                elapsed_ms,
                "Versions listed"
            ),
            Err(error) => tracing::error!(
                target: TRACING_TARGET,
                process_id,
                error = %error,
                elapsed_ms,
                "Failed to list versions"
            ),
        }

        result
    }

    /// Fetches one version with its payload and concurrency token.
    pub async fn get_version(&self, process_id: &str, version_id: &str) -> Result<Version> {
        let started_at = Instant::now();
        tracing::debug!(target: TRACING_TARGET, process_id, version_id, "Fetching version");

        let result = self.inner.get_version(process_id, version_id).await;
        let elapsed_ms = started_at.elapsed().as_millis();

        match &result {
            Ok(version) => tracing::debug!(
                target: TRACING_TARGET,
                process_id,
                version_id,
                version_number = version.version_number,
                has_json = version.bpmn_json.is_some(),
                has_xml = version.xml.is_some(),
                elapsed_ms,
                "Version fetched"
            ),
            Err(error) => tracing::error!(
                target: TRACING_TARGET,
                process_id,
                version_id,
                error = %error,
                elapsed_ms,
                "Failed to fetch version"
            ),
        }

        result
    }

    /// Persists a new version.
    pub async fn create_version(
        &self,
        process_id: &str,
        request: &CreateVersionRequest,
    ) -> Result<Version> {
        let started_at = Instant::now();
        tracing::debug!(
            target: TRACING_TARGET,
            process_id,
            change_type = %request.change_type,
            parent_version_id = ?request.parent_version_id,
            has_if_match = request.if_match.is_some(),
            "Creating version"
        );

        let result = self.inner.create_version(process_id, request).await;
        let elapsed_ms = started_at.elapsed().as_millis();

        match &result {
            Ok(version) => tracing::info!(
                target: TRACING_TARGET,
                process_id,
                version_id = %version.id,
                version_number = version.version_number,
                elapsed_ms,
                "Version created"
            ),
            Err(error) => tracing::error!(
                target: TRACING_TARGET,
                process_id,
                error = %error,
                elapsed_ms,
                "Failed to create version"
            ),
        }

        result
    }

    /// Appends a new version duplicating an existing one.
    pub async fn restore_version(
        &self,
        process_id: &str,
        request: &RestoreVersionRequest,
    ) -> Result<Version> {
        let started_at = Instant::now();
        tracing::debug!(
            target: TRACING_TARGET,
            process_id,
            version_id = %request.version_id,
            "Restoring version"
        );

        let result = self.inner.restore_version(process_id, request).await;
        let elapsed_ms = started_at.elapsed().as_millis();

        match &result {
            Ok(version) => tracing::info!(
                target: TRACING_TARGET,
                process_id,
                restored_from = %request.version_id,
                version_id = %version.id,
                version_number = version.version_number,
                elapsed_ms,
                "Version restored"
            ),
            Err(error) => tracing::error!(
                target: TRACING_TARGET,
                process_id,
                version_id = %request.version_id,
                error = %error,
                elapsed_ms,
                "Failed to restore version"
            ),
        }

        result
    }

    /// Creates a process without any version.
    pub async fn create_process(&self, request: &CreateProcessRequest) -> Result<Process> {
        let started_at = Instant::now();
        tracing::debug!(target: TRACING_TARGET, name = %request.name, "Creating process");

        let result = self.inner.create_process(request).await;
        let elapsed_ms = started_at.elapsed().as_millis();

        match &result {
            Ok(process) => tracing::info!(
                target: TRACING_TARGET,
                process_id = %process.id,
                name = %process.name,
                elapsed_ms,
                "Process created"
            ),
            Err(error) => tracing::error!(
                target: TRACING_TARGET,
                name = %request.name,
                error = %error,
                elapsed_ms,
                "Failed to create process"
            ),
        }

        result
    }
}

/// Edit service wrapper with observability.
#[derive(Clone)]
pub struct EditService {
    inner: Arc<dyn EditProvider>,
}

impl fmt::Debug for EditService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditService").finish_non_exhaustive()
    }
}

impl EditService {
    /// Create a new edit service wrapper.
    pub fn new<P>(provider: P) -> Self
    where
        P: EditProvider + 'static,
    {
        Self {
            inner: Arc::new(provider),
        }
    }

    /// Applies a natural-language edit.
    pub async fn edit(&self, request: &EditRequest) -> Result<EditResponse> {
        let started_at = Instant::now();
        tracing::debug!(
            target: TRACING_TARGET,
            model_version_id = ?request.model_version_id,
            has_json = request.bpmn.is_some(),
            command_len = request.command.len(),
            "Requesting edit"
        );

        let result = self.inner.edit(request).await;
        let elapsed_ms = started_at.elapsed().as_millis();

        match &result {
            Ok(response) => tracing::info!(
                target: TRACING_TARGET,
                version_id = %response.version_id,
                changes = response.changes.len(),
                elapsed_ms,
                "Edit applied"
            ),
            Err(error) => tracing::error!(
                target: TRACING_TARGET,
                error = %error,
                elapsed_ms,
                "Edit failed"
            ),
        }

        result
    }
}

/// Container for the API services a session depends on.
#[derive(Debug, Clone)]
pub struct ApiServices {
    /// Version history store.
    pub versions: VersionService,
    /// Natural-language edit service.
    pub edits: EditService,
}

impl ApiServices {
    /// Creates a new services container.
    pub fn new(versions: VersionService, edits: EditService) -> Self {
        Self { versions, edits }
    }
}
