#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod service;

pub mod request;
pub mod response;

#[cfg(feature = "reqwest")]
#[cfg_attr(docsrs, doc(cfg(feature = "reqwest")))]
pub mod reqwest;

#[cfg(feature = "test-utils")]
#[cfg_attr(docsrs, doc(cfg(feature = "test-utils")))]
pub mod mock;

pub use processlab_core::{Error, ErrorKind, Process, Result, Version};
pub use request::{CreateProcessRequest, CreateVersionRequest, EditRequest, RestoreVersionRequest};
pub use response::{EditResponse, VersionList};
pub use service::{ApiServices, EditService, VersionService};

/// Tracing target for API operations.
pub const TRACING_TARGET: &str = "processlab_api";

/// Remote store of processes and their version history.
///
/// Implement this trait to back a session with a different transport.
#[async_trait::async_trait]
pub trait VersionProvider: Send + Sync {
    /// Lists all versions of a process, without payloads.
    async fn list_versions(&self, process_id: &str) -> Result<VersionList>;

    /// Fetches one version with its payload and concurrency token.
    async fn get_version(&self, process_id: &str, version_id: &str) -> Result<Version>;

    /// Persists a new version.
    async fn create_version(
        &self,
        process_id: &str,
        request: &CreateVersionRequest,
    ) -> Result<Version>;

    /// Appends a new version duplicating an existing one.
    async fn restore_version(
        &self,
        process_id: &str,
        request: &RestoreVersionRequest,
    ) -> Result<Version>;

    /// Creates a process without any version.
    async fn create_process(&self, request: &CreateProcessRequest) -> Result<Process>;
}

/// External service applying natural-language edits to a document.
#[async_trait::async_trait]
pub trait EditProvider: Send + Sync {
    /// Applies `request.command` and persists the result as a new version.
    async fn edit(&self, request: &EditRequest) -> Result<EditResponse>;
}
