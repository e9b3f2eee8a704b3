//! Reqwest-based HTTP client for the ProcessLab REST API.

use std::sync::Arc;

use reqwest::header::{ETAG, IF_MATCH};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use url::Url;

use super::{Error, ReqwestConfig, TRACING_TARGET};
use crate::{
    ApiServices, CreateProcessRequest, CreateVersionRequest, EditProvider, EditRequest,
    EditResponse, EditService, Process, RestoreVersionRequest, Version, VersionList,
    VersionProvider, VersionService,
};

/// Inner client that holds the HTTP client and configuration.
struct ReqwestClientInner {
    http: Client,
    config: ReqwestConfig,
}

/// Reqwest-based client for the ProcessLab REST API.
///
/// Implements both [`VersionProvider`] and [`EditProvider`] against endpoints
/// rooted at `{api_url}/api/v1`.
///
/// # Examples
///
/// ```rust,ignore
/// use processlab_api::reqwest::{ReqwestClient, ReqwestConfig};
///
/// let client = ReqwestClient::new(ReqwestConfig::default())?;
/// let services = client.into_services();
/// let list = services.versions.list_versions("proc-1").await?;
/// ```
#[derive(Clone)]
pub struct ReqwestClient {
    inner: Arc<ReqwestClientInner>,
}

impl std::fmt::Debug for ReqwestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestClient")
            .field("api_url", &self.inner.config.api_url.as_str())
            .field("http_timeout", &self.inner.config.http_timeout)
            .finish_non_exhaustive()
    }
}

impl ReqwestClient {
    /// Creates a new client with the given configuration.
    pub fn new(config: ReqwestConfig) -> crate::Result<Self> {
        config.validate()?;

        let timeout = config.effective_timeout();
        let user_agent = config.effective_user_agent();

        tracing::debug!(
            target: TRACING_TARGET,
            api_url = %config.api_url,
            timeout_ms = timeout.as_millis(),
            "Creating reqwest client"
        );

        let http = Client::builder()
            .timeout(timeout)
            .user_agent(&user_agent)
            .build()
            .map_err(|e| {
                crate::Error::configuration()
                    .with_message("Failed to create HTTP client")
                    .with_source(e)
            })?;

        let inner = ReqwestClientInner { http, config };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Gets the client configuration.
    pub fn config(&self) -> &ReqwestConfig {
        &self.inner.config
    }

    /// Converts this client into the services a session depends on.
    pub fn into_services(self) -> ApiServices {
        ApiServices::new(VersionService::new(self.clone()), EditService::new(self))
    }

    /// Builds `{api_url}/api/v1/{segments...}` with each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.inner.config.api_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(self.inner.config.api_url.to_string()))?
            .pop_if_empty()
            .extend(["api", "v1"])
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.inner.config.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Sends a request and decodes a JSON body, mapping non-success statuses.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> crate::Result<T> {
        let (value, _) = self.send_with_etag(request).await?;
        Ok(value)
    }

    /// Like [`Self::send`], also returning the `ETag` response header.
    async fn send_with_etag<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> crate::Result<(T, Option<String>)> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(Error::from)?;

        let status = response.status();
        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim_start_matches("W/").trim_matches('"').to_owned());
        let body = response.text().await.map_err(Error::from)?;

        if !status.is_success() {
            tracing::debug!(
                target: TRACING_TARGET,
                status = status.as_u16(),
                "API returned an error status"
            );
            return Err(Error::Status {
                status: status.as_u16(),
                detail: Error::detail_from_body(&body),
            }
            .into());
        }

        let value = serde_json::from_str(&body).map_err(Error::from)?;
        Ok((value, etag))
    }
}

#[async_trait::async_trait]
impl VersionProvider for ReqwestClient {
    async fn list_versions(&self, process_id: &str) -> crate::Result<VersionList> {
        let url = self.endpoint(&["processes", process_id, "versions"])?;
        self.send(self.inner.http.get(url)).await
    }

    async fn get_version(&self, process_id: &str, version_id: &str) -> crate::Result<Version> {
        let url = self.endpoint(&["processes", process_id, "versions", version_id])?;
        let (mut version, etag): (Version, _) =
            self.send_with_etag(self.inner.http.get(url)).await?;
        if version.etag.is_none() {
            version.etag = etag;
        }
        Ok(version)
    }

    async fn create_version(
        &self,
        process_id: &str,
        request: &CreateVersionRequest,
    ) -> crate::Result<Version> {
        let url = self.endpoint(&["processes", process_id, "versions"])?;
        let mut http_request = self.inner.http.post(url).json(request);
        if let Some(etag) = &request.if_match {
            http_request = http_request.header(IF_MATCH, etag.as_str());
        }

        let (mut version, etag): (Version, _) = self.send_with_etag(http_request).await?;
        if version.etag.is_none() {
            version.etag = etag;
        }
        Ok(version)
    }

    async fn restore_version(
        &self,
        process_id: &str,
        request: &RestoreVersionRequest,
    ) -> crate::Result<Version> {
        let url = self.endpoint(&["processes", process_id, "versions", "restore"])?;
        self.send(self.inner.http.post(url).json(request)).await
    }

    async fn create_process(&self, request: &CreateProcessRequest) -> crate::Result<Process> {
        let url = self.endpoint(&["processes"])?;
        self.send(self.inner.http.post(url).json(request)).await
    }
}

#[async_trait::async_trait]
impl EditProvider for ReqwestClient {
    async fn edit(&self, request: &EditRequest) -> crate::Result<EditResponse> {
        let url = self.endpoint(&["edit"])?;
        self.send(self.inner.http.post(url).json(request)).await
    }
}
