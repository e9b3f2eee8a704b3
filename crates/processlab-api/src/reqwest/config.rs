//! Reqwest client configuration.

use std::time::Duration;

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result};

/// Default timeout for HTTP requests: 30 seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default API base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Configuration for the ProcessLab REST client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct ReqwestConfig {
    /// Base URL of the ProcessLab API (without the `/api/v1` suffix)
    #[cfg_attr(
        feature = "config",
        arg(long = "api-url", env = "PROCESSLAB_API_URL", default_value = DEFAULT_API_URL)
    )]
    #[serde(default = "default_api_url")]
    pub api_url: Url,

    /// HTTP request timeout in seconds
    #[cfg_attr(
        feature = "config",
        arg(long = "http-timeout", env = "HTTP_TIMEOUT", default_value = "30")
    )]
    #[serde(default = "default_timeout_secs")]
    pub http_timeout: u64,

    /// User-Agent header to send with requests
    #[cfg_attr(
        feature = "config",
        arg(long = "http-user-agent", env = "HTTP_USER_AGENT")
    )]
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Bearer token sent with every request
    #[cfg_attr(
        feature = "config",
        arg(long = "api-token", env = "PROCESSLAB_API_TOKEN", hide_env_values = true)
    )]
    #[serde(default)]
    pub api_token: Option<String>,
}

fn default_api_url() -> Url {
    Url::parse(DEFAULT_API_URL).expect("default API URL is valid")
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for ReqwestConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            http_timeout: default_timeout_secs(),
            user_agent: None,
            api_token: None,
        }
    }
}

impl ReqwestConfig {
    /// Create a new configuration for the given API base URL.
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            ..Default::default()
        }
    }

    /// Returns the timeout as a Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout)
    }

    /// Returns the effective timeout, using default if zero.
    pub fn effective_timeout(&self) -> Duration {
        if self.http_timeout == 0 {
            Duration::from_secs(DEFAULT_TIMEOUT_SECS)
        } else {
            Duration::from_secs(self.http_timeout)
        }
    }

    /// Returns the effective user agent, using default if not set.
    pub fn effective_user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(Self::default_user_agent)
    }

    /// Returns the default user agent string.
    fn default_user_agent() -> String {
        format!("processlab/{}", env!("CARGO_PKG_VERSION"))
    }

    /// Checks that the base URL can carry API paths.
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.api_url.scheme(), "http" | "https") {
            return Err(Error::configuration().with_message(format!(
                "API URL must use http or https, got '{}'",
                self.api_url.scheme()
            )));
        }
        if self.api_url.cannot_be_a_base() {
            return Err(Error::configuration()
                .with_message(format!("API URL '{}' cannot be used as a base", self.api_url)));
        }
        Ok(())
    }

    /// Set the timeout in seconds.
    #[must_use]
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.http_timeout = timeout_secs;
        self
    }

    /// Set the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Set the bearer token.
    #[must_use]
    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ReqwestConfig::default();
        assert_eq!(config.api_url.as_str(), "http://localhost:8000/");
        assert_eq!(config.http_timeout, 30);
        assert!(config.user_agent.is_none());
        assert!(config.api_token.is_none());
        assert_eq!(config.timeout(), Duration::from_secs(30));
        config.validate().unwrap();
    }

    #[test]
    fn test_builder_pattern() {
        let config = ReqwestConfig::default()
            .with_timeout(120)
            .with_user_agent("custom-agent/1.0")
            .with_api_token("secret");

        assert_eq!(config.http_timeout, 120);
        assert_eq!(config.user_agent, Some("custom-agent/1.0".to_string()));
        assert_eq!(config.api_token, Some("secret".to_string()));
    }

    #[test]
    fn test_effective_timeout_uses_default_when_zero() {
        let config = ReqwestConfig::default().with_timeout(0);
        assert_eq!(
            config.effective_timeout(),
            Duration::from_secs(DEFAULT_TIMEOUT_SECS)
        );
    }

    #[test]
    fn test_effective_user_agent_uses_default_when_none() {
        let config = ReqwestConfig::default();
        assert!(config.effective_user_agent().starts_with("processlab/"));
    }

    #[test]
    fn test_validate_rejects_non_http_urls() {
        let config = ReqwestConfig::new(Url::parse("ftp://example.com").unwrap());
        assert!(config.validate().is_err());

        let config = ReqwestConfig::new(Url::parse("mailto:team@example.com").unwrap());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: ReqwestConfig =
            serde_json::from_value(serde_json::json!({ "api_url": "https://api.example.com" }))
                .unwrap();

        assert_eq!(config.api_url.host_str(), Some("api.example.com"));
        assert_eq!(config.http_timeout, DEFAULT_TIMEOUT_SECS);
    }
}
