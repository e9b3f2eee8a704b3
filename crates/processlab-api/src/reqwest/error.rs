//! Error types for the reqwest-based API client.

use thiserror::Error;

/// Result type alias for reqwest operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for reqwest operations.
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Reqwest(#[from] reqwest::Error),
    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// The API answered with a non-success status.
    #[error("API returned status {status}")]
    Status {
        status: u16,
        detail: Option<String>,
    },
    /// The configured base URL cannot carry API paths.
    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),
}

impl Error {
    /// Extracts the server's explanation from an error body.
    ///
    /// Accepts `{"detail": "..."}`, `{"detail": [{"msg": "..."}]}` and
    /// `{"message": "..."}`; anything else yields `None`.
    pub fn detail_from_body(body: &str) -> Option<String> {
        let value: serde_json::Value = serde_json::from_str(body).ok()?;
        match value.get("detail") {
            Some(serde_json::Value::String(detail)) => return Some(detail.clone()),
            Some(serde_json::Value::Array(items)) => {
                let messages: Vec<&str> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                    .collect();
                if !messages.is_empty() {
                    return Some(messages.join("; "));
                }
            }
            _ => {}
        }
        value
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_owned)
    }
}

impl From<Error> for crate::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Reqwest(e) => {
                if e.is_timeout() {
                    crate::Error::timeout()
                        .with_message(e.to_string())
                        .with_source(e)
                } else if e.is_connect() {
                    crate::Error::network_error()
                        .with_message("Connection failed")
                        .with_source(e)
                } else if e.is_decode() {
                    crate::Error::serialization()
                        .with_message(e.to_string())
                        .with_source(e)
                } else {
                    crate::Error::network_error()
                        .with_message(e.to_string())
                        .with_source(e)
                }
            }
            Error::Serde(e) => crate::Error::serialization()
                .with_message(e.to_string())
                .with_source(e),
            Error::Status { status, detail } => {
                let error = match status {
                    404 => crate::Error::not_found(),
                    409 | 412 => crate::Error::conflict(),
                    400 | 422 => crate::Error::invalid_input(),
                    408 => crate::Error::timeout(),
                    500..=599 => crate::Error::server_error(),
                    _ => crate::Error::new(crate::ErrorKind::Unknown),
                };
                error.with_message(detail.unwrap_or_else(|| format!("API returned status {status}")))
            }
            Error::InvalidUrl(url) => crate::Error::configuration()
                .with_message(format!("API URL '{url}' cannot be used as a base")),
        }
    }
}
