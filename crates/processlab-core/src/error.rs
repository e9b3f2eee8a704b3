//! Structured error handling shared by every ProcessLab crate.

use strum::{AsRefStr, Display, EnumString, IntoStaticStr};
use thiserror::Error;

/// Type alias for boxed dynamic errors that can be sent across threads.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Type alias for Results with our custom Error type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Categories of errors that can occur while loading, editing or saving processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[derive(AsRefStr, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// No response from the API (connection refused, DNS, TLS).
    NetworkError,
    /// The request did not complete within the configured timeout.
    Timeout,
    /// The process or version no longer exists.
    NotFound,
    /// The document or request was rejected as malformed.
    InvalidInput,
    /// The concurrency token no longer matches the stored version.
    Conflict,
    /// The API failed while handling a well-formed request.
    ServerError,
    /// A payload could not be encoded or decoded.
    Serialization,
    /// A payload could not be converted between JSON and XML.
    Conversion,
    /// The operation is not allowed in the current session state.
    InvalidState,
    /// Configuration error.
    Configuration,
    /// Unknown error occurred.
    #[default]
    Unknown,
}

impl ErrorKind {
    /// Check if this error kind is typically retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkError | Self::Timeout | Self::ServerError)
    }
}

/// Structured error type with classification and context tracking.
#[must_use]
#[derive(Debug, Error)]
#[error("[{kind}]{}", message.as_ref().map(|m| format!(": {m}")).unwrap_or_default())]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Primary error message.
    pub message: Option<String>,
    /// Underlying source error, if any.
    #[source]
    pub source: Option<BoxedError>,
}

impl Error {
    /// Creates a new error with the given kind.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
        }
    }

    /// Creates a new error from a source error.
    pub fn from_source(kind: ErrorKind, source: impl Into<BoxedError>) -> Self {
        Self {
            kind,
            message: None,
            source: Some(source.into()),
        }
    }

    /// Adds a message to this error.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Sets the source of the error.
    pub fn with_source(mut self, source: impl Into<BoxedError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Creates a new network error.
    pub fn network_error() -> Self {
        Self::new(ErrorKind::NetworkError)
    }

    /// Creates a new timeout error.
    pub fn timeout() -> Self {
        Self::new(ErrorKind::Timeout)
    }

    /// Creates a new not found error.
    pub fn not_found() -> Self {
        Self::new(ErrorKind::NotFound)
    }

    /// Creates a new invalid input error.
    pub fn invalid_input() -> Self {
        Self::new(ErrorKind::InvalidInput)
    }

    /// Creates a new conflict error.
    pub fn conflict() -> Self {
        Self::new(ErrorKind::Conflict)
    }

    /// Creates a new server error.
    pub fn server_error() -> Self {
        Self::new(ErrorKind::ServerError)
    }

    /// Creates a new serialization error.
    pub fn serialization() -> Self {
        Self::new(ErrorKind::Serialization)
    }

    /// Creates a new conversion error.
    pub fn conversion() -> Self {
        Self::new(ErrorKind::Conversion)
    }

    /// Creates a new invalid state error.
    pub fn invalid_state() -> Self {
        Self::new(ErrorKind::InvalidState)
    }

    /// Creates a new configuration error.
    pub fn configuration() -> Self {
        Self::new(ErrorKind::Configuration)
    }

    /// Returns the error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Check if this error is retryable based on its kind.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Returns a human-readable message suitable for showing to the user.
    ///
    /// Network, not-found, validation and conflict failures produce
    /// distinguishable messages; everything else falls back to a generic one.
    pub fn user_message(&self) -> String {
        let detail = self.message.as_deref().unwrap_or_default();
        match self.kind {
            ErrorKind::NetworkError | ErrorKind::Timeout => {
                "Unable to reach the server. Check your connection and try again.".to_owned()
            }
            ErrorKind::NotFound => {
                "The process or version no longer exists. It may have been deleted.".to_owned()
            }
            ErrorKind::InvalidInput if !detail.is_empty() => {
                format!("The document was rejected: {detail}")
            }
            ErrorKind::InvalidInput => "The document was rejected as invalid.".to_owned(),
            ErrorKind::Conflict => {
                "The process changed since you loaded it. Reload to see the latest version."
                    .to_owned()
            }
            ErrorKind::Conversion => {
                "The diagram could not be converted between JSON and XML.".to_owned()
            }
            ErrorKind::InvalidState if !detail.is_empty() => detail.to_owned(),
            _ => "Something went wrong. Please try again.".to_owned(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::from_source(ErrorKind::Serialization, error).with_message("Invalid JSON payload")
    }
}

impl From<quick_xml::Error> for Error {
    fn from(error: quick_xml::Error) -> Self {
        Self::from_source(ErrorKind::Conversion, error).with_message("Malformed BPMN XML")
    }
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(error: quick_xml::events::attributes::AttrError) -> Self {
        Self::from_source(ErrorKind::Conversion, error).with_message("Malformed BPMN XML attribute")
    }
}

impl From<std::fmt::Error> for Error {
    fn from(error: std::fmt::Error) -> Self {
        Self::from_source(ErrorKind::Serialization, error).with_message("Failed to write XML")
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(error: std::str::Utf8Error) -> Self {
        Self::from_source(ErrorKind::Serialization, error).with_message("Invalid UTF-8 encoding")
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_error_builder_pattern() {
        let error = Error::not_found().with_message("version v9");

        assert_eq!(error.kind, ErrorKind::NotFound);
        assert_eq!(error.message.as_deref(), Some("version v9"));
        assert!(error.source.is_none());
    }

    #[test]
    fn test_error_display() {
        let error = Error::conflict().with_message("stale token");

        let display_str = error.to_string();
        assert!(display_str.contains("conflict"));
        assert!(display_str.contains("stale token"));
    }

    #[test]
    fn test_user_messages_are_distinguishable() {
        let network = Error::network_error().user_message();
        let not_found = Error::not_found().user_message();
        let invalid = Error::invalid_input().with_message("flow Flow_1").user_message();
        let conflict = Error::conflict().user_message();
        let server = Error::server_error().user_message();

        let all = [&network, &not_found, &invalid, &conflict, &server];
        for (i, a) in all.iter().enumerate() {
            for b in all.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
        assert!(invalid.contains("flow Flow_1"));
        assert_eq!(Error::timeout().user_message(), network);
    }

    #[test]
    fn test_retryable() {
        assert!(ErrorKind::NetworkError.is_retryable());
        assert!(ErrorKind::Timeout.is_retryable());
        assert!(ErrorKind::ServerError.is_retryable());

        assert!(!ErrorKind::InvalidInput.is_retryable());
        assert!(!ErrorKind::Conflict.is_retryable());
        assert!(!ErrorKind::NotFound.is_retryable());
    }

    #[test]
    fn test_from_str() {
        assert_eq!(
            ErrorKind::from_str("not_found").unwrap(),
            ErrorKind::NotFound
        );
        assert_eq!(
            ErrorKind::from_str("invalid_state").unwrap(),
            ErrorKind::InvalidState
        );
        assert!(ErrorKind::from_str("invalid").is_err());
    }

    #[test]
    fn test_from_json_error() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error = Error::from(source);

        assert_eq!(error.kind, ErrorKind::Serialization);
        assert!(error.source.is_some());
    }
}
