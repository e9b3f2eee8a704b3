//! Reqwest-based HTTP client for the ProcessLab REST API.
//!
//! This module provides a reqwest-based implementation of the
//! [`VersionProvider`] and [`EditProvider`] traits.
//!
//! # Example
//!
//! ```rust,ignore
//! use processlab_api::reqwest::{ReqwestClient, ReqwestConfig};
//! use processlab_api::ApiServices;
//!
//! // Create a client with default configuration
//! let client = ReqwestClient::new(ReqwestConfig::default())?;
//!
//! // Convert to services for dependency injection
//! let services: ApiServices = client.into_services();
//! ```
//!
//! [`VersionProvider`]: crate::VersionProvider
//! [`EditProvider`]: crate::EditProvider

mod client;
mod config;
mod error;

pub use client::ReqwestClient;
pub use config::{DEFAULT_API_URL, DEFAULT_TIMEOUT_SECS, ReqwestConfig};
pub use error::{Error, Result};

/// Tracing target for reqwest client operations.
pub const TRACING_TARGET: &str = "processlab_api::reqwest";
