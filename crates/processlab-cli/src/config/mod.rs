//! CLI configuration management.
//!
//! This module defines the complete CLI configuration hierarchy:
//!
//! ```text
//! Cli
//! ├── api: ReqwestConfig       # API base URL, timeout, user agent, token
//! ├── session: SessionConfig   # Actor, workspace, project, folder
//! ├── logging: LogConfig       # Log line format
//! └── command: Command         # Subcommand to run
//! ```
//!
//! All configuration can be provided via CLI arguments or environment variables.
//! Use `--help` to see all available options.
//!
//! # Example
//!
//! ```bash
//! processlab --api-url https://processlab.example.com versions 6f1c...
//!
//! # Or via environment variables
//! PROCESSLAB_API_URL=https://processlab.example.com processlab versions 6f1c...
//! ```

mod logging;
mod provider;
mod session;

use std::process;

use anyhow::Context;
use clap::Parser;
pub use logging::{DEFAULT_LOG_FILTER, LogConfig, LogFormat};
use processlab_api::reqwest::ReqwestConfig;
pub use provider::create_services;
pub use session::SessionConfig;

use crate::command::Command;
use crate::{TRACING_TARGET_CONFIG, TRACING_TARGET_STARTUP};

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "processlab")]
#[command(about = "Inspect, edit and version ProcessLab BPMN processes")]
#[command(version)]
pub struct Cli {
    /// ProcessLab API connection.
    #[clap(flatten)]
    pub api: ReqwestConfig,

    /// Session identity and placement.
    #[clap(flatten)]
    pub session: SessionConfig,

    /// Log output.
    #[clap(flatten)]
    pub logging: LogConfig,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Loads environment variables from .env file (if enabled) and parses CLI arguments.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    /// Loads environment variables from .env file if the dotenv feature is enabled.
    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    /// No-op when dotenv feature is disabled.
    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Validates all configuration values.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.command.is_offline() {
            return Ok(());
        }

        self.api
            .validate()
            .context("invalid API configuration")?;
        Ok(())
    }

    /// Logs configuration at debug level (no sensitive information).
    pub fn log(&self) {
        tracing::debug!(
            target: TRACING_TARGET_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            arch = std::env::consts::ARCH,
            os = std::env::consts::OS,
            features = ?Self::enabled_features(),
            "Build information"
        );

        tracing::debug!(
            target: TRACING_TARGET_CONFIG,
            api_url = %self.api.api_url,
            http_timeout_secs = self.api.http_timeout,
            has_api_token = self.api.api_token.is_some(),
            actor = ?self.session.actor,
            project_id = ?self.session.project_id,
            log_format = ?self.logging.log_format,
            "Configuration"
        );
    }

    /// Returns a list of enabled compile-time features.
    fn enabled_features() -> Vec<&'static str> {
        [cfg!(feature = "dotenv").then_some("dotenv")]
            .into_iter()
            .flatten()
            .collect()
    }
}
