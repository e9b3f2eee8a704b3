//! Log output configuration.

use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Default filter when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Format of log lines written to stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, colored output.
    #[default]
    Human,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Args, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log line format
    #[arg(long = "log-format", env = "PROCESSLAB_LOG_FORMAT", value_enum, default_value_t = LogFormat::Human)]
    pub log_format: LogFormat,
}

impl LogConfig {
    /// Installs the global tracing subscriber.
    ///
    /// The filter is read from `RUST_LOG`, defaulting to `warn` so command
    /// output stays readable.
    pub fn init_tracing(&self) -> anyhow::Result<()> {
        let filter = create_env_filter()?;
        let registry = tracing_subscriber::registry().with(filter);

        let result = match self.log_format {
            LogFormat::Human => registry
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_ansi(true),
                )
                .try_init(),
            LogFormat::Json => registry
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_target(true),
                )
                .try_init(),
        };

        result.map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))
    }
}

fn create_env_filter() -> anyhow::Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_FILTER))
        .map_err(|e| anyhow::anyhow!("Failed to create env filter: {e}"))
}
