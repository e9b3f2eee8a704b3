#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod command;
mod config;

use std::process;

use crate::config::Cli;

// Tracing target constants
pub const TRACING_TARGET_STARTUP: &str = "processlab_cli::startup";
pub const TRACING_TARGET_SHUTDOWN: &str = "processlab_cli::shutdown";
pub const TRACING_TARGET_CONFIG: &str = "processlab_cli::config";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        tracing::debug!(target: TRACING_TARGET_SHUTDOWN, "command completed");
        process::exit(0);
    };

    tracing::debug!(
        target: TRACING_TARGET_SHUTDOWN,
        error = %error,
        "command failed"
    );
    eprintln!("Error: {error:#}");

    process::exit(1);
}

/// Main application entry point.
async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();

    cli.logging.init_tracing()?;
    cli.log();
    cli.validate()?;

    let command = cli.command.clone();
    let output = command.run(&cli).await?;
    if !output.is_empty() {
        println!("{output}");
    }

    Ok(())
}
