//! API service construction.

use anyhow::Context;
use processlab_api::ApiServices;
use processlab_api::reqwest::ReqwestClient;

use super::Cli;

/// Creates the API services from CLI configuration.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be initialized.
pub fn create_services(cli: &Cli) -> anyhow::Result<ApiServices> {
    let client = ReqwestClient::new(cli.api.clone()).context("failed to create API client")?;
    Ok(client.into_services())
}
