//! gh-eye - GitHub proxy endpoint for experiment logging.
//!
//! A browser-side experiment runner posts JSON actions here; the endpoint
//! turns them into GitHub issue, comment and file-commit calls using a
//! server-held token.

pub mod config;
pub mod error;
pub mod models;
pub mod services;

use std::sync::Arc;

use config::ServerArgs;
use error::AppError;
use services::{Dispatcher, EndpointState, GitHubClient};

/// Resolve configuration, inject the GitHub client and serve until shutdown.
///
/// Missing repository configuration is not fatal: the endpoint starts and
/// refuses every request with the list of missing names. A client that
/// cannot be built is fatal and reported once, here.
pub async fn run(args: ServerArgs) -> Result<(), AppError> {
    let state = endpoint_state(&args)?;
    services::server::serve(args.bind, state, args.max_body_bytes).await
}

/// Build the endpoint state for the given arguments.
pub fn endpoint_state(args: &ServerArgs) -> Result<EndpointState, AppError> {
    match args.repo_config() {
        Ok(repo) => {
            let client = GitHubClient::new(args.client_config(&repo))?;
            log::info!(
                "[gh-eye] Writing to {} via {}",
                repo.repo_ref().full_name(),
                args.api_url
            );
            Ok(EndpointState::ready(Dispatcher::new(
                Arc::new(client),
                repo.repo_ref(),
            )))
        }
        Err(missing) => {
            log::error!(
                "[gh-eye] Missing environment variables: {}; all requests will fail",
                missing.join(", ")
            );
            Ok(EndpointState::misconfigured(missing))
        }
    }
}
