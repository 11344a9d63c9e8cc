//! Business logic services.
//!
//! This module contains the GitHub client, the request dispatcher built on
//! top of it, and the HTTP server that exposes the dispatcher.
//!
//! The dispatcher only sees the [`RepoApi`] trait, so it can be tested
//! without a network.

pub mod dispatcher;
pub mod github_client;
pub mod server;

pub use dispatcher::Dispatcher;
pub use github_client::{GitHubClient, GitHubClientConfig, RepoApi, RepoRef};
pub use server::{build_router, build_router_with_body_limit, EndpointState};
