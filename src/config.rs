//! Process configuration.
//!
//! Everything is read once at startup, from command-line flags with
//! environment fallbacks. The three repository values are optional at the
//! parsing level so a misconfigured deployment still starts and can
//! report exactly what is missing on every request.

use std::fmt;
use std::net::SocketAddr;

use clap::Parser;

use crate::services::github_client::{GitHubClientConfig, RepoRef, DEFAULT_API_URL};
use crate::services::server::DEFAULT_BODY_LIMIT;

/// Environment variable holding the GitHub access token.
pub const TOKEN_VAR: &str = "GITHUB_TOKEN";
/// Environment variable holding the repository owner.
pub const OWNER_VAR: &str = "GITHUB_REPO_OWNER";
/// Environment variable holding the repository name.
pub const NAME_VAR: &str = "GITHUB_REPO_NAME";

/// Command-line arguments for the `gh-eye` binary.
#[derive(Debug, Clone, Parser)]
#[command(name = "gh-eye", version, about = "GitHub proxy endpoint for experiment logging")]
pub struct ServerArgs {
    /// Address to listen on.
    #[arg(long, env = "GH_EYE_BIND", default_value = "0.0.0.0:3000")]
    pub bind: SocketAddr,

    /// Largest request body accepted, in bytes.
    #[arg(long, env = "GH_EYE_MAX_BODY_BYTES", default_value_t = DEFAULT_BODY_LIMIT)]
    pub max_body_bytes: usize,

    /// Base URL of the GitHub REST API.
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Upstream request timeout in seconds.
    #[arg(long, env = "GITHUB_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Access token used for every GitHub call.
    #[arg(long, env = TOKEN_VAR, hide_env_values = true)]
    pub github_token: Option<String>,

    /// Owner of the repository issues and files are written to.
    #[arg(long, env = OWNER_VAR)]
    pub repo_owner: Option<String>,

    /// Name of the repository issues and files are written to.
    #[arg(long, env = NAME_VAR)]
    pub repo_name: Option<String>,
}

/// Repository coordinates plus the token used to reach them.
#[derive(Clone, PartialEq, Eq)]
pub struct RepoConfig {
    pub token: String,
    pub owner: String,
    pub name: String,
}

impl fmt::Debug for RepoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepoConfig")
            .field("token", &"<redacted>")
            .field("owner", &self.owner)
            .field("name", &self.name)
            .finish()
    }
}

impl RepoConfig {
    /// Assemble the repository configuration, or list the missing names.
    ///
    /// Empty values count as missing. Names are reported in the order
    /// token, owner, name.
    pub fn resolve(
        token: Option<String>,
        owner: Option<String>,
        name: Option<String>,
    ) -> Result<Self, Vec<String>> {
        let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        let (token, owner, name) = (present(token), present(owner), present(name));

        match (token, owner, name) {
            (Some(token), Some(owner), Some(name)) => Ok(Self { token, owner, name }),
            (token, owner, name) => Err([
                (TOKEN_VAR, token.is_none()),
                (OWNER_VAR, owner.is_none()),
                (NAME_VAR, name.is_none()),
            ]
            .into_iter()
            .filter(|(_, missing)| *missing)
            .map(|(var, _)| var.to_string())
            .collect()),
        }
    }

    /// Repository coordinates without the token.
    pub fn repo_ref(&self) -> RepoRef {
        RepoRef::new(self.owner.clone(), self.name.clone())
    }
}

impl ServerArgs {
    /// Repository configuration from the parsed arguments.
    pub fn repo_config(&self) -> Result<RepoConfig, Vec<String>> {
        RepoConfig::resolve(
            self.github_token.clone(),
            self.repo_owner.clone(),
            self.repo_name.clone(),
        )
    }

    /// GitHub client settings for the given repository configuration.
    pub fn client_config(&self, repo: &RepoConfig) -> GitHubClientConfig {
        GitHubClientConfig {
            base_url: self.api_url.clone(),
            token: repo.token.clone(),
            timeout_secs: self.timeout_secs,
            ..Default::default()
        }
    }
}
