//! GitHub API client.
//!
//! Provides an HTTP client for the GitHub REST API with token authentication,
//! covering the four calls the dispatcher needs. The calls are exposed through
//! the [`RepoApi`] trait so the dispatcher can be handed any implementation.

use async_trait::async_trait;
use reqwest::{header, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;
use crate::models::action::FileUpload;

/// Public GitHub API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// REST API version pinned through the `X-GitHub-Api-Version` header.
const API_VERSION: &str = "2022-11-28";

/// GitHub API client configuration.
#[derive(Debug, Clone)]
pub struct GitHubClientConfig {
    /// Base URL of the API (e.g., `https://api.github.com`).
    pub base_url: String,

    /// Token sent as a bearer credential.
    pub token: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,

    /// `User-Agent` header; GitHub rejects requests without one.
    pub user_agent: String,
}

impl Default for GitHubClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            token: String::new(),
            timeout_secs: 30,
            user_agent: concat!("gh-eye/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Owner and name of the repository being written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// `owner/name`.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// The upstream operations the dispatcher depends on.
///
/// Entities are returned as raw JSON so callers see exactly what GitHub sent.
#[async_trait]
pub trait RepoApi: Send + Sync {
    /// Search issues and pull requests; returns the `items` array.
    async fn search_issues(&self, query: &str) -> Result<Vec<Value>, AppError>;

    /// Open a new issue.
    async fn create_issue(&self, repo: &RepoRef, title: &str, body: &str)
        -> Result<Value, AppError>;

    /// Comment on an existing issue.
    async fn create_comment(
        &self,
        repo: &RepoRef,
        issue_number: u64,
        body: &str,
    ) -> Result<Value, AppError>;

    /// Create or replace a file through the contents API.
    async fn create_or_update_file(
        &self,
        repo: &RepoRef,
        upload: &FileUpload,
    ) -> Result<Value, AppError>;
}

/// GitHub API client.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: Client,
    config: GitHubClientConfig,
}

/// Response of `GET /search/issues`.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueSearchResponse {
    pub total_count: u64,
    #[serde(default)]
    pub incomplete_results: bool,
    pub items: Vec<Value>,
}

/// Request body for `PUT /repos/{owner}/{repo}/contents/{path}`.
#[derive(Debug, Serialize)]
struct FileContentsBody<'a> {
    message: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

impl GitHubClient {
    /// Create a new GitHub client.
    pub fn new(config: GitHubClientConfig) -> Result<Self, AppError> {
        let mut headers = header::HeaderMap::new();

        let mut auth_value = header::HeaderValue::from_str(&format!("Bearer {}", config.token))
            .map_err(|_| AppError::client_init("Invalid token format"))?;
        auth_value.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth_value);
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            header::HeaderValue::from_static(API_VERSION),
        );

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.clone())
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::client_init(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Get the full URL for an API path.
    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Handle API response errors.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: Response,
        endpoint: &str,
    ) -> Result<T, AppError> {
        let status = response.status();

        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| AppError::internal(format!("Failed to parse response: {}", e)));
        }

        let status_code = status.as_u16();
        let body = response.text().await.unwrap_or_default();
        // GitHub reports failures as {"message": "...", "documentation_url": "..."}
        let body_message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from));

        let message = match (status, body_message) {
            (_, Some(msg)) => msg,
            (StatusCode::UNAUTHORIZED, None) => "Bad credentials".to_string(),
            (StatusCode::FORBIDDEN, None) => "Access denied".to_string(),
            (StatusCode::NOT_FOUND, None) => "Resource not found".to_string(),
            (StatusCode::TOO_MANY_REQUESTS, None) => "Rate limit exceeded".to_string(),
            (_, None) => format!("Request failed ({}): {}", status_code, body),
        };

        log::warn!("[github] {} answered {}: {}", endpoint, status_code, message);

        Err(AppError::github_api_full(message, status_code, endpoint))
    }
}

/// `/repos/{owner}/{name}` followed by `rest`, with owner and name encoded.
fn repo_endpoint(repo: &RepoRef, rest: &str) -> String {
    format!(
        "/repos/{}/{}{}",
        urlencoding::encode(&repo.owner),
        urlencoding::encode(&repo.name),
        rest
    )
}

/// Percent-encode each segment of a repository path, keeping the slashes.
fn encode_repo_path(path: &str) -> String {
    path.trim_start_matches('/')
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl RepoApi for GitHubClient {
    async fn search_issues(&self, query: &str) -> Result<Vec<Value>, AppError> {
        let endpoint = "/search/issues";
        let url = self.api_url(endpoint);
        let response = self
            .client
            .get(&url)
            .query(&[("q", query)])
            .send()
            .await?;
        let found: IssueSearchResponse = self.handle_response(response, endpoint).await?;

        log::debug!(
            "[github] search {:?} matched {} issue(s)",
            query,
            found.total_count
        );

        Ok(found.items)
    }

    async fn create_issue(
        &self,
        repo: &RepoRef,
        title: &str,
        body: &str,
    ) -> Result<Value, AppError> {
        let endpoint = repo_endpoint(repo, "/issues");
        let url = self.api_url(&endpoint);

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "title": title, "body": body }))
            .send()
            .await?;

        self.handle_response(response, &endpoint).await
    }

    async fn create_comment(
        &self,
        repo: &RepoRef,
        issue_number: u64,
        body: &str,
    ) -> Result<Value, AppError> {
        let endpoint = repo_endpoint(repo, &format!("/issues/{}/comments", issue_number));
        let url = self.api_url(&endpoint);

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "body": body }))
            .send()
            .await?;

        self.handle_response(response, &endpoint).await
    }

    async fn create_or_update_file(
        &self,
        repo: &RepoRef,
        upload: &FileUpload,
    ) -> Result<Value, AppError> {
        let endpoint = repo_endpoint(
            repo,
            &format!("/contents/{}", encode_repo_path(&upload.path)),
        );
        let url = self.api_url(&endpoint);

        let request_body = FileContentsBody {
            message: upload.commit_message(),
            content: upload.encoded_content(),
            sha: upload.sha.as_deref(),
        };

        let response = self.client.put(&url).json(&request_body).send().await?;

        self.handle_response(response, &endpoint).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url_construction() {
        let client = GitHubClient::new(GitHubClientConfig {
            base_url: "https://ghe.example.com/api/v3/".to_string(),
            token: "test-token".to_string(),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(
            client.api_url("/search/issues"),
            "https://ghe.example.com/api/v3/search/issues"
        );
    }

    #[test]
    fn test_invalid_token_rejected_at_construction() {
        let err = GitHubClient::new(GitHubClientConfig {
            token: "line\nbreak".to_string(),
            ..Default::default()
        })
        .unwrap_err();

        assert!(matches!(err, AppError::ClientInit { .. }));
    }

    #[test]
    fn test_encode_repo_path_keeps_directories() {
        assert_eq!(encode_repo_path("data.csv"), "data.csv");
        assert_eq!(
            encode_repo_path("/runs/S01 day#2.csv"),
            "runs/S01%20day%232.csv"
        );
    }

    #[test]
    fn test_repo_endpoint_encodes_owner_and_name() {
        let repo = RepoRef::new("acme labs", "eye#tracking");
        assert_eq!(
            repo_endpoint(&repo, "/issues"),
            "/repos/acme%20labs/eye%23tracking/issues"
        );
        assert_eq!(
            repo_endpoint(&RepoRef::new("acme", "lab"), "/issues/4/comments"),
            "/repos/acme/lab/issues/4/comments"
        );
    }

    #[test]
    fn test_file_contents_body_serialization() {
        let upload = FileUpload {
            path: "data.csv".to_string(),
            content: "a,b,c".to_string(),
            sha: None,
        };
        let body = FileContentsBody {
            message: upload.commit_message(),
            content: upload.encoded_content(),
            sha: upload.sha.as_deref(),
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["content"], "YSxiLGM=");
        assert_eq!(json["message"], "Add data file: data.csv");
        // sha is None, so should not appear
        assert!(json.get("sha").is_none());
    }

    #[test]
    fn test_repo_ref_full_name() {
        assert_eq!(RepoRef::new("acme", "lab").full_name(), "acme/lab");
    }
}
