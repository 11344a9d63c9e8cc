//! Request dispatcher.
//!
//! Turns one request body into at most one sequence of GitHub calls and a
//! JSON result. The dispatcher holds no per-request state; the repository
//! coordinates and the API client are fixed at construction.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use crate::error::AppError;
use crate::models::action::{Action, CommentRequest, FileUpload, SubjectInfo};
use crate::services::github_client::{RepoApi, RepoRef};

/// Message attached to an issue returned from search instead of created.
pub const ALREADY_EXISTS_MESSAGE: &str = "Issue already exists";

/// Routes validated actions to the GitHub API.
#[derive(Clone)]
pub struct Dispatcher {
    api: Arc<dyn RepoApi>,
    repo: RepoRef,
}

impl Dispatcher {
    pub fn new(api: Arc<dyn RepoApi>, repo: RepoRef) -> Self {
        Self { api, repo }
    }

    /// Repository every action writes to.
    pub fn repo(&self) -> &RepoRef {
        &self.repo
    }

    /// Parse a raw request body and run the selected action.
    pub async fn dispatch(&self, body: &[u8]) -> Result<Value, AppError> {
        let payload: Value = serde_json::from_slice(body)?;
        let action = Action::from_payload(&payload)?;
        self.run(action).await
    }

    /// Run an already validated action.
    pub async fn run(&self, action: Action) -> Result<Value, AppError> {
        log::debug!("[gh-eye] dispatching {}", action.name());

        match action {
            Action::CreateIssue(subject) => self.create_issue(&subject).await,
            Action::AddComment(comment) => self.add_comment(&comment).await,
            Action::UploadFile(upload) => self.upload_file(&upload).await,
        }
    }

    /// Return the subject's issue, creating it only if search finds none.
    ///
    /// The search and the create are not atomic: two concurrent requests for
    /// the same subject can both miss and both create.
    async fn create_issue(&self, subject: &SubjectInfo) -> Result<Value, AppError> {
        let query = subject.search_query(&self.repo.full_name());
        let items = self.api.search_issues(&query).await?;

        if let Some(existing) = subject.find_existing(&items) {
            log::info!(
                "[gh-eye] subject {} already has issue #{}",
                subject.subject_id,
                existing.get("number").unwrap_or(&Value::Null)
            );
            return Ok(mark_existing(existing.clone()));
        }

        let body = subject.issue_body(Utc::now());
        let issue = self
            .api
            .create_issue(&self.repo, &subject.subject_id, &body)
            .await?;

        log::info!(
            "[gh-eye] created issue #{} for subject {}",
            issue.get("number").unwrap_or(&Value::Null),
            subject.subject_id
        );
        Ok(issue)
    }

    async fn add_comment(&self, comment: &CommentRequest) -> Result<Value, AppError> {
        self.api
            .create_comment(&self.repo, comment.issue_number, &comment.body)
            .await
    }

    async fn upload_file(&self, upload: &FileUpload) -> Result<Value, AppError> {
        let file = self.api.create_or_update_file(&self.repo, upload).await?;
        log::info!("[gh-eye] committed {}", upload.path);
        Ok(file)
    }
}

/// Flag an issue found through search so callers can tell it from a new one.
fn mark_existing(mut issue: Value) -> Value {
    if let Value::Object(fields) = &mut issue {
        fields.insert("message".into(), Value::from(ALREADY_EXISTS_MESSAGE));
        fields.insert("alreadyExists".into(), Value::Bool(true));
    }
    issue
}
