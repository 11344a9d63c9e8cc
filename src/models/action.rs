//! Request actions accepted by the proxy endpoint.
//!
//! The request body is a JSON object whose `action` field selects one of
//! the [`Action`] variants. Each variant carries the already-validated
//! fields it needs, so the dispatcher never looks at raw JSON again.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::error::AppError;

/// Names of every action the endpoint understands, in routing order.
pub const SUPPORTED_ACTIONS: [&str; 3] = ["create_issue", "add_comment", "upload_file"];

/// Placeholder for subject attributes the caller did not provide.
pub const UNKNOWN_MARKER: &str = "unknown";

/// A validated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    CreateIssue(SubjectInfo),
    AddComment(CommentRequest),
    UploadFile(FileUpload),
}

/// Experiment subject to register as an issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectInfo {
    pub subject_id: String,
    pub gender: Option<String>,
    pub age: Option<String>,
}

/// Comment to post on an existing issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRequest {
    pub issue_number: u64,
    pub body: String,
}

/// File to commit into the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    /// Repository path, as given by the caller.
    pub path: String,
    /// Raw (not yet encoded) file content.
    pub content: String,
    /// Blob SHA of the file being replaced, required by GitHub for updates.
    pub sha: Option<String>,
}

impl Action {
    /// Parse and validate a request payload.
    ///
    /// Only the `action` field decides routing. Field checks happen after
    /// routing so an unknown action is reported before missing fields.
    pub fn from_payload(payload: &Value) -> Result<Self, AppError> {
        let action = payload.get("action");

        match action.and_then(Value::as_str) {
            Some("create_issue") => SubjectInfo::from_payload(payload).map(Self::CreateIssue),
            Some("add_comment") => CommentRequest::from_payload(payload).map(Self::AddComment),
            Some("upload_file") => FileUpload::from_payload(payload).map(Self::UploadFile),
            _ => Err(AppError::unknown_action(action.and_then(describe_action))),
        }
    }

    /// Wire name of the action.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateIssue(_) => SUPPORTED_ACTIONS[0],
            Self::AddComment(_) => SUPPORTED_ACTIONS[1],
            Self::UploadFile(_) => SUPPORTED_ACTIONS[2],
        }
    }
}

impl SubjectInfo {
    fn from_payload(payload: &Value) -> Result<Self, AppError> {
        let subject_id = text_field(payload, "subjectId").ok_or_else(|| {
            AppError::invalid_input_field("subjectId is required", "subjectId")
        })?;

        Ok(Self {
            subject_id,
            gender: text_field(payload, "gender"),
            age: text_field(payload, "age"),
        })
    }

    /// Issue body recording the subject's attributes and start time.
    pub fn issue_body(&self, started_at: DateTime<Utc>) -> String {
        format!(
            "Subject information:\n- Gender: {}\n- Age: {}\n- Experiment started: {}",
            self.gender.as_deref().unwrap_or(UNKNOWN_MARKER),
            self.age.as_deref().unwrap_or(UNKNOWN_MARKER),
            started_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        )
    }

    /// Search query locating an existing issue for this subject.
    pub fn search_query(&self, repo_full_name: &str) -> String {
        format!(
            "repo:{} in:title {} type:issue",
            repo_full_name, self.subject_id
        )
    }

    /// Pick the search hit that represents this subject, if any.
    ///
    /// An exact title match wins; otherwise the first title containing the
    /// subject ID (GitHub search is case-insensitive, so this is too).
    pub fn find_existing<'a>(&self, items: &'a [Value]) -> Option<&'a Value> {
        let title = |item: &Value| item.get("title").and_then(Value::as_str).map(str::to_owned);

        if let Some(exact) = items
            .iter()
            .find(|item| title(*item).as_deref() == Some(self.subject_id.as_str()))
        {
            return Some(exact);
        }

        let needle = self.subject_id.to_lowercase();
        items.iter().find(|item| {
            title(*item)
                .map(|t| t.to_lowercase().contains(&needle))
                .unwrap_or(false)
        })
    }
}

impl CommentRequest {
    fn from_payload(payload: &Value) -> Result<Self, AppError> {
        let issue_number = text_field(payload, "issueNumber");
        let body = text_field(payload, "commentBody");

        let (Some(issue_number), Some(body)) = (issue_number, body) else {
            return Err(AppError::invalid_input(
                "issueNumber and commentBody are both required",
            ));
        };

        let issue_number = match issue_number.trim().parse::<u64>() {
            Ok(0) => {
                return Err(AppError::invalid_input(
                    "issueNumber and commentBody are both required",
                ))
            }
            Ok(n) => n,
            Err(_) => {
                return Err(AppError::invalid_input_field(
                    format!("issueNumber must be a positive integer, got {}", issue_number),
                    "issueNumber",
                ))
            }
        };

        Ok(Self { issue_number, body })
    }
}

impl FileUpload {
    fn from_payload(payload: &Value) -> Result<Self, AppError> {
        let path = text_field(payload, "fileName");
        let content = text_field(payload, "content");

        let (Some(path), Some(content)) = (path, content) else {
            return Err(AppError::invalid_input(
                "fileName and content are both required",
            ));
        };

        Ok(Self {
            path,
            content,
            sha: text_field(payload, "sha"),
        })
    }

    /// Content encoded the way the contents API expects it.
    pub fn encoded_content(&self) -> String {
        STANDARD.encode(self.content.as_bytes())
    }

    /// Commit message for the upload.
    pub fn commit_message(&self) -> String {
        format!("Add data file: {}", self.path)
    }
}

/// Read a field as text.
///
/// `null`, `false`, `0` and the empty string are absent; `true` reads as
/// `"true"` and other numbers are rendered in decimal. Objects and arrays
/// are absent too.
fn text_field(payload: &Value, name: &str) -> Option<String> {
    match payload.get(name)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        Value::Bool(true) => Some(true.to_string()),
        _ => None,
    }
}

/// Render a rejected `action` value for the error message.
fn describe_action(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
