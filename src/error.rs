//! Application error types for the proxy endpoint.
//!
//! Every failure the dispatcher can hit is an [`AppError`]. The HTTP layer
//! renders each variant as a JSON envelope with a short category and a
//! detail message; see [`AppError::status`] and [`AppError::category`].

use reqwest::StatusCode;
use thiserror::Error;

use crate::models::action::SUPPORTED_ACTIONS;

/// Application-level errors surfaced by the dispatcher and the GitHub client.
#[derive(Debug, Error)]
pub enum AppError {
    /// Required configuration values were not provided.
    #[error("Missing environment variables: {}", missing.join(", "))]
    Configuration { missing: Vec<String> },

    /// The GitHub client could not be constructed.
    #[error("Client initialization failed: {message}")]
    ClientInit { message: String },

    /// A required request field is missing or malformed.
    #[error("Invalid input: {message}")]
    InvalidInput {
        message: String,
        field: Option<String>,
    },

    /// The `action` field is absent or not one of the supported actions.
    #[error("Unsupported action: {}", action.as_deref().unwrap_or("(missing)"))]
    UnknownAction { action: Option<String> },

    /// GitHub API request failed.
    #[error("GitHub API error: {message}")]
    GitHubApi {
        message: String,
        status_code: Option<u16>,
        endpoint: Option<String>,
    },

    /// Network request failed.
    #[error("Network error: {message}")]
    Network { message: String },

    /// No route matched the request path.
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// Internal application error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    /// Create a configuration error listing the missing value names.
    pub fn configuration<I, S>(missing: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Configuration {
            missing: missing.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a client initialization error.
    pub fn client_init(message: impl Into<String>) -> Self {
        Self::ClientInit {
            message: message.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: None,
        }
    }

    /// Create an invalid input error with field name.
    pub fn invalid_input_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create an unknown action error echoing the rejected value.
    pub fn unknown_action(action: Option<String>) -> Self {
        Self::UnknownAction { action }
    }

    /// Create a GitHub API error.
    pub fn github_api(message: impl Into<String>) -> Self {
        Self::GitHubApi {
            message: message.into(),
            status_code: None,
            endpoint: None,
        }
    }

    /// Create a GitHub API error with status code and endpoint.
    pub fn github_api_full(
        message: impl Into<String>,
        status_code: u16,
        endpoint: impl Into<String>,
    ) -> Self {
        Self::GitHubApi {
            message: message.into(),
            status_code: Some(status_code),
            endpoint: Some(endpoint.into()),
        }
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// HTTP status the error is reported with.
    ///
    /// Upstream and transport failures are flattened to 500 regardless of
    /// the status GitHub answered with.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput { .. } | Self::UnknownAction { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Configuration { .. }
            | Self::ClientInit { .. }
            | Self::GitHubApi { .. }
            | Self::Network { .. }
            | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short category shown in the `error` field of the response envelope.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "server misconfigured",
            Self::ClientInit { .. } => "client initialization failed",
            Self::InvalidInput { .. } => "missing parameters",
            Self::UnknownAction { .. } => "unknown action",
            Self::NotFound { .. } => "not found",
            Self::GitHubApi { .. } | Self::Network { .. } | Self::Internal { .. } => {
                "processing failed"
            }
        }
    }

    /// Detail shown in the `message` field of the response envelope.
    ///
    /// Unlike `Display`, upstream messages are passed through verbatim
    /// without a prefix.
    pub fn detail(&self) -> String {
        match self {
            Self::ClientInit { message }
            | Self::InvalidInput { message, .. }
            | Self::GitHubApi { message, .. }
            | Self::Network { message }
            | Self::Internal { message } => message.clone(),
            Self::Configuration { .. } | Self::UnknownAction { .. } | Self::NotFound { .. } => {
                self.to_string()
            }
        }
    }

    /// Actions to advertise alongside the error, if any.
    pub fn available_actions(&self) -> Option<&'static [&'static str]> {
        match self {
            Self::UnknownAction { .. } => Some(&SUPPORTED_ACTIONS),
            _ => None,
        }
    }
}

// Conversions from common error types

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::network(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            Self::network(format!("Failed to connect to server: {}", err))
        } else if err.is_status() {
            Self::github_api(format!("HTTP error: {}", err))
        } else {
            Self::network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("JSON error: {}", err))
    }
}
