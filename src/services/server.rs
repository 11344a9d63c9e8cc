//! HTTP server exposing the dispatcher.
//!
//! Embeds an axum router with a single JSON endpoint (mounted at `/` and
//! `/api/gh-eye`). Every response carries permissive CORS headers, and
//! browser pre-flight requests are answered before routing.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::services::dispatcher::Dispatcher;

// ── Shared state ─────────────────────────────────────────────────────────────

/// What the endpoint was able to set up at startup.
#[derive(Clone)]
pub enum EndpointState {
    /// Configuration complete and client injected.
    Ready(Arc<Dispatcher>),
    /// Required configuration values absent; every request is refused.
    Misconfigured(Arc<[String]>),
}

impl std::fmt::Debug for EndpointState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(_) => f.write_str("Ready(..)"),
            Self::Misconfigured(missing) => f.debug_tuple("Misconfigured").field(missing).finish(),
        }
    }
}

impl EndpointState {
    pub fn ready(dispatcher: Dispatcher) -> Self {
        Self::Ready(Arc::new(dispatcher))
    }

    pub fn misconfigured(missing: Vec<String>) -> Self {
        Self::Misconfigured(missing.into())
    }
}

// ── Error handling ───────────────────────────────────────────────────────────

/// JSON error envelope returned for every failure.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    available_actions: Option<&'static [&'static str]>,
}

/// Wrapper to make AppError usable as an axum error response.
pub struct ApiErr(pub AppError);

impl IntoResponse for ApiErr {
    fn into_response(self) -> Response {
        let status = self.0.status();
        (
            status,
            Json(ErrorBody {
                error: self.0.category(),
                message: self.0.detail(),
                available_actions: self.0.available_actions(),
            }),
        )
            .into_response()
    }
}

impl From<AppError> for ApiErr {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

// ── CORS ─────────────────────────────────────────────────────────────────────

const ALLOW_ORIGIN: &str = "*";
const ALLOW_METHODS: &str = "POST, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type";

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static(ALLOW_ORIGIN),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
}

/// Answer pre-flight requests directly and stamp CORS headers on the rest.
async fn cors_middleware(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(request).await
    };

    apply_cors_headers(response.headers_mut());
    response
}

// ── Router ───────────────────────────────────────────────────────────────────

/// Largest request body accepted by default (64 MiB).
///
/// The contents API takes files up to 100 MB, and base64 inflates them by a
/// third on the way upstream.
pub const DEFAULT_BODY_LIMIT: usize = 64 * 1024 * 1024;

/// Build the endpoint router with the default body limit.
pub fn build_router(state: EndpointState) -> Router {
    build_router_with_body_limit(state, DEFAULT_BODY_LIMIT)
}

/// Build the endpoint router, accepting bodies up to `body_limit` bytes.
///
/// Every method reaches the handler so the configuration check runs before
/// anything else; only the pre-flight is answered earlier.
pub fn build_router_with_body_limit(state: EndpointState, body_limit: usize) -> Router {
    Router::new()
        .route("/", any(handle_action))
        .route("/api/gh-eye", any(handle_action))
        .fallback(not_found)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(cors_middleware))
                .layer(DefaultBodyLimit::max(body_limit)),
        )
}

/// Endpoint handler: configuration gate, then dispatch.
async fn handle_action(
    State(state): State<EndpointState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<Value>, ApiErr> {
    let dispatcher = match state {
        EndpointState::Ready(dispatcher) => dispatcher,
        EndpointState::Misconfigured(missing) => {
            return Err(AppError::configuration(missing.iter().cloned()).into());
        }
    };

    let body = body.map_err(|rejection| {
        let err = AppError::internal(rejection.body_text());
        log::error!("[gh-eye] request failed: {}", err);
        ApiErr(err)
    })?;

    match dispatcher.dispatch(&body).await {
        Ok(entity) => Ok(Json(entity)),
        Err(err) => {
            if err.status().is_server_error() {
                log::error!("[gh-eye] request failed: {}", err);
            } else {
                log::debug!("[gh-eye] request rejected: {}", err);
            }
            Err(err.into())
        }
    }
}

async fn not_found(uri: Uri) -> ApiErr {
    AppError::not_found(uri.path().to_string()).into()
}

// ── Serving ──────────────────────────────────────────────────────────────────

/// Serve the endpoint on `addr` until Ctrl-C or SIGTERM.
pub async fn serve(
    addr: SocketAddr,
    state: EndpointState,
    body_limit: usize,
) -> Result<(), AppError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind to {}: {}", addr, e)))?;

    log::info!("[gh-eye] Server starting on http://{}", addr);

    axum::serve(listener, build_router_with_body_limit(state, body_limit))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::internal(format!("Server error: {}", e)))?;

    log::info!("[gh-eye] Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("[gh-eye] Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::warn!("[gh-eye] Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::action::FileUpload;
    use crate::services::github_client::{RepoApi, RepoRef};
    use async_trait::async_trait;
    use axum::body::Body;
    use tower::ServiceExt;

    /// Upstream that fails the test if the router ever reaches it.
    struct NoCalls;

    #[async_trait]
    impl RepoApi for NoCalls {
        async fn search_issues(&self, _query: &str) -> Result<Vec<Value>, AppError> {
            panic!("unexpected search");
        }

        async fn create_issue(
            &self,
            _repo: &RepoRef,
            _title: &str,
            _body: &str,
        ) -> Result<Value, AppError> {
            panic!("unexpected issue creation");
        }

        async fn create_comment(
            &self,
            _repo: &RepoRef,
            _issue_number: u64,
            _body: &str,
        ) -> Result<Value, AppError> {
            panic!("unexpected comment");
        }

        async fn create_or_update_file(
            &self,
            _repo: &RepoRef,
            _upload: &FileUpload,
        ) -> Result<Value, AppError> {
            panic!("unexpected file commit");
        }
    }

    async fn send(
        app: Router,
        method: Method,
        uri: &str,
        body: &str,
    ) -> (StatusCode, HeaderMap, Value) {
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, headers, json)
    }

    fn misconfigured() -> Router {
        build_router(EndpointState::misconfigured(vec![
            "GITHUB_TOKEN".to_string(),
            "GITHUB_REPO_OWNER".to_string(),
        ]))
    }

    #[tokio::test]
    async fn test_preflight_short_circuits_even_when_misconfigured() {
        let (status, headers, body) =
            send(misconfigured(), Method::OPTIONS, "/api/gh-eye", "").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::Null);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "POST, OPTIONS");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type");
    }

    #[tokio::test]
    async fn test_misconfigured_refuses_every_action() {
        for body in [
            r#"{"action":"create_issue","subjectId":"S1"}"#,
            r#"{"action":"nonsense"}"#,
            "not json at all",
        ] {
            let (status, headers, json) = send(misconfigured(), Method::POST, "/", body).await;

            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(json["error"], "server misconfigured");
            assert_eq!(
                json["message"],
                "Missing environment variables: GITHUB_TOKEN, GITHUB_REPO_OWNER"
            );
            assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        }
    }

    #[tokio::test]
    async fn test_other_methods_hit_the_configuration_check() {
        for method in [Method::GET, Method::PUT, Method::DELETE] {
            let (status, headers, json) = send(misconfigured(), method, "/", "").await;

            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(json["error"], "server misconfigured");
            assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        }
    }

    #[tokio::test]
    async fn test_oversized_body_is_json_error() {
        let app = build_router_with_body_limit(
            EndpointState::ready(Dispatcher::new(
                Arc::new(NoCalls),
                RepoRef::new("acme", "lab"),
            )),
            1024,
        );
        let payload = format!(
            r#"{{"action":"upload_file","fileName":"big.csv","content":"{}"}}"#,
            "x".repeat(4096)
        );

        let (status, headers, json) = send(app, Method::POST, "/", &payload).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "processing failed");
        assert!(json["message"].as_str().unwrap().contains("length limit exceeded"));
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn test_unknown_path_is_json_not_found() {
        let (status, headers, json) = send(misconfigured(), Method::POST, "/nope", "{}").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "not found");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "POST, OPTIONS");
    }

    #[test]
    fn test_error_body_omits_actions_unless_unknown() {
        let body = ErrorBody {
            error: "missing parameters",
            message: "subjectId is required".to_string(),
            available_actions: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("availableActions").is_none());

        let err = AppError::unknown_action(None);
        let body = ErrorBody {
            error: err.category(),
            message: err.detail(),
            available_actions: err.available_actions(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json["availableActions"],
            serde_json::json!(["create_issue", "add_comment", "upload_file"])
        );
    }
}
