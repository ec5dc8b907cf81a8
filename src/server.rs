//! HTTP JSON API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/` | Service name, version, endpoint list |
//! | `POST`   | `/api/analyze` | Start a background analysis |
//! | `GET`    | `/api/status/{id}` | Job status |
//! | `GET`    | `/api/result/{id}` | Finished report (202 while running) |
//! | `POST`   | `/api/analyze/sync` | Run an analysis and wait for the report |
//! | `DELETE` | `/api/workspace/{id}` | Remove a workspace's status and report |
//! | `GET`    | `/api/health` | Liveness, credential presence, store sizes |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "Workspace not found" } }
//! ```
//!
//! Malformed or incomplete request bodies are reported as `bad_request`
//! in the same shape.
//!
//! Error codes: `bad_request` (400), `not_found` (404), `in_progress` (202),
//! `rate_limited` (429), `timeout` (504), `analysis_failed` (500),
//! `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use repo_insight_core::models::{AnalysisReport, JobStatus};

use crate::config::Config;
use crate::error::{AnalysisError, SourceError};
use crate::jobs::{AnalysisRequest, HealthReport, JobOrchestrator, ResultLookup, SubmitReceipt};
use crate::progress::NoProgress;

#[derive(Clone)]
pub struct AppState {
    jobs: Arc<JobOrchestrator>,
}

impl AppState {
    pub fn new(jobs: JobOrchestrator) -> Self {
        Self {
            jobs: Arc::new(jobs),
        }
    }
}

/// Build the router with all routes and the CORS layer.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_index))
        .route("/api/analyze", post(handle_analyze))
        .route("/api/analyze/sync", post(handle_analyze_sync))
        .route("/api/status/{id}", get(handle_status))
        .route("/api/result/{id}", get(handle_result))
        .route("/api/workspace/{id}", delete(handle_delete))
        .route("/api/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind` and runs until the process
/// is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let jobs = JobOrchestrator::from_config(config)?;
    let app = router(AppState::new(jobs));

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "server listening");
    println!("Repo Insight listening on http://{}", config.server.bind);
    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::NOT_FOUND, "not_found", message)
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::new(StatusCode::BAD_REQUEST, "bad_request", rejection.body_text())
    }
}

impl From<AnalysisError> for AppError {
    fn from(err: AnalysisError) -> Self {
        match err.normalize() {
            AnalysisError::InvalidUrl(url) => AppError::new(
                StatusCode::BAD_REQUEST,
                "bad_request",
                format!("Invalid GitHub URL: {}", url),
            ),
            AnalysisError::NotFound(msg) => not_found(msg),
            AnalysisError::Source(SourceError::RateLimited) => AppError::new(
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "GitHub API rate limit exceeded. Add GITHUB_TOKEN to the environment",
            ),
            AnalysisError::Source(SourceError::Timeout) => AppError::new(
                StatusCode::GATEWAY_TIMEOUT,
                "timeout",
                "GitHub API timeout",
            ),
            AnalysisError::Source(other) => AppError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "analysis_failed",
                other.to_string(),
            ),
            AnalysisError::Pipeline(other) => AppError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                other.to_string(),
            ),
        }
    }
}

// ============ Handlers ============

#[derive(Serialize)]
struct IndexResponse {
    service: &'static str,
    version: &'static str,
    endpoints: serde_json::Value,
}

async fn handle_index() -> Json<IndexResponse> {
    Json(IndexResponse {
        service: "Repo Insight",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: serde_json::json!({
            "POST /api/analyze": "Start async analysis",
            "GET /api/status/{workspace_id}": "Get analysis status",
            "GET /api/result/{workspace_id}": "Get analysis result",
            "POST /api/analyze/sync": "Synchronous analysis",
            "DELETE /api/workspace/{workspace_id}": "Delete workspace",
            "GET /api/health": "Health check",
        }),
    })
}

async fn handle_analyze(
    State(state): State<AppState>,
    payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> Result<Json<SubmitReceipt>, AppError> {
    let Json(request) = payload?;
    Ok(Json(state.jobs.submit(request).await?))
}

async fn handle_analyze_sync(
    State(state): State<AppState>,
    payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> Result<Json<AnalysisReport>, AppError> {
    let Json(request) = payload?;
    let report = state.jobs.run_sync(request, Arc::new(NoProgress)).await?;
    Ok(Json(report.as_ref().clone()))
}

async fn handle_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobStatus>, AppError> {
    state
        .jobs
        .status(&id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("Workspace not found"))
}

async fn handle_result(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AnalysisReport>, AppError> {
    match state.jobs.result(&id).await? {
        ResultLookup::Ready(report) => Ok(Json(report.as_ref().clone())),
        ResultLookup::Pending => Err(AppError::new(
            StatusCode::ACCEPTED,
            "in_progress",
            "Analysis still in progress",
        )),
        ResultLookup::Failed(message) => Err(AppError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "analysis_failed",
            message,
        )),
        ResultLookup::NotFound => Err(not_found("Result not found")),
    }
}

#[derive(Serialize)]
struct DeleteResponse {
    message: &'static str,
    workspace_id: String,
}

async fn handle_delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    if state.jobs.delete(&id).await? {
        Ok(Json(DeleteResponse {
            message: "Workspace deleted",
            workspace_id: id,
        }))
    } else {
        Err(not_found("Workspace not found"))
    }
}

async fn handle_health(State(state): State<AppState>) -> Result<Json<HealthReport>, AppError> {
    Ok(Json(state.jobs.health().await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let err = AppError::from(AnalysisError::InvalidUrl("nope".into()));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "bad_request");

        let err = AppError::from(AnalysisError::Source(SourceError::NotFound(
            "Resource not found".into(),
        )));
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let err = AppError::from(AnalysisError::Source(SourceError::RateLimited));
        assert_eq!(err.code, "rate_limited");

        let err = AppError::from(AnalysisError::Source(SourceError::Timeout));
        assert_eq!(err.status, StatusCode::GATEWAY_TIMEOUT);

        let err = AppError::from(AnalysisError::Pipeline(anyhow::anyhow!("boom")));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
