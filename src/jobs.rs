//! Job orchestration: submission, polling, synchronous runs, deletion.
//!
//! [`JobOrchestrator::submit`] registers a pending job and spawns the
//! pipeline as an independent tokio task. The task handle is dropped, so
//! there is no cancellation; deleting a workspace hides its records but
//! lets in-flight work finish. [`JobOrchestrator::run_sync`] spawns the
//! same way and awaits the handle.
//!
//! Resubmitting an id whose previous run is still in flight starts a
//! second run against the same id. Both write to the same records and the
//! last writer wins.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use repo_insight_core::models::{AnalysisReport, JobState, JobStatus};
use repo_insight_core::report::truncate_failure;
use repo_insight_core::store::memory::InMemoryStore;
use repo_insight_core::store::{ResultStore, StoreError};

use crate::collector::{GitHubClient, RepoSlug};
use crate::config::Config;
use crate::error::AnalysisError;
use crate::generator::GeminiClient;
use crate::narrative::NarrativeGenerator;
use crate::pipeline::{AnalysisOptions, Pacing, Pipeline};
use crate::progress::{NoProgress, ProgressReporter};

/// Body of an analysis request.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisRequest {
    pub github_url: String,
    #[serde(default)]
    pub workspace_id: Option<String>,
    #[serde(default)]
    pub max_commits: Option<usize>,
    #[serde(default)]
    pub deep_analysis: Option<bool>,
}

impl AnalysisRequest {
    pub fn new(github_url: impl Into<String>) -> Self {
        Self {
            github_url: github_url.into(),
            workspace_id: None,
            max_commits: None,
            deep_analysis: None,
        }
    }
}

/// Returned by [`JobOrchestrator::submit`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub workspace_id: String,
    pub message: String,
    pub status_url: String,
    pub result_url: String,
}

/// Outcome of a result lookup.
#[derive(Debug, Clone)]
pub enum ResultLookup {
    Ready(Arc<AnalysisReport>),
    /// Job registered and still running.
    Pending,
    /// Job failed with this (truncated) message.
    Failed(String),
    NotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub timestamp: String,
    pub generator_configured: bool,
    pub source_token_configured: bool,
    pub active_jobs: usize,
    pub cached_results: usize,
    pub version: String,
}

/// Fresh workspace id: `ws_` followed by a simple-format UUID v4.
pub fn new_workspace_id() -> String {
    format!("ws_{}", uuid::Uuid::new_v4().simple())
}

#[derive(Clone)]
pub struct JobOrchestrator {
    pipeline: Pipeline,
    default_max_commits: usize,
}

impl JobOrchestrator {
    pub fn new(pipeline: Pipeline, default_max_commits: usize) -> Self {
        Self {
            pipeline,
            default_max_commits: default_max_commits.max(1),
        }
    }

    /// Wire the GitHub and Gemini clients and an in-memory store.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let source = Arc::new(GitHubClient::new(&config.source)?);
        let generator = Arc::new(GeminiClient::new(&config.generator)?);
        let store: Arc<dyn ResultStore> = Arc::new(InMemoryStore::new());
        let pipeline = Pipeline::new(source, NarrativeGenerator::new(generator), store)
            .with_pacing(Pacing::from_config(config))
            .with_paging(config.source.page_size, config.source.detail_budget);
        Ok(Self::new(pipeline, config.analysis.default_max_commits))
    }

    pub fn store(&self) -> &Arc<dyn ResultStore> {
        self.pipeline.store()
    }

    fn options(&self, request: &AnalysisRequest) -> AnalysisOptions {
        AnalysisOptions {
            max_commits: request
                .max_commits
                .filter(|n| *n > 0)
                .unwrap_or(self.default_max_commits),
            deep_analysis: request.deep_analysis.unwrap_or(true),
        }
    }

    /// Validate the request and register a pending job under its id.
    async fn register(&self, request: &AnalysisRequest) -> Result<String, AnalysisError> {
        RepoSlug::parse(&request.github_url)?;
        let workspace_id = match request.workspace_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => new_workspace_id(),
        };
        if let Some(existing) = self.store().get_job(&workspace_id).await? {
            if existing.status.is_in_flight() {
                tracing::warn!(
                    workspace_id = %workspace_id,
                    "workspace already has a run in flight; starting a concurrent run"
                );
            }
        }
        self.store()
            .put_job(JobStatus::pending(&workspace_id))
            .await?;
        Ok(workspace_id)
    }

    /// Start an analysis in the background and return immediately.
    pub async fn submit(&self, request: AnalysisRequest) -> Result<SubmitReceipt, AnalysisError> {
        let workspace_id = self.register(&request).await?;
        let options = self.options(&request);

        let pipeline = self.pipeline.clone();
        let id = workspace_id.clone();
        let url = request.github_url.clone();
        tokio::spawn(async move {
            let _ = pipeline.run(&url, &id, options, Arc::new(NoProgress)).await;
        });

        Ok(SubmitReceipt {
            status_url: format!("/api/status/{}", workspace_id),
            result_url: format!("/api/result/{}", workspace_id),
            message: "Analysis started".to_string(),
            workspace_id,
        })
    }

    /// Run an analysis and wait for the report.
    ///
    /// The run is spawned on its own task and the caller awaits its
    /// handle, so dropping the returned future (a disconnected HTTP
    /// client, a CLI timeout) leaves the run going to completion or
    /// failure.
    pub async fn run_sync(
        &self,
        request: AnalysisRequest,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Result<Arc<AnalysisReport>, AnalysisError> {
        let workspace_id = self.register(&request).await?;
        let options = self.options(&request);

        let pipeline = self.pipeline.clone();
        let id = workspace_id.clone();
        let handle = tokio::spawn(async move {
            pipeline
                .run(&request.github_url, &id, options, reporter)
                .await
        });
        match handle.await {
            Ok(outcome) => outcome,
            Err(join_err) => {
                let message = format!("analysis task aborted: {}", join_err);
                tracing::error!(workspace_id = %workspace_id, error = %message, "analysis task aborted");
                self.store()
                    .put_job(JobStatus::failed(&workspace_id, truncate_failure(&message)))
                    .await?;
                Err(AnalysisError::Pipeline(anyhow::anyhow!(message)))
            }
        }
    }

    pub async fn status(&self, workspace_id: &str) -> Result<Option<JobStatus>, AnalysisError> {
        Ok(self.store().get_job(workspace_id).await?)
    }

    pub async fn result(&self, workspace_id: &str) -> Result<ResultLookup, AnalysisError> {
        if let Some(report) = self.store().get_result(workspace_id).await? {
            return Ok(ResultLookup::Ready(report));
        }
        Ok(match self.store().get_job(workspace_id).await? {
            Some(job) if job.status.is_in_flight() => ResultLookup::Pending,
            Some(job) if job.status == JobState::Failed => ResultLookup::Failed(job.message),
            _ => ResultLookup::NotFound,
        })
    }

    /// Remove the workspace's records. `Ok(false)` when nothing existed.
    pub async fn delete(&self, workspace_id: &str) -> Result<bool, AnalysisError> {
        match self.store().delete(workspace_id).await {
            Ok(()) => {
                tracing::info!(workspace_id, "workspace deleted");
                Ok(true)
            }
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn health(&self) -> Result<HealthReport, AnalysisError> {
        let counts = self.store().counts().await?;
        Ok(HealthReport {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            generator_configured: self.pipeline.narrator().is_configured(),
            source_token_configured: self.pipeline.source().token_configured(),
            active_jobs: counts.jobs,
            cached_results: counts.results,
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }
}
