//! Typed failures of the outbound collaborators and of a pipeline run.
//!
//! | Type | Raised by |
//! |------|-----------|
//! | [`SourceError`] | [`collector`](crate::collector) |
//! | [`GenerationError`] | [`generator`](crate::generator) |
//! | [`AnalysisError`] | [`pipeline`](crate::pipeline) and [`jobs`](crate::jobs) |

use std::time::Duration;

use repo_insight_core::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("{0}")]
    NotFound(String),
    #[error("GitHub API rate limit exceeded or access forbidden")]
    RateLimited,
    #[error("GitHub API request timed out")]
    Timeout,
    #[error("GitHub API error {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("GitHub API request failed: {0}")]
    Transport(String),
    #[error("unexpected GitHub API response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout
        } else if err.is_decode() {
            SourceError::Decode(err.to_string())
        } else {
            SourceError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("GEMINI_API_KEY not set")]
    MissingApiKey,
    #[error("Gemini API rate limit exceeded")]
    RateLimited { retry_after: Option<Duration> },
    #[error("Gemini API request timed out")]
    Timeout,
    #[error("Gemini API error {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("Gemini API request failed: {0}")]
    Transport(String),
    #[error("Gemini API returned no text: {0}")]
    MalformedResponse(String),
}

impl GenerationError {
    /// Whether another attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerationError::RateLimited { .. }
            | GenerationError::Timeout
            | GenerationError::Transport(_) => true,
            GenerationError::Upstream { status, .. } => *status >= 500,
            GenerationError::MissingApiKey | GenerationError::MalformedResponse(_) => false,
        }
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GenerationError::Timeout
        } else {
            GenerationError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Invalid GitHub URL: {0}")]
    InvalidUrl(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Pipeline(#[from] anyhow::Error),
}

impl From<StoreError> for AnalysisError {
    fn from(err: StoreError) -> Self {
        AnalysisError::Pipeline(err.into())
    }
}

impl AnalysisError {
    /// Map collector "not found" into the pipeline-level variant so callers
    /// classify both the same way.
    pub fn normalize(self) -> Self {
        match self {
            AnalysisError::Source(SourceError::NotFound(msg)) => AnalysisError::NotFound(msg),
            other => other,
        }
    }
}
