//! Analysis progress reporting.
//!
//! Every stage boundary of a pipeline run goes through a
//! [`ProgressTracker`], which writes the workspace's [`JobStatus`] to the
//! store and forwards the event to a [`ProgressReporter`]. The CLI uses
//! the reporters to print progress on **stderr** so stdout stays
//! parseable; the server uses [`NoProgress`].

use std::io::Write;
use std::sync::Arc;

use repo_insight_core::models::JobStatus;
use repo_insight_core::store::{ResultStore, StoreResult};

/// A stage boundary reached by a pipeline run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgressEvent {
    pub workspace_id: String,
    pub progress: u8,
    pub step: String,
    pub message: String,
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: &ProgressEvent);
}

/// Human-friendly progress on stderr: `[ 45%] ai_summary  Generating project summary...`.
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: &ProgressEvent) {
        let line = format!(
            "[{:>3}%] {}  {}\n",
            event.progress, event.step, event.message
        );
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: &ProgressEvent) {
        let obj = serde_json::json!({
            "event": "progress",
            "workspace_id": event.workspace_id,
            "progress": event.progress,
            "step": event.step,
            "message": event.message,
        });
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: &ProgressEvent) {}
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Arc<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Arc::new(NoProgress),
            ProgressMode::Human => Arc::new(StderrProgress),
            ProgressMode::Json => Arc::new(JsonProgress),
        }
    }
}

/// Writes stage boundaries of one run. Progress never moves backwards:
/// a stage below the last recorded value is dropped.
pub struct ProgressTracker {
    store: Arc<dyn ResultStore>,
    reporter: Arc<dyn ProgressReporter>,
    workspace_id: String,
    last: u8,
}

impl ProgressTracker {
    pub fn new(
        store: Arc<dyn ResultStore>,
        reporter: Arc<dyn ProgressReporter>,
        workspace_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            reporter,
            workspace_id: workspace_id.into(),
            last: 0,
        }
    }

    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    pub fn last(&self) -> u8 {
        self.last
    }

    pub async fn stage(&mut self, progress: u8, message: &str, step: &str) -> StoreResult<()> {
        let progress = progress.min(100);
        if progress < self.last {
            tracing::debug!(
                workspace_id = %self.workspace_id,
                progress,
                last = self.last,
                "ignoring backwards progress"
            );
            return Ok(());
        }
        self.last = progress;
        self.store
            .put_job(JobStatus::at_stage(&self.workspace_id, progress, message, step))
            .await?;
        self.reporter.report(&ProgressEvent {
            workspace_id: self.workspace_id.clone(),
            progress,
            step: step.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }
}
