//! The analysis pipeline: collect, aggregate, analyze, narrate, store.
//!
//! One [`Pipeline::run`] call analyzes one repository for one workspace.
//! Stage boundaries are written to the store through a
//! [`ProgressTracker`](crate::progress::ProgressTracker):
//!
//! | Progress | Step |
//! |----------|------|
//! | 5 | `initialization` |
//! | 10 | `repo_info` |
//! | 15 | `languages` |
//! | 20 | `commits` |
//! | 30 | `contributors` |
//! | 45 | `ai_summary` |
//! | 50–80 | `ai_contributors` |
//! | 85 | `stale_files` |
//! | 88 | `hot_spots` |
//! | 92 | `ai_health` |
//! | 100 | `completed` |
//!
//! Collector failures abort the run and mark the job failed. Narrative
//! failures never do; they degrade to heuristics.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use repo_insight_core::aggregate::Aggregator;
use repo_insight_core::models::{AnalysisReport, JobStatus, RepoMetadata};
use repo_insight_core::narrative::{ContributorEvidence, HealthEvidence};
use repo_insight_core::report::{self, truncate_failure};
use repo_insight_core::risk;
use repo_insight_core::store::ResultStore;

use crate::collector::{self, RepoSlug, SourceControl};
use crate::config::Config;
use crate::error::AnalysisError;
use crate::narrative::NarrativeGenerator;
use crate::progress::{ProgressReporter, ProgressTracker};

/// Per-run options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisOptions {
    pub max_commits: usize,
    /// Fetch sampled commit details for file-level statistics.
    pub deep_analysis: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            max_commits: 1000,
            deep_analysis: true,
        }
    }
}

/// Delays between outbound calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub detail: Duration,
    pub phase: Duration,
    pub contributor: Duration,
}

impl Pacing {
    pub fn from_config(config: &Config) -> Self {
        Self {
            detail: Duration::from_millis(config.source.detail_delay_ms),
            phase: Duration::from_millis(config.generator.phase_delay_ms),
            contributor: Duration::from_millis(config.generator.contributor_delay_ms),
        }
    }

    pub fn none() -> Self {
        Self {
            detail: Duration::ZERO,
            phase: Duration::ZERO,
            contributor: Duration::ZERO,
        }
    }
}

#[derive(Clone)]
pub struct Pipeline {
    source: Arc<dyn SourceControl>,
    narrator: NarrativeGenerator,
    store: Arc<dyn ResultStore>,
    pacing: Pacing,
    page_size: u32,
    detail_budget: usize,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn SourceControl>,
        narrator: NarrativeGenerator,
        store: Arc<dyn ResultStore>,
    ) -> Self {
        Self {
            source,
            narrator,
            store,
            pacing: Pacing::none(),
            page_size: 100,
            detail_budget: 100,
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_paging(mut self, page_size: u32, detail_budget: usize) -> Self {
        self.page_size = page_size.clamp(1, 100);
        self.detail_budget = detail_budget.max(1);
        self
    }

    pub fn source(&self) -> &Arc<dyn SourceControl> {
        &self.source
    }

    pub fn narrator(&self) -> &NarrativeGenerator {
        &self.narrator
    }

    pub fn store(&self) -> &Arc<dyn ResultStore> {
        &self.store
    }

    /// Analyze `url` for `workspace_id`, storing the report on success and
    /// a failed status (message truncated) on error.
    pub async fn run(
        &self,
        url: &str,
        workspace_id: &str,
        options: AnalysisOptions,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Result<Arc<AnalysisReport>, AnalysisError> {
        let mut tracker = ProgressTracker::new(self.store.clone(), reporter, workspace_id);
        match self.execute(url, options, &mut tracker).await {
            Ok(report) => Ok(report),
            Err(err) => {
                let err = err.normalize();
                let message = truncate_failure(&err.to_string());
                tracing::warn!(workspace_id, error = %message, "analysis failed");
                if let Err(store_err) = self
                    .store
                    .put_job(JobStatus::failed(workspace_id, message))
                    .await
                {
                    tracing::error!(workspace_id, error = %store_err, "could not record failure");
                }
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        url: &str,
        options: AnalysisOptions,
        tracker: &mut ProgressTracker,
    ) -> Result<Arc<AnalysisReport>, AnalysisError> {
        let workspace_id = tracker.workspace_id().to_string();

        tracker
            .stage(5, "Parsing repository URL...", "initialization")
            .await?;
        let slug = RepoSlug::parse(url)?;
        tracing::info!(workspace_id = %workspace_id, repo = %slug, max_commits = options.max_commits, "analysis started");

        tracker
            .stage(10, "Fetching repository information...", "repo_info")
            .await?;
        let repo = self.source.repo_info(&slug).await?;

        tracker.stage(15, "Analyzing languages...", "languages").await?;
        let languages = self.source.languages(&slug).await?;

        tracker
            .stage(20, "Fetching commit history...", "commits")
            .await?;
        let commits = collector::fetch_commits(
            self.source.as_ref(),
            &slug,
            options.max_commits,
            self.page_size,
        )
        .await?;
        if commits.is_empty() {
            return Err(AnalysisError::NotFound(
                "No commits found in repository".to_string(),
            ));
        }

        tracker
            .stage(30, "Analyzing contributors...", "contributors")
            .await?;
        let rate = collector::sample_rate(commits.len(), self.detail_budget);
        let mut aggregator = Aggregator::new();
        let mut details_fetched = 0usize;
        for (idx, commit) in commits.iter().enumerate() {
            aggregator.record_commit(commit);
            if !options.deep_analysis || idx % rate != 0 {
                continue;
            }
            match self.source.commit_detail(&slug, &commit.sha).await {
                Ok(detail) => {
                    aggregator.record_detail(commit, &detail);
                    details_fetched += 1;
                    collector::pace(self.pacing.detail).await;
                }
                Err(err) => {
                    tracing::warn!(workspace_id = %workspace_id, sha = %commit.sha, error = %err, "skipping commit detail");
                }
            }
        }
        let aggregation = aggregator.finish();
        let files = aggregation.file_paths();
        tracing::debug!(
            workspace_id = %workspace_id,
            commits = commits.len(),
            details_fetched,
            files = files.len(),
            "aggregation complete"
        );

        tracker
            .stage(45, "Generating project summary...", "ai_summary")
            .await?;
        let project_summary = self.narrator.summary(&repo, &languages, &files).await;
        collector::pace(self.pacing.phase).await;

        tracker
            .stage(50, "Analyzing contributor expertise...", "ai_contributors")
            .await?;
        let now = Utc::now();
        let total = aggregation.contributors.len();
        let mut contributors = Vec::with_capacity(total);
        for (idx, record) in aggregation.contributors.iter().enumerate() {
            let files_worked = record.files_worked();
            let (first, last) = record
                .date_range()
                .unwrap_or_else(|| ("Unknown".to_string(), "Unknown".to_string()));
            let narrative = self
                .narrator
                .contributor(&ContributorEvidence {
                    username: &record.username,
                    total_commits: record.total_commits(),
                    files_worked: &files_worked,
                    messages: &record.messages,
                    first_commit_date: &first,
                    last_commit_date: &last,
                })
                .await;
            contributors.push(report::contributor_analysis(
                record,
                &aggregation,
                narrative,
                now,
            ));

            let progress = 50 + (30 * (idx + 1) / total.max(1)) as u8;
            tracker
                .stage(
                    progress,
                    &format!("Analyzed {}/{} contributors", idx + 1, total),
                    "ai_contributors",
                )
                .await?;
            if idx + 1 < total {
                collector::pace(self.pacing.contributor).await;
            }
        }
        report::rank_contributors(&mut contributors);

        tracker
            .stage(85, "Identifying stale files...", "stale_files")
            .await?;
        let stale = risk::stale_files(&aggregation.files, now);

        tracker
            .stage(88, "Identifying hot spots...", "hot_spots")
            .await?;
        let hot = risk::hot_spots(&aggregation.files);

        tracker
            .stage(92, "Analyzing codebase health...", "ai_health")
            .await?;
        collector::pace(self.pacing.phase).await;
        let distribution = risk::knowledge_distribution(&aggregation);
        let health_narrative = self
            .narrator
            .health(&HealthEvidence {
                total_files: files.len(),
                total_commits: commits.len(),
                contributor_count: total,
                stale_file_count: stale.len(),
                hot_spot_count: hot.len(),
                knowledge_distribution: &distribution,
            })
            .await;
        let (codebase_health, recommendations) =
            report::codebase_health(&aggregation, stale, hot, health_narrative);

        let repository_name = if repo.full_name.is_empty() {
            slug.to_string()
        } else {
            repo.full_name.clone()
        };
        let report = Arc::new(AnalysisReport {
            workspace_id: workspace_id.clone(),
            repository_name,
            repository_url: url.to_string(),
            project_summary,
            primary_languages: report::primary_languages(&languages),
            contributors,
            codebase_health,
            recommendations,
            analysis_timestamp: Utc::now().to_rfc3339(),
            metadata: RepoMetadata::from_repo(&repo, commits.len()),
        });

        self.store.put_result(report.clone()).await?;
        tracker.stage(100, "Analysis complete!", "completed").await?;
        tracing::info!(
            workspace_id = %workspace_id,
            contributors = report.contributors.len(),
            files = report.codebase_health.total_files,
            "analysis complete"
        );
        Ok(report)
    }
}
