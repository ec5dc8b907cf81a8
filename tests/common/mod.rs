//! In-memory collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, SecondsFormat, Utc};

use repo_insight::collector::{RepoSlug, SourceControl};
use repo_insight::error::{GenerationError, SourceError};
use repo_insight::generator::TextGenerator;
use repo_insight::jobs::JobOrchestrator;
use repo_insight::narrative::NarrativeGenerator;
use repo_insight::pipeline::Pipeline;
use repo_insight::progress::{ProgressEvent, ProgressReporter};
use repo_insight_core::models::{
    Commit, CommitDetail, FileChange, LanguageBreakdown, RepoInfo,
};
use repo_insight_core::store::memory::InMemoryStore;
use repo_insight_core::store::ResultStore;

pub const REPO_URL: &str = "https://github.com/octo/widgets";

pub fn days_ago(days: i64) -> String {
    (Utc::now() - Duration::days(days)).to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn commit(sha: &str, login: Option<&str>, name: &str, timestamp: &str) -> Commit {
    Commit {
        sha: sha.to_string(),
        login: login.map(str::to_string),
        author_name: name.to_string(),
        author_email: format!("{}@example.com", name.to_lowercase()),
        message: format!("change {}", sha),
        timestamp: timestamp.to_string(),
    }
}

pub fn detail(files: &[(&str, u64, u64)]) -> CommitDetail {
    CommitDetail {
        files: files
            .iter()
            .map(|(name, additions, deletions)| FileChange {
                filename: name.to_string(),
                additions: *additions,
                deletions: *deletions,
            })
            .collect(),
    }
}

/// How the fake fails `repo_info`.
#[derive(Clone, Debug)]
pub enum RepoFailure {
    NotFound,
    RateLimited,
    Upstream(u16, String),
}

pub struct FakeSource {
    pub repo: RepoInfo,
    pub languages: LanguageBreakdown,
    /// Newest first.
    pub commits: Vec<Commit>,
    /// Commits without an entry fail their detail fetch.
    pub details: HashMap<String, CommitDetail>,
    pub repo_failure: Option<RepoFailure>,
    /// Delay before every commit page is returned.
    pub page_delay: StdDuration,
    pub page_calls: AtomicUsize,
    pub detail_calls: AtomicUsize,
}

impl FakeSource {
    pub fn new(commits: Vec<Commit>) -> Self {
        Self {
            repo: RepoInfo {
                full_name: "octo/widgets".to_string(),
                description: Some("Widgets for everyone".to_string()),
                language: Some("Rust".to_string()),
                stargazers_count: 42,
                forks_count: 7,
                default_branch: Some("main".to_string()),
                ..Default::default()
            },
            languages: [("Rust".to_string(), 1000), ("Shell".to_string(), 10)]
                .into_iter()
                .collect(),
            commits,
            details: HashMap::new(),
            repo_failure: None,
            page_delay: StdDuration::ZERO,
            page_calls: AtomicUsize::new(0),
            detail_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_detail(mut self, sha: &str, detail: CommitDetail) -> Self {
        self.details.insert(sha.to_string(), detail);
        self
    }

    pub fn with_page_delay(mut self, delay: StdDuration) -> Self {
        self.page_delay = delay;
        self
    }

    /// Detail for every commit: commit `s{i}` touches `f{i % files}.rs`.
    pub fn with_rotating_details(mut self, files: usize) -> Self {
        let shas: Vec<String> = self.commits.iter().map(|c| c.sha.clone()).collect();
        for (i, sha) in shas.iter().enumerate() {
            let path = format!("f{}.rs", i % files.max(1));
            self.details.insert(sha.clone(), detail(&[(path.as_str(), 1, 0)]));
        }
        self
    }

    pub fn failing(mut self, failure: RepoFailure) -> Self {
        self.repo_failure = Some(failure);
        self
    }
}

#[async_trait]
impl SourceControl for FakeSource {
    async fn repo_info(&self, slug: &RepoSlug) -> Result<RepoInfo, SourceError> {
        match &self.repo_failure {
            None => Ok(self.repo.clone()),
            Some(RepoFailure::NotFound) => Err(SourceError::NotFound(format!(
                "Resource not found: /repos/{}",
                slug
            ))),
            Some(RepoFailure::RateLimited) => Err(SourceError::RateLimited),
            Some(RepoFailure::Upstream(status, body)) => Err(SourceError::Upstream {
                status: *status,
                body: body.clone(),
            }),
        }
    }

    async fn languages(&self, _slug: &RepoSlug) -> Result<LanguageBreakdown, SourceError> {
        Ok(self.languages.clone())
    }

    async fn commits_page(
        &self,
        _slug: &RepoSlug,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Commit>, SourceError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        if !self.page_delay.is_zero() {
            tokio::time::sleep(self.page_delay).await;
        }
        let start = ((page - 1) * per_page) as usize;
        Ok(self
            .commits
            .iter()
            .skip(start)
            .take(per_page as usize)
            .cloned()
            .collect())
    }

    async fn commit_detail(&self, _slug: &RepoSlug, sha: &str) -> Result<CommitDetail, SourceError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        self.details.get(sha).cloned().ok_or(SourceError::Upstream {
            status: 500,
            body: "detail unavailable".to_string(),
        })
    }
}

/// Replies with the same text to every prompt, or fails every call.
pub struct FakeGenerator {
    reply: Option<String>,
    pub calls: AtomicUsize,
}

impl FakeGenerator {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Some(text.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(&self, _prompt: &str, _temperature: f32) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone().ok_or(GenerationError::Timeout)
    }

    fn is_configured(&self) -> bool {
        self.reply.is_some()
    }
}

/// Records every progress value it sees.
#[derive(Default)]
pub struct Recorder {
    pub events: Mutex<Vec<ProgressEvent>>,
}

impl Recorder {
    pub fn progress(&self) -> Vec<u8> {
        self.events.lock().unwrap().iter().map(|e| e.progress).collect()
    }
}

impl ProgressReporter for Recorder {
    fn report(&self, event: &ProgressEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Three contributors over three files, all commits detail-fetched.
///
/// - `src/lib.rs`: alice ×4, bob ×2
/// - `README.md`: alice ×1
/// - `docs/guide.md`: Carol ×1, 400 days ago
pub fn sample_source() -> FakeSource {
    let commits = vec![
        commit("c1", Some("alice"), "Alice", &days_ago(1)),
        commit("c2", Some("bob"), "Bob", &days_ago(2)),
        commit("c3", Some("alice"), "Alice", &days_ago(3)),
        commit("c4", Some("alice"), "Alice", &days_ago(5)),
        commit("c5", Some("bob"), "Bob", &days_ago(8)),
        commit("c6", Some("alice"), "Alice", &days_ago(13)),
        commit("c7", None, "Carol", &days_ago(400)),
    ];
    FakeSource::new(commits)
        .with_detail("c1", detail(&[("src/lib.rs", 10, 2)]))
        .with_detail("c2", detail(&[("src/lib.rs", 3, 3)]))
        .with_detail("c3", detail(&[("src/lib.rs", 1, 0), ("README.md", 5, 0)]))
        .with_detail("c4", detail(&[("src/lib.rs", 2, 2)]))
        .with_detail("c5", detail(&[("src/lib.rs", 4, 1)]))
        .with_detail("c6", detail(&[("src/lib.rs", 8, 0)]))
        .with_detail("c7", detail(&[("docs/guide.md", 20, 0)]))
}

pub struct Harness {
    pub source: Arc<FakeSource>,
    pub generator: Arc<FakeGenerator>,
    pub store: Arc<dyn ResultStore>,
    pub pipeline: Pipeline,
}

pub fn harness(source: FakeSource, generator: FakeGenerator) -> Harness {
    let source = Arc::new(source);
    let generator = Arc::new(generator);
    let store: Arc<dyn ResultStore> = Arc::new(InMemoryStore::new());
    let pipeline = Pipeline::new(
        source.clone(),
        NarrativeGenerator::new(generator.clone()),
        store.clone(),
    );
    Harness {
        source,
        generator,
        store,
        pipeline,
    }
}

pub fn orchestrator(source: FakeSource, generator: FakeGenerator) -> (JobOrchestrator, Harness) {
    let h = harness(source, generator);
    (JobOrchestrator::new(h.pipeline.clone(), 1000), h)
}
