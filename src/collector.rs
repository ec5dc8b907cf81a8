//! Source-control data collection.
//!
//! [`SourceControl`] is the seam between the pipeline and the hosted
//! API; [`GitHubClient`] implements it over the GitHub REST v3 API with
//! `reqwest`. Pagination ([`fetch_commits`]) and detail sampling
//! ([`sample_rate`]) are written against the trait so they can be tested
//! with in-memory fakes.
//!
//! # Failure classification
//!
//! | Response | Error |
//! |----------|-------|
//! | 404 | [`SourceError::NotFound`] |
//! | 403, 429 | [`SourceError::RateLimited`] |
//! | timeout | [`SourceError::Timeout`] |
//! | other non-2xx | [`SourceError::Upstream`] |

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use repo_insight_core::models::{
    Commit, CommitDetail, FileChange, LanguageBreakdown, RepoInfo, UNKNOWN_EMAIL,
};

use crate::config::SourceConfig;
use crate::error::{AnalysisError, SourceError};

/// Owner and repository name parsed from a repository URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSlug {
    pub owner: String,
    pub repo: String,
}

impl RepoSlug {
    /// Parse `https://github.com/{owner}/{repo}[.git][/]`. Only the last
    /// two path segments matter, so bare `owner/repo` is accepted too.
    pub fn parse(url: &str) -> Result<Self, AnalysisError> {
        let trimmed = url.trim().trim_end_matches('/');
        let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
        let mut segments = trimmed.rsplit('/');
        let repo = segments.next().unwrap_or_default();
        let owner = segments.next().unwrap_or_default();
        if owner.is_empty() || repo.is_empty() || owner.ends_with(':') {
            return Err(AnalysisError::InvalidUrl(url.to_string()));
        }
        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Read access to a hosted repository.
#[async_trait]
pub trait SourceControl: Send + Sync {
    async fn repo_info(&self, slug: &RepoSlug) -> Result<RepoInfo, SourceError>;

    async fn languages(&self, slug: &RepoSlug) -> Result<LanguageBreakdown, SourceError>;

    /// One page of the commit listing, newest first. Pages start at 1.
    async fn commits_page(
        &self,
        slug: &RepoSlug,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Commit>, SourceError>;

    async fn commit_detail(&self, slug: &RepoSlug, sha: &str) -> Result<CommitDetail, SourceError>;

    /// Whether requests are authenticated.
    fn token_configured(&self) -> bool {
        false
    }
}

/// Page through the commit listing until a short page or `max` commits.
/// The result holds at most `max` commits.
pub async fn fetch_commits(
    source: &dyn SourceControl,
    slug: &RepoSlug,
    max: usize,
    per_page: u32,
) -> Result<Vec<Commit>, SourceError> {
    let mut commits = Vec::new();
    let mut page = 1;
    while commits.len() < max {
        let batch = source.commits_page(slug, page, per_page).await?;
        let short = batch.len() < per_page as usize;
        if batch.is_empty() {
            break;
        }
        commits.extend(batch);
        if short {
            break;
        }
        page += 1;
    }
    commits.truncate(max);
    tracing::debug!(repo = %slug, commits = commits.len(), pages = page, "fetched commit history");
    Ok(commits)
}

/// Detail-fetch every Nth commit so that about `budget` details are
/// fetched in total.
pub fn sample_rate(total_commits: usize, budget: usize) -> usize {
    (total_commits / budget.max(1)).max(1)
}

// ============ GitHub ============

#[derive(Deserialize)]
struct WireCommit {
    sha: String,
    #[serde(default)]
    commit: WireCommitBody,
    #[serde(default)]
    author: Option<WireAccount>,
}

#[derive(Deserialize, Default)]
struct WireCommitBody {
    #[serde(default)]
    author: Option<WirePerson>,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize, Default)]
struct WirePerson {
    name: Option<String>,
    email: Option<String>,
    date: Option<String>,
}

#[derive(Deserialize)]
struct WireAccount {
    login: Option<String>,
}

#[derive(Deserialize)]
struct WireDetail {
    #[serde(default)]
    files: Vec<WireFile>,
}

#[derive(Deserialize)]
struct WireFile {
    filename: String,
    #[serde(default)]
    additions: u64,
    #[serde(default)]
    deletions: u64,
}

impl From<WireCommit> for Commit {
    fn from(wire: WireCommit) -> Self {
        let person = wire.commit.author.unwrap_or_default();
        Commit {
            sha: wire.sha,
            login: wire.author.and_then(|a| a.login),
            author_name: person.name.unwrap_or_else(|| "Unknown".to_string()),
            author_email: person.email.unwrap_or_else(|| UNKNOWN_EMAIL.to_string()),
            message: wire.commit.message,
            timestamp: person.date.unwrap_or_default(),
        }
    }
}

/// Map a non-success status to a [`SourceError`].
pub fn classify_status(status: StatusCode, path: &str, body: String) -> SourceError {
    match status {
        StatusCode::NOT_FOUND => SourceError::NotFound(format!("Resource not found: {}", path)),
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => SourceError::RateLimited,
        other => SourceError::Upstream {
            status: other.as_u16(),
            body,
        },
    }
}

/// GitHub REST v3 client.
pub struct GitHubClient {
    client: reqwest::Client,
    base_url: String,
    has_token: bool,
}

impl GitHubClient {
    pub fn new(config: &SourceConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github.v3+json"),
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("repo-insight/{}", env!("CARGO_PKG_VERSION")))?,
        );
        let has_token = match config.token.as_deref() {
            Some(token) if !token.is_empty() => {
                let mut value = HeaderValue::from_str(&format!("Bearer {}", token))?;
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
                true
            }
            _ => false,
        };

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            has_token,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, SourceError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(&url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, path, body));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))
    }
}

#[async_trait]
impl SourceControl for GitHubClient {
    async fn repo_info(&self, slug: &RepoSlug) -> Result<RepoInfo, SourceError> {
        self.get_json(&format!("/repos/{}", slug), &[]).await
    }

    async fn languages(&self, slug: &RepoSlug) -> Result<LanguageBreakdown, SourceError> {
        self.get_json(&format!("/repos/{}/languages", slug), &[]).await
    }

    async fn commits_page(
        &self,
        slug: &RepoSlug,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Commit>, SourceError> {
        let wire: Vec<WireCommit> = self
            .get_json(
                &format!("/repos/{}/commits", slug),
                &[("page", page.to_string()), ("per_page", per_page.to_string())],
            )
            .await?;
        Ok(wire.into_iter().map(Commit::from).collect())
    }

    async fn commit_detail(&self, slug: &RepoSlug, sha: &str) -> Result<CommitDetail, SourceError> {
        let wire: WireDetail = self
            .get_json(&format!("/repos/{}/commits/{}", slug, sha), &[])
            .await?;
        Ok(CommitDetail {
            files: wire
                .files
                .into_iter()
                .map(|f| FileChange {
                    filename: f.filename,
                    additions: f.additions,
                    deletions: f.deletions,
                })
                .collect(),
        })
    }

    fn token_configured(&self) -> bool {
        self.has_token
    }
}

/// Pause between detail fetches.
pub async fn pace(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
