//! Core data models used throughout Repo Insight.
//!
//! Two groups of types live here: the raw inputs fetched from the
//! source-control API ([`Commit`], [`CommitDetail`], [`RepoInfo`]) and the
//! report shapes returned to callers ([`AnalysisReport`] and its parts,
//! plus the [`JobStatus`] record used for polling).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Email recorded when the source-control API omits one.
pub const UNKNOWN_EMAIL: &str = "unknown@example.com";

/// A single commit from the repository's history listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub sha: String,
    /// Platform account login, when the commit is linked to one.
    pub login: Option<String>,
    /// Raw author name from the commit itself.
    pub author_name: String,
    pub author_email: String,
    pub message: String,
    /// Author date as reported by the API (ISO-8601).
    pub timestamp: String,
}

impl Commit {
    /// Resolved contributor identity: the platform login if present,
    /// otherwise the raw author name.
    pub fn author_identity(&self) -> &str {
        match self.login.as_deref() {
            Some(login) if !login.is_empty() => login,
            _ => &self.author_name,
        }
    }
}

/// Line counts for one file touched by a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub filename: String,
    pub additions: u64,
    pub deletions: u64,
}

impl FileChange {
    pub fn changes(&self) -> u64 {
        self.additions + self.deletions
    }
}

/// Per-file detail for one commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitDetail {
    pub files: Vec<FileChange>,
}

/// Repository metadata. Deserializes directly from the GitHub
/// `GET /repos/{owner}/{repo}` response; unknown fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoInfo {
    pub full_name: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub stargazers_count: u64,
    pub forks_count: u64,
    pub open_issues_count: u64,
    pub default_branch: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub size: u64,
}

/// Language name → bytes of code.
pub type LanguageBreakdown = BTreeMap<String, u64>;

// ============ Classifications ============

/// Knowledge-concentration risk, shared by contributors, stale files,
/// and the codebase as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Critical,
    High,
    Medium,
    Low,
}

impl RiskLevel {
    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::Critical => "Critical",
            RiskLevel::High => "High",
            RiskLevel::Medium => "Medium",
            RiskLevel::Low => "Low",
        }
    }

    /// Parse a label as produced by the narrative model. Case-insensitive.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "critical" => Some(RiskLevel::Critical),
            "high" => Some(RiskLevel::High),
            "medium" => Some(RiskLevel::Medium),
            "low" => Some(RiskLevel::Low),
            _ => None,
        }
    }
}

/// How central a contributor is to the project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpertiseLevel {
    Core,
    Major,
    Minor,
}

impl ExpertiseLevel {
    pub fn label(&self) -> &'static str {
        match self {
            ExpertiseLevel::Core => "Core",
            ExpertiseLevel::Major => "Major",
            ExpertiseLevel::Minor => "Minor",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "core" => Some(ExpertiseLevel::Core),
            "major" => Some(ExpertiseLevel::Major),
            "minor" => Some(ExpertiseLevel::Minor),
            _ => None,
        }
    }
}

/// Change-frequency label for a hot spot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeFrequency {
    High,
    #[serde(rename = "Very High")]
    VeryHigh,
}

impl ChangeFrequency {
    pub fn label(&self) -> &'static str {
        match self {
            ChangeFrequency::High => "High",
            ChangeFrequency::VeryHigh => "Very High",
        }
    }
}

// ============ Job status ============

/// Lifecycle state of one analysis job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobState {
    /// Whether the job may still produce a result.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, JobState::Pending | JobState::Processing)
    }
}

/// Pollable status record for a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub workspace_id: String,
    pub status: JobState,
    pub progress: u8,
    pub message: String,
    pub current_step: String,
    pub estimated_time_remaining: Option<u64>,
}

impl JobStatus {
    /// Freshly submitted job.
    pub fn pending(workspace_id: impl Into<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            status: JobState::Pending,
            progress: 0,
            message: "Starting analysis...".to_string(),
            current_step: "initialization".to_string(),
            estimated_time_remaining: None,
        }
    }

    /// A stage boundary. Progress 100 marks the job completed; anything
    /// lower means it is still processing.
    pub fn at_stage(
        workspace_id: impl Into<String>,
        progress: u8,
        message: impl Into<String>,
        step: impl Into<String>,
    ) -> Self {
        let progress = progress.min(100);
        Self {
            workspace_id: workspace_id.into(),
            status: if progress < 100 {
                JobState::Processing
            } else {
                JobState::Completed
            },
            progress,
            message: message.into(),
            current_step: step.into(),
            estimated_time_remaining: None,
        }
    }

    pub fn failed(workspace_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            status: JobState::Failed,
            progress: 0,
            message: message.into(),
            current_step: "error".to_string(),
            estimated_time_remaining: None,
        }
    }
}

// ============ Report ============

/// One file in a contributor's footprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileContribution {
    pub file_path: String,
    pub lines_contributed: u64,
    pub total_lines: u64,
    pub ownership_percentage: f64,
    pub last_modified: String,
    pub commits_count: u64,
    pub file_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributorAnalysis {
    pub username: String,
    pub email: String,
    pub total_commits: u64,
    pub files_contributed: Vec<FileContribution>,
    pub knowledge_areas: Vec<String>,
    pub expertise_level: ExpertiseLevel,
    pub contribution_summary: String,
    pub bus_factor_risk: RiskLevel,
    pub lines_added: u64,
    pub lines_deleted: u64,
    pub first_commit_date: String,
    pub last_commit_date: String,
    pub active_days: i64,
    pub commit_frequency: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaleFile {
    pub file_path: String,
    pub last_modified: String,
    pub days_since_modified: i64,
    pub last_contributor: String,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotSpot {
    pub file_path: String,
    pub commit_count: u64,
    pub contributor_count: usize,
    pub last_modified: String,
    pub change_frequency: ChangeFrequency,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodebaseHealth {
    pub total_files: usize,
    pub total_commits: usize,
    pub active_contributors: usize,
    pub stale_files: Vec<StaleFile>,
    pub hot_spots: Vec<HotSpot>,
    pub maintenance_concerns: Vec<String>,
    /// Directory → number of touched files.
    pub code_concentration: BTreeMap<String, usize>,
    pub overall_bus_factor: u32,
    pub risk_assessment: RiskLevel,
    /// Contributor → commit count, for the most active contributors.
    pub knowledge_distribution: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoMetadata {
    pub stars: u64,
    pub forks: u64,
    pub open_issues: u64,
    pub default_branch: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub size_kb: u64,
    pub commits_analyzed: usize,
}

impl RepoMetadata {
    pub fn from_repo(repo: &RepoInfo, commits_analyzed: usize) -> Self {
        Self {
            stars: repo.stargazers_count,
            forks: repo.forks_count,
            open_issues: repo.open_issues_count,
            default_branch: repo
                .default_branch
                .clone()
                .unwrap_or_else(|| "main".to_string()),
            created_at: repo.created_at.clone(),
            updated_at: repo.updated_at.clone(),
            size_kb: repo.size,
            commits_analyzed,
        }
    }
}

/// The final report for one workspace. Written to the store once and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub workspace_id: String,
    pub repository_name: String,
    pub repository_url: String,
    pub project_summary: String,
    pub primary_languages: Vec<String>,
    pub contributors: Vec<ContributorAnalysis>,
    pub codebase_health: CodebaseHealth,
    pub recommendations: Vec<String>,
    pub analysis_timestamp: String,
    pub metadata: RepoMetadata,
}
