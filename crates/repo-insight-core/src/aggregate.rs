//! Incremental aggregation of commit history.
//!
//! The [`Aggregator`] is fed commits newest-first, exactly as the
//! source-control API lists them. Every commit lands in its author's
//! [`ContributorRecord`]; commits that were detail-fetched additionally
//! feed per-file statistics via [`Aggregator::record_detail`].
//!
//! Because detail fetching is sampled, file-level numbers describe the
//! sample, not the full history. For every file,
//! `FileMetadata::commit_count` is at least the sum of the per-contributor
//! commit counts recorded for that file.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::models::{Commit, CommitDetail};

/// Most commit messages kept per contributor as prompt evidence.
pub const MAX_MESSAGE_SAMPLES: usize = 20;
/// Longest commit message sample, in characters.
pub const MAX_MESSAGE_CHARS: usize = 100;

/// Parse an API timestamp. Accepts RFC 3339 (`Z` or offset) and naive
/// `YYYY-MM-DDTHH:MM:SS[.fff]`, which is taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Per-contributor counters for one file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileStats {
    pub commits: u64,
    pub changes: u64,
}

/// One entry of a contributor's footprint, ready for prompting and
/// ownership computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileWorked {
    pub path: String,
    pub commits: u64,
    pub changes: u64,
}

/// Activity window of a contributor.
#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    pub first_commit_date: String,
    pub last_commit_date: String,
    pub active_days: i64,
    pub commit_frequency: f64,
}

/// Everything known about one resolved author identity.
#[derive(Debug, Clone)]
pub struct ContributorRecord {
    pub username: String,
    /// Distinct emails, in first-seen order.
    pub emails: Vec<String>,
    pub commits: Vec<Commit>,
    pub files: BTreeMap<String, FileStats>,
    pub lines_added: u64,
    pub lines_deleted: u64,
    /// Up to [`MAX_MESSAGE_SAMPLES`] messages, each at most
    /// [`MAX_MESSAGE_CHARS`] characters.
    pub messages: Vec<String>,
}

impl ContributorRecord {
    fn new(username: &str) -> Self {
        Self {
            username: username.to_string(),
            emails: Vec::new(),
            commits: Vec::new(),
            files: BTreeMap::new(),
            lines_added: 0,
            lines_deleted: 0,
            messages: Vec::new(),
        }
    }

    pub fn total_commits(&self) -> u64 {
        self.commits.len() as u64
    }

    pub fn primary_email(&self) -> &str {
        self.emails
            .first()
            .map(String::as_str)
            .unwrap_or(crate::models::UNKNOWN_EMAIL)
    }

    /// Files this contributor touched in the sample, most-committed first.
    pub fn files_worked(&self) -> Vec<FileWorked> {
        let mut files: Vec<FileWorked> = self
            .files
            .iter()
            .map(|(path, stats)| FileWorked {
                path: path.clone(),
                commits: stats.commits,
                changes: stats.changes,
            })
            .collect();
        files.sort_by(|a, b| b.commits.cmp(&a.commits).then_with(|| a.path.cmp(&b.path)));
        files
    }

    /// Raw timestamps of the earliest and latest commits, ordered by
    /// instant. When any timestamp fails to parse, the raw strings are
    /// compared instead.
    pub fn date_range(&self) -> Option<(String, String)> {
        let parsed: Option<Vec<(DateTime<Utc>, &String)>> = self
            .commits
            .iter()
            .map(|c| parse_timestamp(&c.timestamp).map(|at| (at, &c.timestamp)))
            .collect();
        if let Some(stamps) = parsed {
            let first = stamps.iter().min_by_key(|(at, _)| *at)?;
            let last = stamps.iter().max_by_key(|(at, _)| *at)?;
            return Some((first.1.clone(), last.1.clone()));
        }
        let first = self.commits.iter().map(|c| &c.timestamp).min()?;
        let last = self.commits.iter().map(|c| &c.timestamp).max()?;
        Some((first.clone(), last.clone()))
    }

    /// Active days (inclusive, at least 1) and commits per active day.
    ///
    /// If any timestamp fails to parse the window degrades to zero days
    /// and zero frequency, and a warning is logged.
    pub fn activity(&self, now: DateTime<Utc>) -> Activity {
        let now_iso = now.to_rfc3339();
        let (first_raw, last_raw) = self
            .date_range()
            .unwrap_or_else(|| (now_iso.clone(), now_iso.clone()));

        let parsed: Option<Vec<DateTime<Utc>>> = self
            .commits
            .iter()
            .map(|c| parse_timestamp(&c.timestamp))
            .collect();

        let window = parsed.and_then(|stamps| {
            let first = stamps.iter().min()?;
            let last = stamps.iter().max()?;
            Some((*first, *last))
        });

        match window {
            Some((first, last)) => {
                let active_days = ((last - first).num_days() + 1).max(1);
                Activity {
                    first_commit_date: first_raw,
                    last_commit_date: last_raw,
                    active_days,
                    commit_frequency: self.total_commits() as f64 / active_days as f64,
                }
            }
            None => {
                if !self.commits.is_empty() {
                    tracing::warn!(
                        contributor = %self.username,
                        "could not parse commit dates; activity window left empty"
                    );
                }
                Activity {
                    first_commit_date: first_raw,
                    last_commit_date: last_raw,
                    active_days: 0,
                    commit_frequency: 0.0,
                }
            }
        }
    }
}

/// Sampled statistics for one file path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileMetadata {
    pub contributors: BTreeSet<String>,
    pub commit_count: u64,
    /// Timestamp of the first sampled commit seen touching this file,
    /// which is the newest one because input arrives newest-first.
    pub last_modified: Option<String>,
    /// Author of the commit that set `last_modified`.
    pub last_contributor: Option<String>,
    pub total_changes: u64,
}

/// Folds the commit stream into contributor and file statistics.
#[derive(Debug, Default)]
pub struct Aggregator {
    contributors: Vec<ContributorRecord>,
    index: HashMap<String, usize>,
    files: BTreeMap<String, FileMetadata>,
    total_commits: usize,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn contributor_mut(&mut self, username: &str) -> &mut ContributorRecord {
        let idx = match self.index.get(username) {
            Some(idx) => *idx,
            None => {
                self.contributors.push(ContributorRecord::new(username));
                let idx = self.contributors.len() - 1;
                self.index.insert(username.to_string(), idx);
                idx
            }
        };
        &mut self.contributors[idx]
    }

    /// Record author, email, message and date of a listed commit.
    pub fn record_commit(&mut self, commit: &Commit) {
        self.total_commits += 1;
        let record = self.contributor_mut(commit.author_identity());
        if !record.emails.iter().any(|e| e == &commit.author_email) {
            record.emails.push(commit.author_email.clone());
        }
        if record.messages.len() < MAX_MESSAGE_SAMPLES {
            record
                .messages
                .push(commit.message.chars().take(MAX_MESSAGE_CHARS).collect());
        }
        record.commits.push(commit.clone());
    }

    /// Record the file-level detail of a sampled commit. The commit
    /// itself must already have gone through [`record_commit`](Self::record_commit).
    pub fn record_detail(&mut self, commit: &Commit, detail: &CommitDetail) {
        let author = commit.author_identity().to_string();

        let record = self.contributor_mut(&author);
        for file in &detail.files {
            let stats = record.files.entry(file.filename.clone()).or_default();
            stats.commits += 1;
            stats.changes += file.changes();
            record.lines_added += file.additions;
            record.lines_deleted += file.deletions;
        }

        for file in &detail.files {
            let meta = self.files.entry(file.filename.clone()).or_default();
            meta.contributors.insert(author.clone());
            meta.commit_count += 1;
            meta.total_changes += file.changes();
            if meta.last_modified.is_none() {
                meta.last_modified = Some(commit.timestamp.clone());
                meta.last_contributor = Some(author.clone());
            }
        }
    }

    pub fn finish(self) -> Aggregation {
        Aggregation {
            contributors: self.contributors,
            files: self.files,
            total_commits: self.total_commits,
        }
    }
}

/// Output of the aggregation stage.
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    /// One record per resolved identity, in first-seen order.
    pub contributors: Vec<ContributorRecord>,
    pub files: BTreeMap<String, FileMetadata>,
    pub total_commits: usize,
}

impl Aggregation {
    /// All sampled file paths, sorted.
    pub fn file_paths(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }

    pub fn contributor(&self, username: &str) -> Option<&ContributorRecord> {
        self.contributors.iter().find(|c| c.username == username)
    }
}
