//! Risk heuristics derived from aggregated statistics.
//!
//! Everything here is a pure function of an [`Aggregation`] (plus "now"),
//! so classification thresholds are easy to pin down in tests. The
//! fallback bus factor and expertise heuristics are only used when the
//! narrative model is unavailable.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::aggregate::{parse_timestamp, Aggregation, ContributorRecord, FileMetadata};
use crate::models::{
    ChangeFrequency, ExpertiseLevel, FileContribution, HotSpot, RiskLevel, StaleFile,
};

/// Files untouched for longer than this many days are stale.
pub const STALE_AFTER_DAYS: i64 = 180;
/// Stale files untouched for longer than this are high risk.
pub const HIGH_RISK_STALE_DAYS: i64 = 365;
/// Files with more sampled commits than this are hot spots.
pub const HOT_SPOT_COMMITS: u64 = 10;
/// Hot spots with more sampled commits than this change "Very High".
pub const VERY_HIGH_COMMITS: u64 = 50;
/// Files listed per contributor in the report.
pub const MAX_FILES_PER_CONTRIBUTOR: usize = 20;
/// Directories listed in the code concentration map.
pub const MAX_CONCENTRATION_DIRS: usize = 10;
/// Contributors listed in the knowledge distribution map.
pub const MAX_DISTRIBUTION_CONTRIBUTORS: usize = 10;

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Share of a file's sampled commits made by one contributor, in percent
/// rounded to two decimals.
pub fn ownership_percentage(contributor_commits: u64, file_commits: u64) -> f64 {
    if file_commits == 0 {
        return 0.0;
    }
    round2(contributor_commits as f64 / file_commits as f64 * 100.0)
}

/// Extension after the last `.`, or `"unknown"`.
pub fn file_type(path: &str) -> String {
    match path.rsplit_once('.') {
        Some((_, ext)) => ext.to_string(),
        None => "unknown".to_string(),
    }
}

/// Footprint of one contributor: their most-committed files with
/// ownership relative to the sampled file totals.
pub fn file_contributions(
    record: &ContributorRecord,
    files: &BTreeMap<String, FileMetadata>,
) -> Vec<FileContribution> {
    record
        .files_worked()
        .into_iter()
        .take(MAX_FILES_PER_CONTRIBUTOR)
        .map(|worked| {
            let meta = files.get(&worked.path);
            let file_commits = meta.map(|m| m.commit_count).unwrap_or(0);
            FileContribution {
                file_type: file_type(&worked.path),
                ownership_percentage: ownership_percentage(worked.commits, file_commits),
                lines_contributed: worked.changes,
                total_lines: meta.map(|m| m.total_changes).unwrap_or(0),
                last_modified: meta
                    .and_then(|m| m.last_modified.clone())
                    .unwrap_or_else(|| "Unknown".to_string()),
                commits_count: worked.commits,
                file_path: worked.path,
            }
        })
        .collect()
}

/// Staleness risk for a file untouched for `days`, or `None` if it is
/// still fresh.
pub fn classify_staleness(days: i64) -> Option<RiskLevel> {
    if days > HIGH_RISK_STALE_DAYS {
        Some(RiskLevel::High)
    } else if days > STALE_AFTER_DAYS {
        Some(RiskLevel::Medium)
    } else {
        None
    }
}

/// Files whose newest sampled change is older than the threshold, most
/// stale first. Files without a usable timestamp are skipped.
pub fn stale_files(files: &BTreeMap<String, FileMetadata>, now: DateTime<Utc>) -> Vec<StaleFile> {
    let mut stale: Vec<StaleFile> = files
        .iter()
        .filter_map(|(path, meta)| {
            let raw = meta.last_modified.as_ref()?;
            let Some(modified) = parse_timestamp(raw) else {
                tracing::warn!(file = %path, timestamp = %raw, "skipping file with unparseable date");
                return None;
            };
            let days = (now - modified).num_days();
            let risk_level = classify_staleness(days)?;
            Some(StaleFile {
                file_path: path.clone(),
                last_modified: raw.clone(),
                days_since_modified: days,
                last_contributor: meta
                    .last_contributor
                    .clone()
                    .or_else(|| meta.contributors.iter().next().cloned())
                    .unwrap_or_else(|| "Unknown".to_string()),
                risk_level,
            })
        })
        .collect();
    stale.sort_by(|a, b| {
        b.days_since_modified
            .cmp(&a.days_since_modified)
            .then_with(|| a.file_path.cmp(&b.file_path))
    });
    stale
}

pub fn classify_hot_spot(commit_count: u64) -> Option<ChangeFrequency> {
    if commit_count > VERY_HIGH_COMMITS {
        Some(ChangeFrequency::VeryHigh)
    } else if commit_count > HOT_SPOT_COMMITS {
        Some(ChangeFrequency::High)
    } else {
        None
    }
}

/// Frequently changed files, most commits first.
pub fn hot_spots(files: &BTreeMap<String, FileMetadata>) -> Vec<HotSpot> {
    let mut spots: Vec<HotSpot> = files
        .iter()
        .filter_map(|(path, meta)| {
            let change_frequency = classify_hot_spot(meta.commit_count)?;
            Some(HotSpot {
                file_path: path.clone(),
                commit_count: meta.commit_count,
                contributor_count: meta.contributors.len(),
                last_modified: meta
                    .last_modified
                    .clone()
                    .unwrap_or_else(|| "Unknown".to_string()),
                change_frequency,
            })
        })
        .collect();
    spots.sort_by(|a, b| {
        b.commit_count
            .cmp(&a.commit_count)
            .then_with(|| a.file_path.cmp(&b.file_path))
    });
    spots
}

/// Bus factor estimate when the narrative model gives none: half the
/// contributors, clamped to `1..=10`.
pub fn fallback_bus_factor(contributor_count: usize) -> u32 {
    (contributor_count / 2).clamp(1, 10) as u32
}

/// Risk band for a bus factor on the fixed 1–10 scale.
pub fn bus_factor_risk(bus_factor: u32) -> RiskLevel {
    match bus_factor {
        0..=2 => RiskLevel::Critical,
        3..=4 => RiskLevel::High,
        5..=7 => RiskLevel::Medium,
        _ => RiskLevel::Low,
    }
}

/// Expertise and knowledge risk from commit volume alone.
pub fn fallback_expertise(total_commits: u64) -> (ExpertiseLevel, RiskLevel) {
    if total_commits >= 100 {
        (ExpertiseLevel::Core, RiskLevel::High)
    } else if total_commits >= 30 {
        (ExpertiseLevel::Major, RiskLevel::Medium)
    } else {
        (ExpertiseLevel::Minor, RiskLevel::Low)
    }
}

/// Parent directory of a path, `"root"` for top-level files.
pub fn directory_of(path: &str) -> String {
    match path.rsplit_once('/') {
        Some((dir, _)) if !dir.is_empty() => dir.to_string(),
        _ => "root".to_string(),
    }
}

/// Touched files per directory, limited to the first
/// [`MAX_CONCENTRATION_DIRS`] directories in sorted order.
pub fn code_concentration<'a>(paths: impl IntoIterator<Item = &'a String>) -> BTreeMap<String, usize> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for path in paths {
        *counts.entry(directory_of(path)).or_default() += 1;
    }
    counts.into_iter().take(MAX_CONCENTRATION_DIRS).collect()
}

/// Commit counts of the most active contributors.
pub fn knowledge_distribution(aggregation: &Aggregation) -> BTreeMap<String, u64> {
    let mut ranked: Vec<(&str, u64)> = aggregation
        .contributors
        .iter()
        .map(|c| (c.username.as_str(), c.total_commits()))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(MAX_DISTRIBUTION_CONTRIBUTORS)
        .map(|(name, commits)| (name.to_string(), commits))
        .collect()
}
