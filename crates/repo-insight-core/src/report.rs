//! Report assembly from aggregated statistics and resolved narratives.

use chrono::{DateTime, Utc};

use crate::aggregate::{Aggregation, ContributorRecord};
use crate::models::{
    CodebaseHealth, ContributorAnalysis, HotSpot, LanguageBreakdown, StaleFile,
};
use crate::narrative::{ContributorNarrative, HealthNarrative};
use crate::risk;

/// Languages listed in a report.
pub const MAX_PRIMARY_LANGUAGES: usize = 5;
/// Stale files and hot spots listed in a report.
pub const MAX_REPORTED_FILES: usize = 20;
/// Longest failure message recorded on a job.
pub const MAX_FAILURE_CHARS: usize = 200;

/// Top languages by bytes of code, largest first.
pub fn primary_languages(languages: &LanguageBreakdown) -> Vec<String> {
    let mut ranked: Vec<(&String, &u64)> = languages.iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(MAX_PRIMARY_LANGUAGES)
        .map(|(name, _)| name.clone())
        .collect()
}

/// Truncate a failure message to [`MAX_FAILURE_CHARS`] characters,
/// appending `...` when anything was cut.
pub fn truncate_failure(message: &str) -> String {
    if message.chars().count() <= MAX_FAILURE_CHARS {
        return message.to_string();
    }
    let mut out: String = message.chars().take(MAX_FAILURE_CHARS).collect();
    out.push_str("...");
    out
}

pub fn contributor_analysis(
    record: &ContributorRecord,
    aggregation: &Aggregation,
    narrative: ContributorNarrative,
    now: DateTime<Utc>,
) -> ContributorAnalysis {
    let activity = record.activity(now);
    ContributorAnalysis {
        username: record.username.clone(),
        email: record.primary_email().to_string(),
        total_commits: record.total_commits(),
        files_contributed: risk::file_contributions(record, &aggregation.files),
        knowledge_areas: narrative.knowledge_areas,
        expertise_level: narrative.expertise_level,
        contribution_summary: narrative.contribution_summary,
        bus_factor_risk: narrative.bus_factor_risk,
        lines_added: record.lines_added,
        lines_deleted: record.lines_deleted,
        first_commit_date: activity.first_commit_date,
        last_commit_date: activity.last_commit_date,
        active_days: activity.active_days,
        commit_frequency: risk::round2(activity.commit_frequency),
    }
}

/// Sort contributors by commit count, most active first. Ties keep their
/// first-seen order.
pub fn rank_contributors(contributors: &mut [ContributorAnalysis]) {
    contributors.sort_by(|a, b| b.total_commits.cmp(&a.total_commits));
}

pub fn codebase_health(
    aggregation: &Aggregation,
    mut stale: Vec<StaleFile>,
    mut hot: Vec<HotSpot>,
    narrative: HealthNarrative,
) -> (CodebaseHealth, Vec<String>) {
    stale.truncate(MAX_REPORTED_FILES);
    hot.truncate(MAX_REPORTED_FILES);
    let health = CodebaseHealth {
        total_files: aggregation.files.len(),
        total_commits: aggregation.total_commits,
        active_contributors: aggregation.contributors.len(),
        stale_files: stale,
        hot_spots: hot,
        maintenance_concerns: narrative.maintenance_concerns,
        code_concentration: risk::code_concentration(aggregation.files.keys()),
        overall_bus_factor: narrative.overall_bus_factor,
        risk_assessment: narrative.risk_assessment,
        knowledge_distribution: risk::knowledge_distribution(aggregation),
    };
    (health, narrative.recommendations)
}
