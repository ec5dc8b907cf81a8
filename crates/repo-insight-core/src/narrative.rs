//! Narrative prompts, tolerant response parsing, and field-by-field merge
//! with deterministic defaults.
//!
//! Calling the generative-text service happens in the app crate; this
//! module only turns statistics into prompt text and model output back
//! into typed values.
//!
//! # Parsing
//!
//! Model output is frequently wrapped in Markdown fences or surrounded by
//! prose. [`parse_narrative`] strips fence markers and tries to parse the
//! remainder; failing that, it tries the span from the first `{` to the
//! last `}`. The result is a [`Narrative`]: either a parsed JSON object or
//! the raw text.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::aggregate::FileWorked;
use crate::models::{ExpertiseLevel, LanguageBreakdown, RepoInfo, RiskLevel};
use crate::risk;

/// File paths included in the project summary prompt.
pub const MAX_PROMPT_FILES: usize = 50;
/// Files-worked entries included in a contributor prompt.
pub const MAX_PROMPT_FILES_WORKED: usize = 30;
/// Commit messages included in a contributor prompt.
pub const MAX_PROMPT_MESSAGES: usize = 20;

/// Temperature for the free-text project summary.
pub const SUMMARY_TEMPERATURE: f32 = 0.3;
/// Temperature for prompts that must return JSON.
pub const STRUCTURED_TEMPERATURE: f32 = 0.2;

/// Parsed model output.
#[derive(Debug, Clone, PartialEq)]
pub enum Narrative {
    Parsed(Map<String, Value>),
    Unparseable(String),
}

impl Narrative {
    pub fn is_parsed(&self) -> bool {
        matches!(self, Narrative::Parsed(_))
    }
}

fn strip_fences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find("```") {
        out.push_str(&rest[..pos]);
        rest = &rest[pos + 3..];
        // Drop an optional language tag (```json) and the whitespace after it.
        if let Some(tail) = rest.strip_prefix("json") {
            rest = tail;
        }
        rest = rest.trim_start();
    }
    out.push_str(rest);
    out.trim().to_string()
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Parse model output into a JSON object, tolerating fences and prose.
pub fn parse_narrative(text: &str) -> Narrative {
    let cleaned = strip_fences(text);
    if let Some(map) = parse_object(&cleaned) {
        return Narrative::Parsed(map);
    }
    if let (Some(start), Some(end)) = (cleaned.find('{'), cleaned.rfind('}')) {
        if start < end {
            if let Some(map) = parse_object(&cleaned[start..=end]) {
                return Narrative::Parsed(map);
            }
        }
    }
    Narrative::Unparseable(text.to_string())
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn string_list_field(map: &Map<String, Value>, key: &str) -> Option<Vec<String>> {
    let items: Vec<String> = map
        .get(key)?
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

// ============ Project summary ============

pub fn summary_prompt(repo: &RepoInfo, languages: &LanguageBreakdown, files: &[String]) -> String {
    let file_sample = files
        .iter()
        .take(MAX_PROMPT_FILES)
        .cloned()
        .collect::<Vec<_>>()
        .join("\n");
    let languages_json =
        serde_json::to_string_pretty(languages).unwrap_or_else(|_| "{}".to_string());

    format!(
        r#"Analyze this GitHub repository and provide a comprehensive project summary.

Repository: {name}
Description: {description}
Primary Language: {language}
Stars: {stars}
Forks: {forks}
Created: {created}
Last Updated: {updated}

Languages Used:
{languages_json}

File Structure Sample:
{file_sample}

Provide a detailed summary (3-4 paragraphs) covering:
1. What this project does and its purpose
2. Technical architecture and tech stack
3. Key features and functionality
4. Target use case and audience

Be specific and technical. Focus on what makes this project unique."#,
        name = repo.full_name,
        description = repo.description.as_deref().unwrap_or("No description provided"),
        language = repo.language.as_deref().unwrap_or("Unknown"),
        stars = repo.stargazers_count,
        forks = repo.forks_count,
        created = repo.created_at.as_deref().unwrap_or("Unknown"),
        updated = repo.updated_at.as_deref().unwrap_or("Unknown"),
    )
}

/// One-paragraph summary built from metadata alone.
pub fn fallback_summary(repo: &RepoInfo) -> String {
    format!(
        "{}: {}. Primary language: {}. This repository has {} stars and {} forks.",
        repo.full_name,
        repo.description.as_deref().unwrap_or("A software project"),
        repo.language.as_deref().unwrap_or("Unknown"),
        repo.stargazers_count,
        repo.forks_count,
    )
}

// ============ Contributor ============

/// Evidence for one contributor prompt.
#[derive(Debug, Clone)]
pub struct ContributorEvidence<'a> {
    pub username: &'a str,
    pub total_commits: u64,
    pub files_worked: &'a [FileWorked],
    pub messages: &'a [String],
    pub first_commit_date: &'a str,
    pub last_commit_date: &'a str,
}

pub fn contributor_prompt(evidence: &ContributorEvidence<'_>) -> String {
    let file_list = evidence
        .files_worked
        .iter()
        .take(MAX_PROMPT_FILES_WORKED)
        .map(|f| format!("- {} ({} commits, {} changes)", f.path, f.commits, f.changes))
        .collect::<Vec<_>>()
        .join("\n");
    let messages = evidence
        .messages
        .iter()
        .take(MAX_PROMPT_MESSAGES)
        .map(|m| format!("- {}", m))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Analyze this contributor's knowledge and role in the codebase.

Contributor: {username}
Total Commits: {commits}
Active Period: {first} to {last}
Files Modified: {file_count}

Files they've worked on:
{file_list}

Sample commit messages:
{messages}

Return ONLY valid JSON with this exact structure:
{{
  "knowledge_areas": ["specific areas/modules they know well - be specific"],
  "expertise_level": "Core|Major|Minor",
  "contribution_summary": "2-3 sentences describing their main contributions",
  "bus_factor_risk": "Critical|High|Medium|Low"
}}

Guidelines:
- Core: 100+ commits, works across critical areas
- Major: 30-100 commits, significant contributions
- Minor: <30 commits, limited scope
- Critical risk: sole expert in critical areas
- High risk: primary expert in important areas
- Medium risk: knowledge shared with 1-2 others
- Low risk: work is well-distributed"#,
        username = evidence.username,
        commits = evidence.total_commits,
        first = evidence.first_commit_date,
        last = evidence.last_commit_date,
        file_count = evidence.files_worked.len(),
    )
}

/// Narrative fields of a contributor analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContributorNarrative {
    pub knowledge_areas: Vec<String>,
    pub expertise_level: ExpertiseLevel,
    pub contribution_summary: String,
    pub bus_factor_risk: RiskLevel,
}

impl ContributorNarrative {
    /// Combine parsed model fields with defaults, field by field.
    pub fn merge(parsed: &Map<String, Value>, files_count: usize) -> Self {
        Self {
            knowledge_areas: string_list_field(parsed, "knowledge_areas")
                .unwrap_or_else(|| vec!["General development".to_string()]),
            expertise_level: string_field(parsed, "expertise_level")
                .and_then(|s| ExpertiseLevel::from_label(&s))
                .unwrap_or(ExpertiseLevel::Minor),
            contribution_summary: string_field(parsed, "contribution_summary")
                .unwrap_or_else(|| format!("Contributed to {} files", files_count)),
            bus_factor_risk: string_field(parsed, "bus_factor_risk")
                .and_then(|s| RiskLevel::from_label(&s))
                .unwrap_or(RiskLevel::Medium),
        }
    }

    /// Commit-volume heuristic used when the model is unavailable.
    pub fn fallback(total_commits: u64, files_count: usize) -> Self {
        let (expertise_level, bus_factor_risk) = risk::fallback_expertise(total_commits);
        Self {
            knowledge_areas: vec![format!("Contributed to {} files", files_count)],
            expertise_level,
            contribution_summary: format!(
                "Made {} commits across various areas of the codebase",
                total_commits
            ),
            bus_factor_risk,
        }
    }

    /// Resolve a model response: merge when it parsed, heuristic otherwise.
    pub fn resolve(narrative: &Narrative, total_commits: u64, files_count: usize) -> Self {
        match narrative {
            Narrative::Parsed(map) => Self::merge(map, files_count),
            Narrative::Unparseable(_) => Self::fallback(total_commits, files_count),
        }
    }
}

// ============ Codebase health ============

/// Statistics summarized in the health prompt.
#[derive(Debug, Clone)]
pub struct HealthEvidence<'a> {
    pub total_files: usize,
    pub total_commits: usize,
    pub contributor_count: usize,
    pub stale_file_count: usize,
    pub hot_spot_count: usize,
    pub knowledge_distribution: &'a BTreeMap<String, u64>,
}

pub fn health_prompt(evidence: &HealthEvidence<'_>) -> String {
    let distribution = serde_json::to_string_pretty(evidence.knowledge_distribution)
        .unwrap_or_else(|_| "{}".to_string());
    format!(
        r#"Analyze this codebase's health and sustainability for long-term maintenance.

Statistics:
- Total files: {files}
- Total commits: {commits}
- Active contributors: {contributors}
- Stale files (6+ months): {stale}
- Hot spots (frequently changed): {hot}

Knowledge Distribution:
{distribution}

Return ONLY valid JSON with this exact structure:
{{
  "maintenance_concerns": ["list 3-5 specific concerns"],
  "overall_bus_factor": number_between_1_and_10,
  "risk_assessment": "Low|Medium|High|Critical",
  "recommendations": ["list 5-7 actionable recommendations"]
}}

Bus Factor Scale:
1-2: Critical - Only 1-2 people know the codebase
3-4: High Risk - Small team, knowledge concentrated
5-7: Medium - Decent distribution but could improve
8-10: Low Risk - Well-distributed knowledge

Consider:
- Is knowledge centralized to few contributors?
- Are there abandoned areas of code?
- Is the team size adequate for the codebase size?
- Are there single points of failure?"#,
        files = evidence.total_files,
        commits = evidence.total_commits,
        contributors = evidence.contributor_count,
        stale = evidence.stale_file_count,
        hot = evidence.hot_spot_count,
    )
}

/// Narrative fields of the codebase health section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthNarrative {
    pub maintenance_concerns: Vec<String>,
    pub overall_bus_factor: u32,
    pub risk_assessment: RiskLevel,
    pub recommendations: Vec<String>,
}

impl HealthNarrative {
    pub fn merge(parsed: &Map<String, Value>) -> Self {
        let bus_factor = parsed
            .get("overall_bus_factor")
            .and_then(|v| v.as_f64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok())))
            .map(|n| n.round().clamp(1.0, 10.0) as u32)
            .unwrap_or(3);
        Self {
            maintenance_concerns: string_list_field(parsed, "maintenance_concerns")
                .unwrap_or_else(|| vec!["Unable to analyze".to_string()]),
            overall_bus_factor: bus_factor,
            risk_assessment: string_field(parsed, "risk_assessment")
                .and_then(|s| RiskLevel::from_label(&s))
                .unwrap_or(RiskLevel::Medium),
            recommendations: string_list_field(parsed, "recommendations").unwrap_or_else(|| {
                vec![
                    "Increase documentation".to_string(),
                    "Distribute knowledge".to_string(),
                ]
            }),
        }
    }

    pub fn fallback(evidence: &HealthEvidence<'_>) -> Self {
        let bus_factor = risk::fallback_bus_factor(evidence.contributor_count);
        let stale = if evidence.stale_file_count > 0 {
            format!(
                "{} files haven't been updated in 6+ months",
                evidence.stale_file_count
            )
        } else {
            "No stale files detected".to_string()
        };
        let hot = if evidence.hot_spot_count > 0 {
            format!("{} files are frequently modified", evidence.hot_spot_count)
        } else {
            "Code changes are well-distributed".to_string()
        };
        Self {
            maintenance_concerns: vec![
                format!(
                    "Repository has {} active contributors",
                    evidence.contributor_count
                ),
                stale,
                hot,
            ],
            overall_bus_factor: bus_factor,
            risk_assessment: risk::bus_factor_risk(bus_factor),
            recommendations: [
                "Document critical code areas",
                "Cross-train team members on key components",
                "Regular code reviews to share knowledge",
                "Maintain updated README and contribution guides",
                "Monitor code ownership distribution",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }

    pub fn resolve(narrative: &Narrative, evidence: &HealthEvidence<'_>) -> Self {
        match narrative {
            Narrative::Parsed(map) => Self::merge(map),
            Narrative::Unparseable(_) => Self::fallback(evidence),
        }
    }
}
