//! Narrative generation with deterministic fallback.
//!
//! Wraps a [`TextGenerator`] and turns every failure into the heuristic
//! values from [`repo_insight_core::narrative`], so a narrative problem
//! never aborts an analysis.

use std::sync::Arc;

use repo_insight_core::models::{LanguageBreakdown, RepoInfo};
use repo_insight_core::narrative::{
    contributor_prompt, fallback_summary, health_prompt, parse_narrative, summary_prompt,
    ContributorEvidence, ContributorNarrative, HealthEvidence, HealthNarrative, Narrative,
    STRUCTURED_TEMPERATURE, SUMMARY_TEMPERATURE,
};

use crate::generator::TextGenerator;

#[derive(Clone)]
pub struct NarrativeGenerator {
    generator: Arc<dyn TextGenerator>,
}

impl NarrativeGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub fn is_configured(&self) -> bool {
        self.generator.is_configured()
    }

    /// Prompt for structured output. Call failures come back as
    /// [`Narrative::Unparseable`] with an empty body.
    async fn structured(&self, prompt: &str, what: &str) -> Narrative {
        match self.generator.generate(prompt, STRUCTURED_TEMPERATURE).await {
            Ok(text) => {
                let narrative = parse_narrative(&text);
                if !narrative.is_parsed() {
                    tracing::warn!(section = what, "model output was not a JSON object, using heuristics");
                }
                narrative
            }
            Err(err) => {
                tracing::warn!(section = what, error = %err, "narrative generation failed, using heuristics");
                Narrative::Unparseable(String::new())
            }
        }
    }

    pub async fn summary(
        &self,
        repo: &RepoInfo,
        languages: &LanguageBreakdown,
        files: &[String],
    ) -> String {
        let prompt = summary_prompt(repo, languages, files);
        match self.generator.generate(&prompt, SUMMARY_TEMPERATURE).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                tracing::warn!("empty project summary, using metadata summary");
                fallback_summary(repo)
            }
            Err(err) => {
                tracing::warn!(error = %err, "project summary failed, using metadata summary");
                fallback_summary(repo)
            }
        }
    }

    pub async fn contributor(&self, evidence: &ContributorEvidence<'_>) -> ContributorNarrative {
        let prompt = contributor_prompt(evidence);
        let narrative = self.structured(&prompt, "contributor").await;
        ContributorNarrative::resolve(
            &narrative,
            evidence.total_commits,
            evidence.files_worked.len(),
        )
    }

    pub async fn health(&self, evidence: &HealthEvidence<'_>) -> HealthNarrative {
        let prompt = health_prompt(evidence);
        let narrative = self.structured(&prompt, "health").await;
        HealthNarrative::resolve(&narrative, evidence)
    }
}
