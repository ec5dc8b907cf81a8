//! TOML configuration with environment overrides for secrets.
//!
//! Every section is optional; a missing file yields [`Config::default`].
//! Secrets are never read from the file: `GITHUB_TOKEN` and
//! `GEMINI_API_KEY` come from the environment, and `GEMINI_MODEL`
//! overrides `generator.model`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default = "default_source_url")]
    pub api_url: String,
    #[serde(default = "default_source_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Target number of commit-detail fetches per run.
    #[serde(default = "default_detail_budget")]
    pub detail_budget: usize,
    #[serde(default = "default_detail_delay")]
    pub detail_delay_ms: u64,
    /// From `GITHUB_TOKEN`.
    #[serde(skip)]
    pub token: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_url: default_source_url(),
            timeout_secs: default_source_timeout(),
            page_size: default_page_size(),
            detail_budget: default_detail_budget(),
            detail_delay_ms: default_detail_delay(),
            token: None,
        }
    }
}

fn default_source_url() -> String {
    "https://api.github.com".to_string()
}
fn default_source_timeout() -> u64 {
    30
}
fn default_page_size() -> u32 {
    100
}
fn default_detail_budget() -> usize {
    100
}
fn default_detail_delay() -> u64 {
    100
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneratorConfig {
    #[serde(default = "default_generator_url")]
    pub api_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_generator_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_retry_secs")]
    pub default_retry_secs: u64,
    #[serde(default = "default_phase_delay")]
    pub phase_delay_ms: u64,
    #[serde(default = "default_contributor_delay")]
    pub contributor_delay_ms: u64,
    /// From `GEMINI_API_KEY`.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_url: default_generator_url(),
            model: default_model(),
            timeout_secs: default_generator_timeout(),
            max_attempts: default_max_attempts(),
            max_output_tokens: default_max_output_tokens(),
            default_retry_secs: default_retry_secs(),
            phase_delay_ms: default_phase_delay(),
            contributor_delay_ms: default_contributor_delay(),
            api_key: None,
        }
    }
}

fn default_generator_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}
fn default_generator_timeout() -> u64 {
    60
}
fn default_max_attempts() -> u32 {
    3
}
fn default_max_output_tokens() -> u32 {
    8192
}
fn default_retry_secs() -> u64 {
    15
}
fn default_phase_delay() -> u64 {
    2000
}
fn default_contributor_delay() -> u64 {
    1500
}

impl GeneratorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    #[serde(default = "default_max_commits")]
    pub default_max_commits: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            default_max_commits: default_max_commits(),
        }
    }
}

fn default_max_commits() -> usize {
    1000
}

impl Config {
    /// Fill secrets and overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(token) = non_empty("GITHUB_TOKEN") {
            self.source.token = Some(token);
        }
        if let Some(key) = non_empty("GEMINI_API_KEY") {
            self.generator.api_key = Some(key);
        }
        if let Some(model) = non_empty("GEMINI_MODEL") {
            self.generator.model = model;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.server.bind.trim().is_empty() {
            anyhow::bail!("server.bind must not be empty");
        }
        if self.source.page_size == 0 || self.source.page_size > 100 {
            anyhow::bail!("source.page_size must be in 1..=100");
        }
        if self.source.detail_budget == 0 {
            anyhow::bail!("source.detail_budget must be > 0");
        }
        if self.generator.max_attempts == 0 {
            anyhow::bail!("generator.max_attempts must be >= 1");
        }
        if self.analysis.default_max_commits == 0 {
            anyhow::bail!("analysis.default_max_commits must be > 0");
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    config.apply_env();
    Ok(config)
}

/// Like [`load_config`], but a missing file yields the defaults.
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        return load_config(path);
    }
    tracing::debug!(path = %path.display(), "config file not found, using defaults");
    let mut config = Config::default();
    config.apply_env();
    Ok(config)
}
