//! Generative-text transport with rate-limit aware retries.
//!
//! [`TextGenerator`] is the seam the narrative layer calls through;
//! [`GeminiClient`] implements it over the Gemini `generateContent`
//! endpoint.
//!
//! # Retry strategy
//!
//! - HTTP 429: wait the provider's `retryDelay` (default 15s) plus
//!   `5s × attempt`
//! - timeout, network error, HTTP 5xx: wait `5s × (attempt + 1)`
//! - other HTTP 4xx, missing key, unreadable body: fail immediately
//!
//! No wait follows the final attempt; its error is returned as is.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::GeneratorConfig;
use crate::error::GenerationError;

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate text for `prompt`, retrying per the implementation's policy.
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String, GenerationError>;

    /// Whether credentials are present.
    fn is_configured(&self) -> bool;
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Rate-limit wait when the provider names none.
    pub default_retry: Duration,
    /// Per-attempt backoff increment.
    pub step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            default_retry: Duration::from_secs(15),
            step: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &GeneratorConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            default_retry: Duration::from_secs(config.default_retry_secs),
            ..Self::default()
        }
    }

    /// Wait before the next attempt after `attempt` (0-based) failed with
    /// `err`, or `None` to give up.
    pub fn backoff_for(&self, attempt: u32, err: &GenerationError) -> Option<Duration> {
        if !err.is_retryable() || attempt + 1 >= self.max_attempts {
            return None;
        }
        Some(match err {
            GenerationError::RateLimited { retry_after } => {
                retry_after.unwrap_or(self.default_retry) + self.step * attempt
            }
            _ => self.step * (attempt + 1),
        })
    }
}

/// Run `call` until it succeeds or `policy` gives up. `call` receives the
/// 0-based attempt index.
pub async fn with_retries<F, Fut>(policy: &RetryPolicy, mut call: F) -> Result<String, GenerationError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<String, GenerationError>>,
{
    let mut attempt = 0;
    loop {
        let err = match call(attempt).await {
            Ok(text) => return Ok(text),
            Err(err) => err,
        };
        let Some(wait) = policy.backoff_for(attempt, &err) else {
            return Err(err);
        };
        tracing::warn!(
            attempt = attempt + 1,
            max_attempts = policy.max_attempts,
            wait_secs = wait.as_secs_f64(),
            error = %err,
            "generation failed, retrying"
        );
        tokio::time::sleep(wait).await;
        attempt += 1;
    }
}

/// Provider-suggested wait from a 429 body: the `retryDelay` of the
/// `google.rpc.RetryInfo` entry in `error.details`. Fractional seconds
/// round up.
pub fn parse_retry_delay(body: &Value) -> Option<Duration> {
    let details = body.get("error")?.get("details")?.as_array()?;
    let raw = details
        .iter()
        .find(|d| {
            d.get("@type")
                .and_then(Value::as_str)
                .is_some_and(|t| t.ends_with("google.rpc.RetryInfo"))
        })?
        .get("retryDelay")?
        .as_str()?;
    let secs: f64 = raw.trim().trim_end_matches('s').parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some(Duration::from_secs(secs.ceil() as u64))
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

fn first_text(response: GenerateResponse) -> Option<String> {
    response
        .candidates
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .next()?
        .text
}

/// Gemini `generateContent` client.
pub struct GeminiClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    max_output_tokens: u32,
    policy: RetryPolicy,
}

impl GeminiClient {
    pub fn new(config: &GeneratorConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            endpoint: format!(
                "{}/models/{}:generateContent",
                config.api_url.trim_end_matches('/'),
                config.model
            ),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            max_output_tokens: config.max_output_tokens,
            policy: RetryPolicy::from_config(config),
        })
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// One request, no retries.
    pub async fn attempt(&self, prompt: &str, temperature: f32) -> Result<String, GenerationError> {
        let key = self.api_key.as_deref().ok_or(GenerationError::MissingApiKey)?;
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": temperature,
                "maxOutputTokens": self.max_output_tokens,
            }
        });

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", key)])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            return Err(GenerationError::RateLimited {
                retry_after: parse_retry_delay(&body),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;
        first_text(parsed)
            .ok_or_else(|| GenerationError::MalformedResponse("no candidate text".to_string()))
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String, GenerationError> {
        if self.api_key.is_none() {
            return Err(GenerationError::MissingApiKey);
        }
        let this = self;
        with_retries(&self.policy, move |_| this.attempt(prompt, temperature)).await
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}
