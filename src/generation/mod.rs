#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};
use url::Url;

use crate::config::GeminiConfig;

const DEFAULT_TIMEOUT_SECONDS: u64 = 60;
const EXPONENTIAL_BACKOFF_BASE: u32 = 2;

/// Failure classification for a generation call. Diagnostic detail stays in
/// the logs; callers map these to user-facing messages.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GenerationError {
    /// The service answered 200 but no candidate text could be extracted,
    /// e.g. the content was blocked. Not retried.
    #[error("response contained no readable candidate text")]
    Unreadable,

    /// Rate limits or transient failures outlasted the retry budget.
    #[error("service unavailable after {attempts} attempts")]
    Exhausted { attempts: u32 },
}

/// Outcome of one request attempt. Drives the retry state machine in
/// [`GenerationClient::generate`].
#[derive(Debug)]
enum AttemptOutcome {
    Succeeded(String),
    /// Parseable 200 body with no candidate text
    Unreadable,
    /// HTTP 429, optionally carrying a server-advised wait
    RateLimited { advised: Option<Duration> },
    /// Any other non-200 status, transport failure, or malformed body
    Transient,
}

/// Client for the remote generation endpoint, with bounded retry for rate
/// limits and transient failures.
#[derive(Debug, Clone)]
pub struct GenerationClient {
    endpoint: Url,
    api_key: String,
    max_attempts: u32,
    max_output_tokens: u32,
    backoff_unit: Duration,
    http: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<RequestContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    role: String,
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerationClient {
    #[inline]
    pub fn new(config: &GeminiConfig, api_key: &str) -> Result<Self> {
        let endpoint = config
            .base_url
            .join(&format!(
                "v1beta/models/{}:generateContent",
                config.generation_model
            ))
            .context("Failed to build generation endpoint URL")?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            endpoint,
            api_key: api_key.to_string(),
            max_attempts: config.max_attempts,
            max_output_tokens: config.max_output_tokens,
            backoff_unit: Duration::from_secs(1),
            http,
        })
    }

    /// Shrink the backoff unit; tests use this to keep retries fast.
    #[inline]
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    #[inline]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Send `prompt` to the generation endpoint and return the first
    /// candidate's text.
    ///
    /// Rate limits honour the server-advised wait when present, otherwise
    /// back off `2^attempt` backoff units; other non-200 statuses,
    /// transport failures, and malformed bodies share the same retry
    /// budget. A parseable response with no candidate text gets exactly one
    /// extra attempt at double the output-token ceiling (a truncated answer
    /// is indistinguishable from an empty one) before it is surfaced as
    /// [`GenerationError::Unreadable`].
    #[inline]
    pub async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let mut attempt = 0u32;
        let mut token_ceiling = self.max_output_tokens;
        let mut escalated = false;

        loop {
            debug!(
                "Generation attempt {}/{} (token ceiling {})",
                attempt + 1,
                self.max_attempts,
                token_ceiling
            );

            match self.attempt_once(prompt, token_ceiling).await {
                AttemptOutcome::Succeeded(text) => return Ok(text),
                AttemptOutcome::Unreadable => {
                    if escalated {
                        return Err(GenerationError::Unreadable);
                    }
                    escalated = true;
                    token_ceiling *= 2;
                    debug!("Empty candidate text, retrying once with ceiling {token_ceiling}");
                }
                AttemptOutcome::RateLimited { advised } => {
                    let delay = backoff_delay(attempt, advised, self.backoff_unit);
                    attempt += 1;
                    if attempt == self.max_attempts {
                        return Err(GenerationError::Exhausted { attempts: attempt });
                    }
                    warn!("Rate limited, waiting {:?} before retry", delay);
                    tokio::time::sleep(delay).await;
                }
                AttemptOutcome::Transient => {
                    let delay = backoff_delay(attempt, None, self.backoff_unit);
                    attempt += 1;
                    if attempt == self.max_attempts {
                        return Err(GenerationError::Exhausted { attempts: attempt });
                    }
                    warn!("Transient failure, waiting {:?} before retry", delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn attempt_once(&self, prompt: &str, token_ceiling: u32) -> AttemptOutcome {
        let request = GenerateRequest {
            contents: vec![RequestContent {
                role: "user".to_string(),
                parts: vec![RequestPart {
                    text: prompt.to_string(),
                }],
            }],
            // Deterministic transliteration, not creative generation.
            generation_config: GenerationConfig {
                temperature: 0.0,
                max_output_tokens: token_ceiling,
                response_mime_type: "text/plain".to_string(),
            },
        };

        let response = match self
            .http
            .post(self.endpoint.clone())
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Transport failure calling generation endpoint: {e}");
                return AttemptOutcome::Transient;
            }
        };

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let advised = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            warn!("Generation endpoint rate limited (advised wait: {advised:?})");
            return AttemptOutcome::RateLimited { advised };
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to read generation response body: {e}");
                return AttemptOutcome::Transient;
            }
        };

        if !status.is_success() {
            error!("Generation endpoint returned {}: {}", status, body);
            return AttemptOutcome::Transient;
        }

        let parsed: GenerateResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(e) => {
                error!("Malformed generation response body: {e}; body: {body}");
                return AttemptOutcome::Transient;
            }
        };

        match extract_candidate_text(&parsed) {
            Some(text) => AttemptOutcome::Succeeded(text),
            None => {
                if let Some(reason) = parsed
                    .candidates
                    .first()
                    .and_then(|c| c.finish_reason.as_deref())
                {
                    debug!("No candidate text, finishReason: {reason}");
                }
                AttemptOutcome::Unreadable
            }
        }
    }
}

/// The one backoff rule: respect the server-advised wait when present,
/// otherwise wait `2^attempt` backoff units (attempt starting at 0).
fn backoff_delay(attempt: u32, advised: Option<Duration>, unit: Duration) -> Duration {
    advised.unwrap_or_else(|| unit * EXPONENTIAL_BACKOFF_BASE.pow(attempt))
}

/// First candidate's first non-empty part text, trimmed.
fn extract_candidate_text(response: &GenerateResponse) -> Option<String> {
    let text = response
        .candidates
        .first()?
        .content
        .as_ref()?
        .parts
        .first()?
        .text
        .as_deref()?
        .trim();

    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
