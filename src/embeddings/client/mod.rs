
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

use crate::config::GeminiConfig;
use crate::corpus::Segment;
use crate::embeddings::cache::EmbeddingRecord;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Client for the remote embedding endpoint. Corpus segments go through the
/// batch API; queries go through the single-item API.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    base_url: Url,
    model: String,
    api_key: String,
    batch_size: usize,
    http: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ContentPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    content: Content,
}

#[derive(Debug, Serialize)]
struct BatchItem {
    model: String,
    content: Content,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest {
    requests: Vec<BatchItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    #[serde(default)]
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    embeddings: Vec<EmbeddingValues>,
}

impl EmbeddingClient {
    #[inline]
    pub fn new(config: &GeminiConfig, api_key: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: config.base_url.clone(),
            model: config.embedding_model.clone(),
            api_key: api_key.to_string(),
            batch_size: config.batch_size,
            http,
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(self)
    }

    /// Embed a single ephemeral query string. Query vectors are never
    /// cached.
    #[inline]
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        debug!("Embedding query (length: {})", text.len());

        let url = self.endpoint("embedContent")?;
        let request = EmbedRequest {
            content: content_from(text),
        };

        let response = self
            .http
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .context("Embedding request failed")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read embedding response body")?;

        if !status.is_success() {
            error!("Embedding endpoint returned {}: {}", status, body);
            anyhow::bail!("Embedding request failed with HTTP {}", status);
        }

        let parsed: EmbedResponse =
            serde_json::from_str(&body).context("Failed to parse embedding response")?;

        if parsed.embedding.values.is_empty() {
            anyhow::bail!("Embedding endpoint returned an empty vector");
        }

        debug!(
            "Query embedded with {} dimensions",
            parsed.embedding.values.len()
        );
        Ok(parsed.embedding.values)
    }

    /// Embed corpus segments in consecutive batches of at most the
    /// configured batch size. Batches run strictly sequentially to respect
    /// remote rate limits; a failure in any batch aborts the whole pass.
    /// Inputs that come back with an empty vector are dropped.
    #[inline]
    pub async fn embed_segments(&self, segments: &[Segment]) -> Result<Vec<EmbeddingRecord>> {
        if segments.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Embedding {} corpus segments", segments.len());

        let mut records = Vec::with_capacity(segments.len());
        for batch in segments.chunks(self.batch_size) {
            let batch_records = self
                .embed_single_batch(batch)
                .await
                .with_context(|| format!("Failed to embed a batch of {} segments", batch.len()))?;
            records.extend(batch_records);
            debug!("Processed a batch of {} segments", batch.len());
        }

        debug!("Embedded {} of {} segments", records.len(), segments.len());
        Ok(records)
    }

    async fn embed_single_batch(&self, segments: &[Segment]) -> Result<Vec<EmbeddingRecord>> {
        let url = self.endpoint("batchEmbedContents")?;
        let request = BatchEmbedRequest {
            requests: segments
                .iter()
                .map(|s| BatchItem {
                    model: format!("models/{}", self.model),
                    content: content_from(&s.text),
                })
                .collect(),
        };

        let response = self
            .http
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .context("Batch embedding request failed")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read batch embedding response body")?;

        if !status.is_success() {
            error!("Batch embedding endpoint returned {}: {}", status, body);
            anyhow::bail!("Batch embedding request failed with HTTP {}", status);
        }

        let parsed: BatchEmbedResponse =
            serde_json::from_str(&body).context("Failed to parse batch embedding response")?;

        if parsed.embeddings.len() != segments.len() {
            anyhow::bail!(
                "Mismatch between request and response counts: {} vs {}",
                segments.len(),
                parsed.embeddings.len()
            );
        }

        let records = segments
            .iter()
            .zip(parsed.embeddings)
            .filter_map(|(segment, embedding)| {
                if embedding.values.is_empty() {
                    warn!(
                        "No vector returned for segment {}, dropping it",
                        segment.ordinal
                    );
                    None
                } else {
                    Some(EmbeddingRecord {
                        text: segment.text.clone(),
                        vector: embedding.values,
                    })
                }
            })
            .collect();

        Ok(records)
    }

    fn endpoint(&self, method: &str) -> Result<Url> {
        self.base_url
            .join(&format!("v1beta/models/{}:{}", self.model, method))
            .context("Failed to build embedding endpoint URL")
    }
}

fn content_from(text: &str) -> Content {
    Content {
        parts: vec![ContentPart {
            text: text.to_string(),
        }],
    }
}
