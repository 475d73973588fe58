use crate::error::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Hosted embedding APIs distinguish document-side from query-side vectors;
/// mixing the two degrades retrieval quality silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedInput {
    Document,
    Query,
}

impl EmbedInput {
    fn as_input_type(self) -> &'static str {
        match self {
            EmbedInput::Document => "search_document",
            EmbedInput::Query => "search_query",
        }
    }
}

/// The one capability the pipelines need from an embedding provider.
/// `dimensions` is fixed per provider configuration; ingestion rejects
/// vectors of any other length.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn dimensions(&self) -> usize;

    async fn embed(&self, text: &str, input: EmbedInput) -> Result<Vec<f32>, ProviderError>;
}

/// Bounded exponential backoff for transient provider errors.
/// Backoff doubles per attempt and is capped: initial * 2^attempt, min max.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
        }
    }
}

impl RetryPolicy {
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let backoff_ms = self
            .initial_backoff_ms
            .saturating_mul(2_u64.saturating_pow(attempt))
            .min(self.max_backoff_ms);
        Duration::from_millis(backoff_ms)
    }

    /// Run `operation` until it succeeds, fails permanently, or exhausts
    /// `max_retries`. Only transient errors (rate limits, 5xx, network) are
    /// retried; everything else is returned on the first attempt.
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(attempt, "provider call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) if error.is_transient() && attempt < self.max_retries => {
                    let backoff = self.backoff_for_attempt(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max = self.max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        %error,
                        "transient provider error, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct CohereEmbedRequest<'a> {
    model: &'a str,
    texts: [&'a str; 1],
    input_type: &'static str,
}

#[derive(Debug, Clone, Deserialize)]
struct CohereEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Embedding provider backed by a Cohere-style `/v1/embed` endpoint.
/// One text per request, matching how the ingestion loop calls it.
pub struct CohereEmbedder {
    endpoint: String,
    api_key: String,
    model: String,
    dimensions: usize,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl CohereEmbedder {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        dimensions: usize,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            dimensions,
            client,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn request_embedding(
        &self,
        text: &str,
        input: EmbedInput,
    ) -> Result<Vec<f32>, ProviderError> {
        let payload = CohereEmbedRequest {
            model: &self.model,
            texts: [text],
            input_type: input.as_input_type(),
        };

        let response = self
            .client
            .post(format!("{}/v1/embed", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                details,
            });
        }

        let parsed: CohereEmbedResponse = response
            .json()
            .await
            .map_err(|error| ProviderError::MalformedResponse(error.to_string()))?;

        parsed
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::MalformedResponse("empty embeddings array".to_string()))
    }
}

#[async_trait]
impl EmbeddingProvider for CohereEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str, input: EmbedInput) -> Result<Vec<f32>, ProviderError> {
        self.retry
            .execute(|| self.request_embedding(text, input))
            .await
    }
}
