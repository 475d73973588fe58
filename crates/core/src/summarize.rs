use crate::chunking::split_into_chunks;
use crate::error::{IngestError, ProviderError};
use crate::extractor::PdfExtractor;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Generation models handle far more context than embedding chunks, so the
/// summarization path splits at a wider width than ingestion.
pub const SUMMARY_CHUNK_CHARS: usize = 3000;

const SUMMARY_MAX_TOKENS: u32 = 300;
const SUMMARY_TEMPERATURE: f32 = 0.3;
const SUMMARY_PROMPT: &str =
    "You are a helpful legal assistant. Summarize the following text in concise and clear legal points:";

/// Turns a piece of case text into a short summary.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn generate_summary(&self, text: &str) -> Result<String, ProviderError>;
}

#[derive(Debug, Clone, Serialize)]
struct CohereGenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Clone, Deserialize)]
struct CohereGeneration {
    text: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CohereGenerateResponse {
    generations: Vec<CohereGeneration>,
}

/// Summarizer backed by a Cohere-style `/v1/generate` endpoint.
pub struct CohereSummarizer {
    endpoint: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl CohereSummarizer {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        })
    }
}

#[async_trait]
impl Summarizer for CohereSummarizer {
    async fn generate_summary(&self, text: &str) -> Result<String, ProviderError> {
        let payload = CohereGenerateRequest {
            model: &self.model,
            prompt: format!("{SUMMARY_PROMPT}\n{text}"),
            max_tokens: SUMMARY_MAX_TOKENS,
            temperature: SUMMARY_TEMPERATURE,
        };

        let response = self
            .client
            .post(format!("{}/v1/generate", self.endpoint))
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

        let parsed: CohereGenerateResponse = response
            .json()
            .await
            .map_err(|error| ProviderError::MalformedResponse(error.to_string()))?;

        parsed
            .generations
            .into_iter()
            .next()
            .map(|generation| generation.text.trim().to_string())
            .ok_or_else(|| ProviderError::MalformedResponse("empty generations array".to_string()))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SummaryOptions {
    pub chunk_max_chars: usize,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            chunk_max_chars: SUMMARY_CHUNK_CHARS,
        }
    }
}

/// Summarizes a whole PDF: extract the text, split it into wide chunks,
/// summarize each chunk, and join the per-chunk summaries in page order.
pub struct SummaryPipeline<X: PdfExtractor> {
    extractor: X,
    summarizer: Arc<dyn Summarizer>,
    options: SummaryOptions,
}

impl<X: PdfExtractor> SummaryPipeline<X> {
    pub fn new(
        extractor: X,
        summarizer: Arc<dyn Summarizer>,
        options: SummaryOptions,
    ) -> Result<Self, IngestError> {
        if options.chunk_max_chars == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk_max_chars must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            extractor,
            summarizer,
            options,
        })
    }

    pub async fn summarize_bytes(&self, bytes: &[u8]) -> Result<String, IngestError> {
        let pages = self.extractor.extract_pages(bytes)?;
        let text = pages
            .iter()
            .map(|page| page.text.trim())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        if text.is_empty() {
            return Err(IngestError::InvalidArgument(
                "no readable text found in pdf".to_string(),
            ));
        }

        let chunks = split_into_chunks(&text, self.options.chunk_max_chars);
        info!(chunks = chunks.len(), "summarizing extracted text");

        let mut summaries = Vec::with_capacity(chunks.len());
        for (index, chunk) in chunks.iter().enumerate() {
            debug!(chunk = index + 1, total = chunks.len(), "summarizing chunk");
            summaries.push(self.summarizer.generate_summary(chunk).await?);
        }

        Ok(summaries.join("\n"))
    }
}
