use crate::chunking::{split_into_chunks, DEFAULT_CHUNK_CHARS};
use crate::embeddings::{EmbedInput, EmbeddingProvider};
use crate::error::IngestError;
use crate::extractor::PdfExtractor;
use crate::models::{DocumentChunk, FileRecord};
use crate::store::ChunkStore;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy)]
pub struct IngestionOptions {
    pub chunk_max_chars: usize,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_max_chars: DEFAULT_CHUNK_CHARS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestionSummary {
    pub file_id: String,
    pub pages: usize,
    pub chunks_stored: usize,
}

pub struct SkippedPdf {
    pub path: PathBuf,
    pub reason: String,
}

pub struct IngestionReport {
    pub summaries: Vec<IngestionSummary>,
    pub skipped_files: Vec<SkippedPdf>,
}

/// Orchestrates extract -> chunk -> embed -> persist for one document.
///
/// All collaborators are injected at construction and shared read-only
/// across calls; nothing here is a process global. The chunk loop issues
/// one embedding round-trip per chunk, unbatched, which dominates latency.
pub struct IngestionPipeline<X: PdfExtractor> {
    extractor: X,
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn ChunkStore>,
    options: IngestionOptions,
}

impl<X: PdfExtractor> IngestionPipeline<X> {
    pub fn new(
        extractor: X,
        provider: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn ChunkStore>,
        options: IngestionOptions,
    ) -> Result<Self, IngestError> {
        if options.chunk_max_chars == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk_max_chars must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            extractor,
            provider,
            store,
            options,
        })
    }

    /// Ingest one document's bytes under an existing file id.
    ///
    /// Pages are processed in page order; a blank page contributes zero
    /// chunks and is not an error. Extraction failure aborts the whole
    /// ingestion, and so does any chunk whose embedding or insert fails
    /// after the provider's bounded retries: partial coverage without a
    /// signal would silently hollow out search results. Chunks already
    /// written before the failure stay behind (no cross-chunk transaction).
    pub async fn ingest_bytes(
        &self,
        case_id: &str,
        file_id: &str,
        bytes: &[u8],
    ) -> Result<IngestionSummary, IngestError> {
        let pages = self.extractor.extract_pages(bytes)?;
        let expected_dimensions = self.provider.dimensions();
        let mut chunks_stored = 0usize;

        for page in &pages {
            let chunks = split_into_chunks(&page.text, self.options.chunk_max_chars);
            debug!(
                page = page.number,
                chunk_count = chunks.len(),
                "chunked page text"
            );

            for text in chunks {
                let embedding = self.provider.embed(&text, EmbedInput::Document).await?;
                if embedding.len() != expected_dimensions {
                    return Err(IngestError::DimensionMismatch {
                        expected: expected_dimensions,
                        actual: embedding.len(),
                    });
                }

                self.store
                    .insert_chunk(&DocumentChunk {
                        case_id: case_id.to_string(),
                        file_id: file_id.to_string(),
                        page_number: page.number,
                        text,
                        embedding,
                    })
                    .await?;
                chunks_stored += 1;
            }
        }

        info!(case_id, file_id, pages = pages.len(), chunks_stored, "document ingested");

        Ok(IngestionSummary {
            file_id: file_id.to_string(),
            pages: pages.len(),
            chunks_stored,
        })
    }

    /// Ingest a PDF from disk: mint a file id, save the file record, then
    /// index its chunks.
    pub async fn ingest_file(
        &self,
        case_id: &str,
        path: &Path,
    ) -> Result<IngestionSummary, IngestError> {
        let bytes = fs::read(path)?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                IngestError::MissingFileName(format!("path missing filename: {}", path.display()))
            })?;

        let file_id = Uuid::new_v4().to_string();
        let file_url = format!("file://{}", path.display());

        self.store
            .save_file(&FileRecord {
                id: file_id.clone(),
                case_id: case_id.to_string(),
                file_name: file_name.to_string(),
                file_url,
                checksum: digest_bytes(&bytes),
                uploaded_at: Utc::now(),
            })
            .await?;

        self.ingest_bytes(case_id, &file_id, &bytes).await
    }

    /// Ingest every PDF under `folder`, best effort: a file that fails to
    /// parse or embed is recorded as skipped instead of aborting the run.
    pub async fn ingest_folder(
        &self,
        case_id: &str,
        folder: &Path,
    ) -> Result<IngestionReport, IngestError> {
        let files = discover_pdf_files(folder);

        if files.is_empty() {
            return Err(IngestError::InvalidArgument(format!(
                "no pdf files found in {}",
                folder.display()
            )));
        }

        let mut summaries = Vec::new();
        let mut skipped_files = Vec::new();

        for path in files {
            match self.ingest_file(case_id, &path).await {
                Ok(summary) => summaries.push(summary),
                Err(error) => skipped_files.push(SkippedPdf {
                    path,
                    reason: error.to_string(),
                }),
            }
        }

        Ok(IngestionReport {
            summaries,
            skipped_files,
        })
    }
}

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
