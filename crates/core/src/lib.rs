pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod models;
pub mod query;
pub mod ranking;
pub mod store;
pub mod stores;
pub mod summarize;

pub use chunking::{normalize_whitespace, split_into_chunks, DEFAULT_CHUNK_CHARS};
pub use embeddings::{CohereEmbedder, EmbedInput, EmbeddingProvider, RetryPolicy};
pub use error::{IngestError, ProviderError, SearchError, StoreError};
pub use extractor::{LopdfExtractor, PageText, PdfExtractor};
pub use ingest::{
    digest_bytes, discover_pdf_files, IngestionOptions, IngestionPipeline, IngestionReport,
    IngestionSummary, SkippedPdf,
};
pub use models::{
    CaseRecord, DocumentChunk, FileRecord, QueryResult, SearchRequest, SnippetHit, StoredChunk,
};
pub use query::{snippet_hits, QueryPipeline, DEFAULT_TOP_K, SNIPPET_MAX_CHARS};
pub use ranking::{cosine_similarity, parse_embedding, rank_top_k};
pub use store::ChunkStore;
pub use stores::{InMemoryStore, SupabaseStore};
pub use summarize::{
    CohereSummarizer, Summarizer, SummaryOptions, SummaryPipeline, SUMMARY_CHUNK_CHARS,
};
