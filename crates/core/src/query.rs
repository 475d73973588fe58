use crate::embeddings::{EmbedInput, EmbeddingProvider};
use crate::error::SearchError;
use crate::models::{FileRecord, QueryResult, SearchRequest, SnippetHit, StoredChunk};
use crate::ranking::{parse_embedding, rank_top_k};
use crate::store::ChunkStore;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_TOP_K: usize = 5;

/// Chunk text is truncated to this many characters for transport.
pub const SNIPPET_MAX_CHARS: usize = 500;

/// Embeds a query, scans the stored candidates, and returns ranked snippets.
pub struct QueryPipeline {
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn ChunkStore>,
}

impl QueryPipeline {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, store: Arc<dyn ChunkStore>) -> Self {
        Self { provider, store }
    }

    /// Run one search. A blank query is an input condition, not a failure:
    /// it returns an empty hit list without contacting the provider.
    /// Ordering is deterministic for a fixed candidate set and query vector.
    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<QueryResult>, SearchError> {
        let query = request.query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = self.provider.embed(query, EmbedInput::Query).await?;

        if request.case_id.is_none() {
            // The original system searched every case when no scope was
            // given. Kept, but loudly: it leaks chunks across case owners.
            warn!("search without case scope hits chunks from all cases");
        }

        let rows = self.store.fetch_chunks(request.case_id.as_deref()).await?;
        let fetched = rows.len();

        // Rows whose embedding column fails to parse, or parses to a vector
        // of a different width, are excluded rather than failing the query.
        let candidates: Vec<(Vec<f32>, StoredChunk)> = rows
            .into_iter()
            .filter_map(|row| parse_embedding(&row.embedding).map(|vector| (vector, row)))
            .collect();

        if candidates.len() < fetched {
            debug!(
                skipped = fetched - candidates.len(),
                "excluded rows with unparseable embeddings"
            );
        }

        let ranked = rank_top_k(&query_vector, candidates, request.top_k);

        Ok(ranked
            .into_iter()
            .map(|(similarity, row)| QueryResult {
                chunk_text: truncate_chars(&row.text, SNIPPET_MAX_CHARS),
                similarity,
                file_id: row.file_id,
                case_id: row.case_id,
                page_number: row.page_number,
            })
            .collect())
    }

    /// Search and join the hits against the case's file records, producing
    /// the `{file_name, file_url, text_snippet}` shape the original HTTP
    /// surface returned.
    pub async fn search_snippets(
        &self,
        request: &SearchRequest,
    ) -> Result<Vec<SnippetHit>, SearchError> {
        let results = self.search(request).await?;

        let files = match &request.case_id {
            Some(case_id) => self.store.list_files(case_id).await?,
            None => Vec::new(),
        };

        Ok(snippet_hits(results, &files))
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Join ranked results with file metadata. A hit whose file record is
/// missing keeps its snippet with no name or URL.
pub fn snippet_hits(results: Vec<QueryResult>, files: &[FileRecord]) -> Vec<SnippetHit> {
    let by_id: HashMap<&str, &FileRecord> =
        files.iter().map(|file| (file.id.as_str(), file)).collect();

    results
        .into_iter()
        .map(|result| {
            let file = by_id.get(result.file_id.as_str());
            SnippetHit {
                file_name: file.map(|f| f.file_name.clone()),
                file_url: file.map(|f| f.file_url.clone()),
                text_snippet: result.chunk_text,
                similarity: result.similarity,
                page_number: result.page_number,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::stores::InMemoryStore;
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Maps a handful of known phrases onto fixed unit vectors so tests can
    /// steer similarity without a live provider.
    struct PhraseEmbedder {
        calls: AtomicUsize,
    }

    impl PhraseEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }

        fn vector_for(text: &str) -> Vec<f32> {
            if text.contains("contract") {
                vec![1.0, 0.0, 0.0]
            } else if text.contains("deed") {
                vec![0.0, 1.0, 0.0]
            } else {
                vec![0.0, 0.0, 1.0]
            }
        }
    }

    #[async_trait]
    impl crate::embeddings::EmbeddingProvider for PhraseEmbedder {
        fn dimensions(&self) -> usize {
            3
        }

        async fn embed(&self, text: &str, _input: EmbedInput) -> Result<Vec<f32>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Self::vector_for(text))
        }
    }

    fn seeded_store() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.seed_chunk(StoredChunk {
            case_id: "case-1".to_string(),
            file_id: "file-1".to_string(),
            page_number: Some(1),
            text: "the contract was signed".to_string(),
            embedding: json!([1.0, 0.0, 0.0]),
        });
        store.seed_chunk(StoredChunk {
            case_id: "case-1".to_string(),
            file_id: "file-2".to_string(),
            page_number: Some(3),
            text: "transfer by deed of gift".to_string(),
            embedding: json!([0.0, 1.0, 0.0]),
        });
        store.seed_chunk(StoredChunk {
            case_id: "case-2".to_string(),
            file_id: "file-3".to_string(),
            page_number: Some(2),
            text: "contract in another case".to_string(),
            embedding: json!([1.0, 0.0, 0.0]),
        });
        store
    }

    #[tokio::test]
    async fn whitespace_query_returns_empty_without_embedding() {
        let provider = Arc::new(PhraseEmbedder::new());
        let pipeline = QueryPipeline::new(
            Arc::clone(&provider) as Arc<dyn crate::embeddings::EmbeddingProvider>,
            Arc::new(seeded_store()),
        );

        let hits = pipeline
            .search(&SearchRequest::new("   \t  "))
            .await
            .unwrap();

        assert!(hits.is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn case_scope_limits_candidates() {
        let pipeline = QueryPipeline::new(Arc::new(PhraseEmbedder::new()), Arc::new(seeded_store()));

        let hits = pipeline
            .search(&SearchRequest::new("contract").scoped_to_case("case-1"))
            .await
            .unwrap();

        assert!(!hits.is_empty());
        assert!(hits.iter().all(|hit| hit.case_id == "case-1"));
        assert_eq!(hits[0].file_id, "file-1");
        assert_eq!(hits[0].page_number, Some(1));
        assert!((hits[0].similarity - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn unscoped_search_spans_cases() {
        let pipeline = QueryPipeline::new(Arc::new(PhraseEmbedder::new()), Arc::new(seeded_store()));

        let hits = pipeline.search(&SearchRequest::new("contract")).await.unwrap();

        let case_ids: Vec<_> = hits.iter().map(|hit| hit.case_id.as_str()).collect();
        assert!(case_ids.contains(&"case-1"));
        assert!(case_ids.contains(&"case-2"));
    }

    #[tokio::test]
    async fn malformed_embedding_rows_are_skipped_not_fatal() {
        let store = seeded_store();
        store.seed_chunk(StoredChunk {
            case_id: "case-1".to_string(),
            file_id: "file-bad".to_string(),
            page_number: Some(9),
            text: "row with a broken embedding".to_string(),
            embedding: json!("definitely not numbers"),
        });

        let pipeline = QueryPipeline::new(Arc::new(PhraseEmbedder::new()), Arc::new(store));
        let hits = pipeline
            .search(&SearchRequest::new("contract").scoped_to_case("case-1"))
            .await
            .unwrap();

        assert!(hits.iter().all(|hit| hit.file_id != "file-bad"));
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn top_k_bounds_the_result_count() {
        let pipeline = QueryPipeline::new(Arc::new(PhraseEmbedder::new()), Arc::new(seeded_store()));

        let hits = pipeline
            .search(
                &SearchRequest::new("contract")
                    .scoped_to_case("case-1")
                    .with_top_k(1),
            )
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);

        // Fewer candidates than top_k returns what exists, not padding.
        let hits = pipeline
            .search(
                &SearchRequest::new("contract")
                    .scoped_to_case("case-1")
                    .with_top_k(50),
            )
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn snippets_are_truncated_to_transport_length() {
        let store = InMemoryStore::new();
        store.seed_chunk(StoredChunk {
            case_id: "case-1".to_string(),
            file_id: "file-1".to_string(),
            page_number: Some(1),
            text: "contract ".repeat(200),
            embedding: json!([1.0, 0.0, 0.0]),
        });

        let pipeline = QueryPipeline::new(Arc::new(PhraseEmbedder::new()), Arc::new(store));
        let hits = pipeline
            .search(&SearchRequest::new("contract").scoped_to_case("case-1"))
            .await
            .unwrap();

        assert_eq!(hits[0].chunk_text.chars().count(), SNIPPET_MAX_CHARS);
    }

    #[tokio::test]
    async fn snippet_hits_join_file_metadata() {
        let store = Arc::new(seeded_store());
        store
            .save_file(&FileRecord {
                id: "file-1".to_string(),
                case_id: "case-1".to_string(),
                file_name: "agreement.pdf".to_string(),
                file_url: "file:///tmp/agreement.pdf".to_string(),
                checksum: "abc".to_string(),
                uploaded_at: Utc::now(),
            })
            .await
            .unwrap();

        let pipeline = QueryPipeline::new(Arc::new(PhraseEmbedder::new()), Arc::clone(&store) as Arc<dyn ChunkStore>);
        let hits = pipeline
            .search_snippets(&SearchRequest::new("contract").scoped_to_case("case-1"))
            .await
            .unwrap();

        assert_eq!(hits[0].file_name.as_deref(), Some("agreement.pdf"));
        assert_eq!(hits[0].file_url.as_deref(), Some("file:///tmp/agreement.pdf"));
        // file-2 has no record saved; the hit survives without metadata.
        assert!(hits.iter().any(|hit| hit.file_name.is_none()));
    }
}
