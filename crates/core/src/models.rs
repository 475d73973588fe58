use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chunk about to be written to the store. One row per chunk per page;
/// rows are never mutated after insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub case_id: String,
    pub file_id: String,
    pub page_number: u32,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// A chunk row as it comes back from the store. Hosted backends return the
/// embedding column loosely typed (a JSON array, or a bracketed string),
/// so it stays a `serde_json::Value` until ranking parses it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredChunk {
    pub case_id: String,
    pub file_id: String,
    #[serde(default)]
    pub page_number: Option<u32>,
    pub text: String,
    pub embedding: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseRecord {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub case_id: String,
    pub file_name: String,
    pub file_url: String,
    pub checksum: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub case_id: Option<String>,
    pub top_k: usize,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            case_id: None,
            top_k: crate::query::DEFAULT_TOP_K,
        }
    }

    pub fn scoped_to_case(mut self, case_id: impl Into<String>) -> Self {
        self.case_id = Some(case_id.into());
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }
}

/// One ranked hit. Ephemeral: built per search request and discarded after
/// the response is sent. `chunk_text` is already truncated for transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub chunk_text: String,
    pub similarity: f64,
    pub file_id: String,
    pub case_id: String,
    pub page_number: Option<u32>,
}

/// The response shape the original HTTP surface exposed per hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnippetHit {
    pub file_name: Option<String>,
    pub file_url: Option<String>,
    pub text_snippet: String,
    pub similarity: f64,
    pub page_number: Option<u32>,
}
