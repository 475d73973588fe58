use crate::error::StoreError;
use crate::models::{CaseRecord, DocumentChunk, FileRecord, StoredChunk};
use async_trait::async_trait;

/// Persistence seam for cases, file records, and document chunks.
///
/// Chunk inserts are independent rows; no transaction spans the multi-chunk
/// sequence an ingestion produces, so a crash mid-ingestion leaves a
/// partially indexed file.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    async fn insert_chunk(&self, chunk: &DocumentChunk) -> Result<(), StoreError>;

    /// Fetch candidate chunks, scoped to one case when `case_id` is given,
    /// system-wide otherwise.
    async fn fetch_chunks(&self, case_id: Option<&str>) -> Result<Vec<StoredChunk>, StoreError>;

    async fn create_case(&self, title: &str) -> Result<CaseRecord, StoreError>;

    async fn list_cases(&self) -> Result<Vec<CaseRecord>, StoreError>;

    async fn save_file(&self, file: &FileRecord) -> Result<(), StoreError>;

    async fn list_files(&self, case_id: &str) -> Result<Vec<FileRecord>, StoreError>;

    /// Deleting a case cascades to its file records and their chunks; no
    /// chunk outlives its file record.
    async fn delete_case(&self, case_id: &str) -> Result<(), StoreError>;
}
