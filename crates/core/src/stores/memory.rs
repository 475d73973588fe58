use crate::error::StoreError;
use crate::models::{CaseRecord, DocumentChunk, FileRecord, StoredChunk};
use crate::store::ChunkStore;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::RwLock;
use uuid::Uuid;

/// In-memory store for tests and local runs. Plain `Vec`s behind `RwLock`;
/// candidate retrieval is the same full scan the hosted store performs.
#[derive(Default)]
pub struct InMemoryStore {
    cases: RwLock<Vec<CaseRecord>>,
    files: RwLock<Vec<FileRecord>>,
    chunks: RwLock<Vec<StoredChunk>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a raw chunk row, bypassing ingestion. Lets tests plant rows with
    /// malformed embedding columns.
    pub fn seed_chunk(&self, chunk: StoredChunk) {
        self.chunks.write().unwrap().push(chunk);
    }
}

#[async_trait]
impl ChunkStore for InMemoryStore {
    async fn insert_chunk(&self, chunk: &DocumentChunk) -> Result<(), StoreError> {
        let embedding = serde_json::to_value(&chunk.embedding)?;
        self.chunks.write().unwrap().push(StoredChunk {
            case_id: chunk.case_id.clone(),
            file_id: chunk.file_id.clone(),
            page_number: Some(chunk.page_number),
            text: chunk.text.clone(),
            embedding,
        });
        Ok(())
    }

    async fn fetch_chunks(&self, case_id: Option<&str>) -> Result<Vec<StoredChunk>, StoreError> {
        let chunks = self.chunks.read().unwrap();
        Ok(chunks
            .iter()
            .filter(|chunk| case_id.map_or(true, |id| chunk.case_id == id))
            .cloned()
            .collect())
    }

    async fn create_case(&self, title: &str) -> Result<CaseRecord, StoreError> {
        let record = CaseRecord {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            created_at: Utc::now(),
        };
        self.cases.write().unwrap().push(record.clone());
        Ok(record)
    }

    async fn list_cases(&self) -> Result<Vec<CaseRecord>, StoreError> {
        Ok(self.cases.read().unwrap().clone())
    }

    async fn save_file(&self, file: &FileRecord) -> Result<(), StoreError> {
        self.files.write().unwrap().push(file.clone());
        Ok(())
    }

    async fn list_files(&self, case_id: &str) -> Result<Vec<FileRecord>, StoreError> {
        let files = self.files.read().unwrap();
        Ok(files
            .iter()
            .filter(|file| file.case_id == case_id)
            .cloned()
            .collect())
    }

    async fn delete_case(&self, case_id: &str) -> Result<(), StoreError> {
        self.chunks
            .write()
            .unwrap()
            .retain(|chunk| chunk.case_id != case_id);
        self.files
            .write()
            .unwrap()
            .retain(|file| file.case_id != case_id);
        self.cases.write().unwrap().retain(|case| case.id != case_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chunk(case_id: &str, file_id: &str, text: &str) -> DocumentChunk {
        DocumentChunk {
            case_id: case_id.to_string(),
            file_id: file_id.to_string(),
            page_number: 1,
            text: text.to_string(),
            embedding: vec![1.0, 0.0],
        }
    }

    #[tokio::test]
    async fn fetch_scopes_to_case() {
        let store = InMemoryStore::new();
        store.insert_chunk(&chunk("case-a", "f1", "first")).await.unwrap();
        store.insert_chunk(&chunk("case-b", "f2", "second")).await.unwrap();

        let scoped = store.fetch_chunks(Some("case-a")).await.unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].text, "first");

        let all = store.fetch_chunks(None).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn delete_case_cascades_to_files_and_chunks() {
        let store = InMemoryStore::new();
        let case = store.create_case("Estate dispute").await.unwrap();
        store
            .save_file(&FileRecord {
                id: "f1".to_string(),
                case_id: case.id.clone(),
                file_name: "will.pdf".to_string(),
                file_url: "file:///tmp/will.pdf".to_string(),
                checksum: "abc".to_string(),
                uploaded_at: Utc::now(),
            })
            .await
            .unwrap();
        store.insert_chunk(&chunk(&case.id, "f1", "clause")).await.unwrap();

        store.delete_case(&case.id).await.unwrap();

        assert!(store.list_cases().await.unwrap().is_empty());
        assert!(store.list_files(&case.id).await.unwrap().is_empty());
        assert!(store.fetch_chunks(Some(&case.id)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn seeded_rows_keep_their_raw_embedding_value() {
        let store = InMemoryStore::new();
        store.seed_chunk(StoredChunk {
            case_id: "case-a".to_string(),
            file_id: "f1".to_string(),
            page_number: None,
            text: "broken row".to_string(),
            embedding: json!("not numbers"),
        });

        let rows = store.fetch_chunks(Some("case-a")).await.unwrap();
        assert_eq!(rows[0].embedding, json!("not numbers"));
    }
}
