use crate::error::StoreError;
use crate::models::{CaseRecord, DocumentChunk, FileRecord, StoredChunk};
use crate::store::ChunkStore;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use url::form_urlencoded;
use url::Url;

const BACKEND: &str = "supabase";

/// PostgREST `eq.` filter with the value percent-encoded, so an id
/// containing `&` or `=` cannot widen the filter.
fn eq_filter(column: &str, value: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(value.as_bytes()).collect();
    format!("{column}=eq.{encoded}")
}

/// Chunk store backed by a Supabase project's PostgREST endpoint.
///
/// Tables: `cases`, `files`, `documents` (one row per chunk). The service
/// key goes in both the `apikey` header and the bearer token, matching the
/// hosted API's conventions.
pub struct SupabaseStore {
    endpoint: String,
    service_key: String,
    client: Client,
}

impl SupabaseStore {
    pub fn new(endpoint: impl Into<String>, service_key: impl Into<String>) -> Result<Self, StoreError> {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Url::parse(&endpoint)?;

        Ok(Self {
            endpoint,
            service_key: service_key.into(),
            client: Client::new(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.endpoint, table)
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn insert_row(&self, table: &str, body: serde_json::Value) -> Result<(), StoreError> {
        let response = self
            .authed(self.client.post(self.table_url(table)))
            .header("Prefer", "return=minimal")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: BACKEND.to_string(),
                details: format!("insert into {table} returned {}", response.status()),
            });
        }

        Ok(())
    }

    async fn delete_rows(&self, table: &str, filter: &str) -> Result<(), StoreError> {
        let response = self
            .authed(self.client.delete(format!("{}?{}", self.table_url(table), filter)))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: BACKEND.to_string(),
                details: format!("delete from {table} returned {}", response.status()),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl ChunkStore for SupabaseStore {
    async fn insert_chunk(&self, chunk: &DocumentChunk) -> Result<(), StoreError> {
        self.insert_row(
            "documents",
            json!({
                "case_id": chunk.case_id,
                "file_id": chunk.file_id,
                "text": chunk.text,
                "embedding": chunk.embedding,
                "page_number": chunk.page_number,
            }),
        )
        .await
    }

    async fn fetch_chunks(&self, case_id: Option<&str>) -> Result<Vec<StoredChunk>, StoreError> {
        let mut url = format!("{}?select=*", self.table_url("documents"));
        if let Some(case_id) = case_id {
            url.push('&');
            url.push_str(&eq_filter("case_id", case_id));
        }

        let response = self.authed(self.client.get(url)).send().await?;
        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: BACKEND.to_string(),
                details: format!("documents query returned {}", response.status()),
            });
        }

        Ok(response.json().await?)
    }

    async fn create_case(&self, title: &str) -> Result<CaseRecord, StoreError> {
        let response = self
            .authed(self.client.post(self.table_url("cases")))
            .header("Prefer", "return=representation")
            .json(&json!({ "title": title }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: BACKEND.to_string(),
                details: format!("case insert returned {}", response.status()),
            });
        }

        let mut rows: Vec<CaseRecord> = response.json().await?;
        rows.pop().ok_or_else(|| StoreError::BackendResponse {
            backend: BACKEND.to_string(),
            details: "case insert returned no rows".to_string(),
        })
    }

    async fn list_cases(&self) -> Result<Vec<CaseRecord>, StoreError> {
        let response = self
            .authed(self.client.get(format!("{}?select=*", self.table_url("cases"))))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: BACKEND.to_string(),
                details: format!("cases query returned {}", response.status()),
            });
        }

        Ok(response.json().await?)
    }

    async fn save_file(&self, file: &FileRecord) -> Result<(), StoreError> {
        self.insert_row("files", serde_json::to_value(file)?).await
    }

    async fn list_files(&self, case_id: &str) -> Result<Vec<FileRecord>, StoreError> {
        let url = format!(
            "{}?select=*&{}",
            self.table_url("files"),
            eq_filter("case_id", case_id)
        );

        let response = self.authed(self.client.get(url)).send().await?;
        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: BACKEND.to_string(),
                details: format!("files query returned {}", response.status()),
            });
        }

        Ok(response.json().await?)
    }

    async fn delete_case(&self, case_id: &str) -> Result<(), StoreError> {
        // Children first so a failure never strands chunks without a case.
        self.delete_rows("documents", &eq_filter("case_id", case_id))
            .await?;
        self.delete_rows("files", &eq_filter("case_id", case_id))
            .await?;
        self.delete_rows("cases", &eq_filter("id", case_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::{eq_filter, SupabaseStore};

    #[test]
    fn filter_values_are_percent_encoded() {
        assert_eq!(
            eq_filter("case_id", "5aa47dd3-9276-4b45-a885-f6f6c3fb45a8"),
            "case_id=eq.5aa47dd3-9276-4b45-a885-f6f6c3fb45a8"
        );
        assert_eq!(
            eq_filter("case_id", "x&id=eq.other"),
            "case_id=eq.x%26id%3Deq.other"
        );
    }

    #[test]
    fn endpoint_must_be_a_valid_url() {
        assert!(SupabaseStore::new("not a url", "key").is_err());
        assert!(SupabaseStore::new("https://project.supabase.co/", "key").is_ok());
    }

    #[test]
    fn table_urls_drop_trailing_slash() {
        let store = SupabaseStore::new("https://project.supabase.co/", "key").unwrap();
        assert_eq!(
            store.table_url("documents"),
            "https://project.supabase.co/rest/v1/documents"
        );
    }
}
