use crate::error::StorageError;
use crate::models::{Document, NewChunk, NewDocument, NewMention};
use crate::traits::DocumentStore;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::collections::HashSet;

/// Document-service store speaking the portal's JSON API. Ids and creation
/// timestamps are assigned client-side so the coordinator can keep building
/// chunk and mention records without a read-back.
pub struct RestStore {
    endpoint: String,
    client: Client,
}

impl RestStore {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint.trim_end_matches('/'), path)
    }

    /// Startup reachability probe; storage being down is a configuration
    /// error, not something to discover mid-run.
    pub async fn ping(&self) -> Result<(), StorageError> {
        let response = self.client.get(self.url("/health")).send().await?;
        if !response.status().is_success() {
            return Err(StorageError::BackendResponse {
                backend: "document-service".to_string(),
                details: response.status().to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for RestStore {
    async fn list_filenames(&self) -> Result<HashSet<String>, StorageError> {
        let response = self
            .client
            .get(self.url("/documents/filenames"))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StorageError::BackendResponse {
                backend: "document-service".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        let filenames = parsed
            .pointer("/filenames")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(filenames
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect())
    }

    async fn document_exists(&self, filename: &str) -> Result<bool, StorageError> {
        let response = self
            .client
            .get(self.url("/documents/exists"))
            .query(&[("filename", filename)])
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(StorageError::BackendResponse {
                backend: "document-service".to_string(),
                details: status.to_string(),
            }),
        }
    }

    async fn create_document(&self, document: NewDocument) -> Result<Document, StorageError> {
        let created = Document {
            id: document.document_id(),
            filename: document.filename,
            title: document.title,
            content: document.content,
            page_count: document.page_count,
            file_size: document.file_size,
            source_path: document.source_path,
            created_at: Utc::now(),
        };

        let response = self
            .client
            .post(self.url("/documents"))
            .json(&created)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(created),
            StatusCode::CONFLICT => Err(StorageError::DuplicateKey(created.filename)),
            status => Err(StorageError::BackendResponse {
                backend: "document-service".to_string(),
                details: status.to_string(),
            }),
        }
    }

    async fn create_chunks(&self, chunks: &[NewChunk]) -> Result<(), StorageError> {
        if chunks.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .post(self.url("/chunks/bulk"))
            .json(&json!({ "chunks": chunks }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StorageError::BackendResponse {
                backend: "document-service".to_string(),
                details: response.status().to_string(),
            });
        }
        Ok(())
    }

    async fn create_mentions(&self, mentions: &[NewMention]) -> Result<(), StorageError> {
        if mentions.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .post(self.url("/mentions/bulk"))
            .json(&json!({ "mentions": mentions }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StorageError::BackendResponse {
                backend: "document-service".to_string(),
                details: response.status().to_string(),
            });
        }
        Ok(())
    }
}
