use crate::error::StorageError;
use crate::models::{Document, NewChunk, NewDocument, NewMention};
use crate::traits::DocumentStore;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

/// In-memory store for tests and dry runs. Enforces the same
/// filename-uniqueness contract as the network-backed store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    documents: HashMap<String, Document>,
    chunks: Vec<NewChunk>,
    mentions: Vec<NewMention>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn document_count(&self) -> usize {
        self.inner.lock().await.documents.len()
    }

    pub async fn chunks_for(&self, document_id: &str) -> Vec<NewChunk> {
        self.inner
            .lock()
            .await
            .chunks
            .iter()
            .filter(|chunk| chunk.document_id == document_id)
            .cloned()
            .collect()
    }

    pub async fn mentions_for(&self, document_id: &str) -> Vec<NewMention> {
        self.inner
            .lock()
            .await
            .mentions
            .iter()
            .filter(|mention| mention.document_id == document_id)
            .cloned()
            .collect()
    }

    pub async fn document_by_filename(&self, filename: &str) -> Option<Document> {
        self.inner.lock().await.documents.get(filename).cloned()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_filenames(&self) -> Result<HashSet<String>, StorageError> {
        Ok(self.inner.lock().await.documents.keys().cloned().collect())
    }

    async fn document_exists(&self, filename: &str) -> Result<bool, StorageError> {
        Ok(self.inner.lock().await.documents.contains_key(filename))
    }

    async fn create_document(&self, document: NewDocument) -> Result<Document, StorageError> {
        let mut inner = self.inner.lock().await;
        if inner.documents.contains_key(&document.filename) {
            return Err(StorageError::DuplicateKey(document.filename));
        }

        let created = Document {
            id: document.document_id(),
            filename: document.filename.clone(),
            title: document.title,
            content: document.content,
            page_count: document.page_count,
            file_size: document.file_size,
            source_path: document.source_path,
            created_at: Utc::now(),
        };
        inner.documents.insert(created.filename.clone(), created.clone());
        Ok(created)
    }

    async fn create_chunks(&self, chunks: &[NewChunk]) -> Result<(), StorageError> {
        self.inner.lock().await.chunks.extend_from_slice(chunks);
        Ok(())
    }

    async fn create_mentions(&self, mentions: &[NewMention]) -> Result<(), StorageError> {
        self.inner.lock().await.mentions.extend_from_slice(mentions);
        Ok(())
    }
}
