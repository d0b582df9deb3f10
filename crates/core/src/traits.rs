use crate::error::StorageError;
use crate::models::{Document, NewChunk, NewDocument, NewMention};
use async_trait::async_trait;
use std::collections::HashSet;

/// Persistence collaborator for the ingestion pipeline.
///
/// Implementations must enforce the one-document-per-filename invariant and
/// surface violations as [`StorageError::DuplicateKey`], which the
/// coordinator treats as "someone else got there first", not as a failure.
#[async_trait]
pub trait DocumentStore {
    /// Filenames of every ingested document; the resumability checkpoint.
    async fn list_filenames(&self) -> Result<HashSet<String>, StorageError>;

    /// Point lookup used to narrow the race window just before insert.
    async fn document_exists(&self, filename: &str) -> Result<bool, StorageError>;

    async fn create_document(&self, document: NewDocument) -> Result<Document, StorageError>;

    async fn create_chunks(&self, chunks: &[NewChunk]) -> Result<(), StorageError>;

    async fn create_mentions(&self, mentions: &[NewMention]) -> Result<(), StorageError>;
}
