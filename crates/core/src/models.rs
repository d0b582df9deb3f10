use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Stored document text is capped so one pathological PDF cannot blow up a
/// record; keyword search over the remainder is unaffected.
pub const MAX_DOCUMENT_CHARS: usize = 100_000;

/// One persisted record per successfully ingested source file. Filename is
/// the unique key within the corpus; the record is never mutated after
/// creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub title: String,
    pub content: String,
    pub page_count: Option<u32>,
    pub file_size: u64,
    pub source_path: String,
    pub created_at: DateTime<Utc>,
}

/// Fields for a document about to be created by the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDocument {
    pub filename: String,
    pub title: String,
    pub content: String,
    pub page_count: Option<u32>,
    pub file_size: u64,
    pub source_path: String,
}

impl NewDocument {
    /// Deterministic id derived from the filename, so two processes racing
    /// on the same file collide on the same key instead of creating twins.
    pub fn document_id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.filename.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// A token-budgeted slice of a document's text. Indices are contiguous from
/// zero per document; a chunk whose embedding failed is persisted without a
/// vector so it stays reachable by keyword search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewChunk {
    pub document_id: String,
    pub chunk_index: u32,
    pub content: String,
    pub page_number: u32,
    pub embedding: Option<Vec<f32>>,
}

/// One occurrence of a notable name within a document, with surrounding
/// context. Counts are derived by aggregation at query time, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMention {
    pub document_id: String,
    pub name: String,
    pub normalized_name: String,
    pub context: String,
    pub page_number: Option<u32>,
}

/// Terminal state of one document's trip through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOutcome {
    /// Checkpoint hit or duplicate-key race: someone already ingested it.
    AlreadyIngested,
    Persisted {
        used_ocr: bool,
        chunks: usize,
        embedded: usize,
        mentions: usize,
    },
    /// Direct extraction was unusable and no OCR pass was possible.
    NeedsOcr,
    /// Failed the readability gate after every extraction attempt.
    Unreadable,
    Failed {
        reason: String,
    },
}

/// Display title for a document: the filename with its extension stripped.
pub fn title_from_filename(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => filename.to_string(),
    }
}

/// Truncate text to [`MAX_DOCUMENT_CHARS`] on a char boundary.
pub fn cap_content(text: &str) -> String {
    if text.chars().count() <= MAX_DOCUMENT_CHARS {
        return text.to_string();
    }
    text.chars().take(MAX_DOCUMENT_CHARS).collect()
}
