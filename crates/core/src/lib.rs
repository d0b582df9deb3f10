pub mod chunking;
pub mod coordinator;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod mentions;
pub mod models;
pub mod ocr;
pub mod progress;
pub mod readability;
pub mod retry;
pub mod scanner;
pub mod stores;
pub mod traits;

pub use chunking::{chunk_text, estimate_tokens, split_sentences, ChunkingConfig};
pub use coordinator::{CancelFlag, IngestionCoordinator, PipelineConfig, RunReport};
pub use embeddings::{
    embed_chunks, BatchPolicy, EmbeddingConfig, EmbeddingProvider, HttpEmbeddingClient,
    DEFAULT_EMBEDDING_MODEL,
};
pub use error::{IngestError, StorageError};
pub use extractor::{Extraction, ExtractionAdapter};
pub use mentions::{MentionCatalog, MentionHit, DEFAULT_MENTION_CAP};
pub use models::{
    cap_content, title_from_filename, Document, DocumentOutcome, NewChunk, NewDocument,
    NewMention, MAX_DOCUMENT_CHARS,
};
pub use ocr::{sanitize_prefix, OcrConfig, OcrEngine, PopplerTesseract, TempArtifacts};
pub use progress::{format_duration, ProgressTracker, RunStats};
pub use readability::{ReadabilityConfig, ReadabilityGate};
pub use scanner::{CorpusScanner, DEFAULT_FOLDER_PATTERNS};
pub use stores::{MemoryStore, RestStore};
pub use traits::DocumentStore;
