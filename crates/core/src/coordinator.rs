use crate::chunking::{chunk_text, ChunkingConfig};
use crate::embeddings::{embed_chunks, BatchPolicy, EmbeddingProvider};
use crate::error::{IngestError, StorageError};
use crate::extractor::{Extraction, ExtractionAdapter};
use crate::mentions::{MentionCatalog, DEFAULT_MENTION_CAP};
use crate::models::{cap_content, title_from_filename, DocumentOutcome, NewChunk, NewDocument, NewMention};
use crate::ocr::OcrEngine;
use crate::progress::{format_duration, ProgressTracker, RunStats};
use crate::readability::{ReadabilityConfig, ReadabilityGate};
use crate::scanner::CorpusScanner;
use crate::traits::DocumentStore;
use futures::future::join_all;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Tunables for one ingestion run. A single coordinator covers every
/// operating mode the corpus has been run in: OCR on or off, narrow or wide
/// worker pools, capped or unbounded runs, resumed or from scratch.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Concurrent in-flight documents per batch. Keep low when OCR is on;
    /// pure-text extraction tolerates much wider pools.
    pub workers: usize,
    /// Stop after this many attempted documents, for cost-bounded runs.
    pub per_run_limit: Option<usize>,
    /// Skip filenames already present in storage.
    pub resume: bool,
    pub mention_cap: usize,
    /// Emit a progress line every this many attempted documents.
    pub progress_interval: u64,
    pub chunking: ChunkingConfig,
    pub readability: ReadabilityConfig,
    pub embedding: BatchPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 3,
            per_run_limit: None,
            resume: true,
            mention_cap: DEFAULT_MENTION_CAP,
            progress_interval: 50,
            chunking: ChunkingConfig::default(),
            readability: ReadabilityConfig::default(),
            embedding: BatchPolicy::default(),
        }
    }
}

/// Cooperative stop signal. Setting it stops the coordinator from launching
/// new batches; in-flight documents run to completion so no partial state
/// is left behind beyond what the checkpoint already tolerates.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Summary of a finished (or interrupted) run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub stats: RunStats,
    pub elapsed: Duration,
    pub cancelled: bool,
}

/// Drives the whole pipeline: scan, checkpoint subtraction, batched
/// concurrent extraction, gating, and persistence of documents with their
/// chunks, embeddings, and mentions. Every collaborator arrives through the
/// constructor; nothing is reached through process-global state.
pub struct IngestionCoordinator<S, E, O> {
    store: S,
    embedder: E,
    extractor: ExtractionAdapter<O>,
    gate: ReadabilityGate,
    catalog: MentionCatalog,
    scanner: CorpusScanner,
    config: PipelineConfig,
    cancel: CancelFlag,
}

impl<S, E, O> IngestionCoordinator<S, E, O>
where
    S: DocumentStore + Send + Sync,
    E: EmbeddingProvider,
    O: OcrEngine,
{
    pub fn new(
        store: S,
        embedder: E,
        extractor: ExtractionAdapter<O>,
        catalog: MentionCatalog,
        scanner: CorpusScanner,
        config: PipelineConfig,
    ) -> Result<Self, IngestError> {
        let gate = ReadabilityGate::new(config.readability)?;
        Ok(Self {
            store,
            embedder,
            extractor,
            gate,
            catalog,
            scanner,
            config,
            cancel: CancelFlag::new(),
        })
    }

    /// Handle for the host process to request a graceful stop.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Ingest every unprocessed PDF under the corpus root. Individual
    /// document failures are counted and logged, never fatal; the run only
    /// errors on configuration-level problems found before processing.
    pub async fn run(&self, corpus_root: &Path) -> Result<RunReport, IngestError> {
        let run_id = Uuid::new_v4();

        let folders = self.scanner.find_source_folders(corpus_root)?;
        if folders.is_empty() {
            return Err(IngestError::InvalidArgument(format!(
                "no source folders under {}",
                corpus_root.display()
            )));
        }

        let ingested = if self.config.resume {
            self.store.list_filenames().await?
        } else {
            Default::default()
        };

        let mut work = Vec::new();
        let mut checkpoint_skips = 0u64;
        for folder in &folders {
            let pdfs = self.scanner.find_pdfs(folder);
            tracing::info!(
                folder = %folder.display(),
                pdf_count = pdfs.len(),
                "scanned source folder"
            );
            for path in pdfs {
                let Some(filename) = path.file_name().and_then(|name| name.to_str()) else {
                    tracing::warn!(path = %path.display(), "skipping path with unusable filename");
                    continue;
                };
                if ingested.contains(filename) {
                    checkpoint_skips += 1;
                    continue;
                }
                work.push(path);
            }
        }

        if let Some(limit) = self.config.per_run_limit {
            work.truncate(limit);
        }

        tracing::info!(
            %run_id,
            total = work.len(),
            already_ingested = checkpoint_skips,
            workers = self.config.workers,
            ocr = self.extractor.ocr_enabled(),
            "starting ingestion run"
        );

        let mut tracker = ProgressTracker::new(work.len() as u64);
        let mut last_report = 0u64;
        let mut cancelled = false;

        for batch in work.chunks(self.config.workers.max(1)) {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let outcomes = join_all(batch.iter().map(|path| self.process_document(path))).await;

            for (path, outcome) in batch.iter().zip(&outcomes) {
                if let DocumentOutcome::Failed { reason } = outcome {
                    tracing::warn!(path = %path.display(), %reason, "document failed");
                }
                tracker.record(outcome);
            }

            if tracker.attempted() - last_report >= self.config.progress_interval {
                tracker.report();
                last_report = tracker.attempted();
            }
        }

        let mut stats = tracker.stats;
        stats.already_ingested += checkpoint_skips;

        let report = RunReport {
            stats,
            elapsed: tracker.elapsed(),
            cancelled,
        };
        tracing::info!(
            %run_id,
            persisted = report.stats.persisted,
            unreadable = report.stats.unreadable,
            needs_ocr = report.stats.needs_ocr,
            ocr_used = report.stats.ocr_used,
            errors = report.stats.errors,
            chunks = report.stats.chunks_created,
            embeddings = report.stats.embeddings_created,
            mentions = report.stats.mentions_extracted,
            elapsed = %format_duration(report.elapsed),
            cancelled,
            "ingestion run finished"
        );
        Ok(report)
    }

    /// One document, one outcome: all errors are folded into the outcome so
    /// a bad file can never take its batch down with it.
    async fn process_document(&self, path: &Path) -> DocumentOutcome {
        match self.try_process(path).await {
            Ok(outcome) => outcome,
            Err(IngestError::Storage(StorageError::DuplicateKey(filename))) => {
                tracing::debug!(%filename, "document created concurrently elsewhere, skipping");
                DocumentOutcome::AlreadyIngested
            }
            Err(error) => DocumentOutcome::Failed {
                reason: error.to_string(),
            },
        }
    }

    async fn try_process(&self, path: &Path) -> Result<DocumentOutcome, IngestError> {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()))?;

        // Narrow the race window against other ingestion processes; the
        // duplicate-key handling above is the backstop for what remains.
        if self.store.document_exists(&filename).await? {
            return Ok(DocumentOutcome::AlreadyIngested);
        }

        let extraction = self.extractor.extract(path, &self.gate).await?;
        let (text, page_count, used_ocr) = match extraction {
            Extraction::Direct { text, page_count } => (text, page_count, false),
            Extraction::Ocr { text, page_count } => (text, page_count, true),
            Extraction::NeedsOcr => return Ok(DocumentOutcome::NeedsOcr),
            Extraction::Unreadable => return Ok(DocumentOutcome::Unreadable),
        };

        // Final gate before anything is written.
        if !self.gate.is_readable(&text) {
            return Ok(DocumentOutcome::Unreadable);
        }

        let file_size = tokio::fs::metadata(path).await?.len();
        let document = self
            .store
            .create_document(NewDocument {
                title: title_from_filename(&filename),
                content: cap_content(&text),
                page_count,
                file_size,
                source_path: path.to_string_lossy().to_string(),
                filename,
            })
            .await?;

        let chunk_texts = chunk_text(&text, self.config.chunking);
        let mut chunks_created = 0;
        let mut embedded = 0;
        if !chunk_texts.is_empty() {
            let vectors = embed_chunks(&self.embedder, &chunk_texts, self.config.embedding).await;
            let chunks: Vec<NewChunk> = chunk_texts
                .into_iter()
                .zip(vectors)
                .enumerate()
                .map(|(index, (content, vector))| NewChunk {
                    document_id: document.id.clone(),
                    chunk_index: index as u32,
                    content,
                    page_number: 1,
                    embedding: if vector.is_empty() { None } else { Some(vector) },
                })
                .collect();

            chunks_created = chunks.len();
            embedded = chunks.iter().filter(|chunk| chunk.embedding.is_some()).count();
            self.store.create_chunks(&chunks).await?;
        }

        let mut hits = self.catalog.find_mentions(&text);
        hits.truncate(self.config.mention_cap);
        let mention_count = hits.len();
        if !hits.is_empty() {
            let records: Vec<NewMention> = hits
                .into_iter()
                .map(|hit| NewMention {
                    document_id: document.id.clone(),
                    name: hit.name,
                    normalized_name: hit.normalized_name,
                    context: hit.context,
                    page_number: None,
                })
                .collect();
            self.store.create_mentions(&records).await?;
        }

        tracing::debug!(
            filename = %document.filename,
            chars = document.content.chars().count(),
            used_ocr,
            chunks = chunks_created,
            mentions = mention_count,
            "document persisted"
        );

        Ok(DocumentOutcome::Persisted {
            used_ocr,
            chunks: chunks_created,
            embedded,
            mentions: mention_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{IngestionCoordinator, PipelineConfig};
    use crate::embeddings::{BatchPolicy, EmbeddingProvider};
    use crate::error::IngestError;
    use crate::extractor::ExtractionAdapter;
    use crate::mentions::MentionCatalog;
    use crate::ocr::OcrEngine;
    use crate::scanner::CorpusScanner;
    use crate::stores::MemoryStore;
    use async_trait::async_trait;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    const OCR_TEXT: &str = "It is said that Bill Gates was there at the house with the others. \
                            The witness could not say when they would come back to the island.";

    struct FakeOcr {
        dir: TempDir,
        recognized: String,
    }

    impl FakeOcr {
        fn readable() -> Self {
            Self::with_text(OCR_TEXT)
        }

        fn with_text(text: &str) -> Self {
            Self {
                dir: tempfile::tempdir().expect("temp dir"),
                recognized: text.to_string(),
            }
        }
    }

    #[async_trait]
    impl OcrEngine for FakeOcr {
        fn artifact_dir(&self) -> &Path {
            self.dir.path()
        }

        async fn rasterize_first_page(&self, _pdf: &Path, prefix: &str) -> Option<PathBuf> {
            let image = self.dir.path().join(format!("{prefix}-1.png"));
            fs::write(&image, b"png").expect("write image");
            Some(image)
        }

        async fn recognize_text(&self, _image: &Path) -> String {
            self.recognized.clone()
        }
    }

    struct FakeEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FakeEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IngestError> {
            Ok(texts.iter().map(|_| vec![0.5, 0.25]).collect())
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FailingEmbedder {
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, IngestError> {
            Err(IngestError::Embedding("provider offline".to_string()))
        }
    }

    fn corpus_with(files: &[&str]) -> TempDir {
        let dir = tempfile::tempdir().expect("corpus root");
        let folder = dir.path().join("DataSet 1");
        fs::create_dir(&folder).expect("source folder");
        for name in files {
            // lopdf cannot parse these, so every document takes the OCR path.
            fs::write(folder.join(name), b"%PDF-1.4\n%scanned").expect("write pdf");
        }
        dir
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            workers: 2,
            embedding: BatchPolicy {
                batch_size: 10,
                batch_delay: std::time::Duration::from_millis(1),
                retry_delay: std::time::Duration::from_millis(1),
            },
            ..PipelineConfig::default()
        }
    }

    fn coordinator_with<E: EmbeddingProvider>(
        embedder: E,
        ocr: FakeOcr,
        config: PipelineConfig,
    ) -> IngestionCoordinator<MemoryStore, E, FakeOcr> {
        IngestionCoordinator::new(
            MemoryStore::new(),
            embedder,
            ExtractionAdapter::new(Some(ocr)),
            MentionCatalog::default(),
            CorpusScanner::with_default_patterns().expect("scanner"),
            config,
        )
        .expect("coordinator")
    }

    #[tokio::test]
    async fn documents_flow_through_to_chunks_and_mentions() {
        let corpus = corpus_with(&["a.pdf", "b.pdf"]);
        let coordinator = coordinator_with(FakeEmbedder, FakeOcr::readable(), config());

        let report = coordinator.run(corpus.path()).await.expect("run");

        assert_eq!(report.stats.persisted, 2);
        assert_eq!(report.stats.ocr_used, 2);
        assert_eq!(report.stats.errors, 0);
        assert_eq!(coordinator.store().document_count().await, 2);

        let document = coordinator
            .store()
            .document_by_filename("a.pdf")
            .await
            .expect("document a");
        let chunks = coordinator.store().chunks_for(&document.id).await;
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|chunk| chunk.embedding.is_some()));
        // indices contiguous from zero
        for (expected, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, expected as u32);
        }

        let mentions = coordinator.store().mentions_for(&document.id).await;
        assert!(mentions.iter().any(|mention| mention.name == "Bill Gates"));
        assert!(mentions.iter().all(|mention| mention.normalized_name == "bill gates"));
    }

    #[tokio::test]
    async fn second_run_is_idempotent() {
        let corpus = corpus_with(&["a.pdf", "b.pdf", "c.pdf"]);
        let coordinator = coordinator_with(FakeEmbedder, FakeOcr::readable(), config());

        let first = coordinator.run(corpus.path()).await.expect("first run");
        assert_eq!(first.stats.persisted, 3);

        let second = coordinator.run(corpus.path()).await.expect("second run");
        assert_eq!(second.stats.persisted, 0);
        assert_eq!(second.stats.already_ingested, 3);
        assert_eq!(coordinator.store().document_count().await, 3);
    }

    #[tokio::test]
    async fn failed_embeddings_still_persist_chunks() {
        let corpus = corpus_with(&["a.pdf"]);
        let coordinator = coordinator_with(FailingEmbedder, FakeOcr::readable(), config());

        let report = coordinator.run(corpus.path()).await.expect("run");
        assert_eq!(report.stats.persisted, 1);
        assert_eq!(report.stats.embeddings_created, 0);

        let document = coordinator
            .store()
            .document_by_filename("a.pdf")
            .await
            .expect("document");
        let chunks = coordinator.store().chunks_for(&document.id).await;
        assert!(!chunks.is_empty(), "chunks must survive embedding failure");
        assert!(chunks.iter().all(|chunk| chunk.embedding.is_none()));
    }

    #[tokio::test]
    async fn mention_extraction_is_capped() {
        let text = "It is said that Bill Gates was there with them at the time. ".repeat(60);
        let corpus = corpus_with(&["a.pdf"]);
        let coordinator = coordinator_with(FakeEmbedder, FakeOcr::with_text(&text), config());

        let report = coordinator.run(corpus.path()).await.expect("run");
        assert_eq!(report.stats.persisted, 1);
        assert_eq!(report.stats.mentions_extracted, 50);

        let document = coordinator
            .store()
            .document_by_filename("a.pdf")
            .await
            .expect("document");
        assert_eq!(coordinator.store().mentions_for(&document.id).await.len(), 50);
    }

    #[tokio::test]
    async fn unreadable_ocr_output_is_excluded_not_an_error() {
        let corpus = corpus_with(&["a.pdf"]);
        let coordinator =
            coordinator_with(FakeEmbedder, FakeOcr::with_text("%%% @@@ ###"), config());

        let report = coordinator.run(corpus.path()).await.expect("run");
        assert_eq!(report.stats.persisted, 0);
        assert_eq!(report.stats.unreadable, 1);
        assert_eq!(report.stats.errors, 0);
        assert_eq!(coordinator.store().document_count().await, 0);
    }

    #[tokio::test]
    async fn fast_mode_defers_image_pdfs() {
        let corpus = corpus_with(&["a.pdf", "b.pdf"]);
        let coordinator = IngestionCoordinator::new(
            MemoryStore::new(),
            FakeEmbedder,
            ExtractionAdapter::<FakeOcr>::new(None),
            MentionCatalog::default(),
            CorpusScanner::with_default_patterns().expect("scanner"),
            config(),
        )
        .expect("coordinator");

        let report = coordinator.run(corpus.path()).await.expect("run");
        assert_eq!(report.stats.needs_ocr, 2);
        assert_eq!(report.stats.persisted, 0);
        assert_eq!(coordinator.store().document_count().await, 0);
    }

    #[tokio::test]
    async fn per_run_limit_bounds_attempts() {
        let corpus = corpus_with(&["a.pdf", "b.pdf", "c.pdf", "d.pdf"]);
        let coordinator = coordinator_with(
            FakeEmbedder,
            FakeOcr::readable(),
            PipelineConfig {
                per_run_limit: Some(2),
                ..config()
            },
        );

        let report = coordinator.run(corpus.path()).await.expect("run");
        assert_eq!(report.stats.attempted, 2);
        assert_eq!(coordinator.store().document_count().await, 2);
    }

    #[tokio::test]
    async fn cancellation_stops_before_the_next_batch() {
        let corpus = corpus_with(&["a.pdf", "b.pdf"]);
        let coordinator = coordinator_with(FakeEmbedder, FakeOcr::readable(), config());

        coordinator.cancel_flag().cancel();
        let report = coordinator.run(corpus.path()).await.expect("run");

        assert!(report.cancelled);
        assert_eq!(report.stats.attempted, 0);
        assert_eq!(coordinator.store().document_count().await, 0);
    }

    #[tokio::test]
    async fn missing_corpus_root_is_fatal() {
        let coordinator = coordinator_with(FakeEmbedder, FakeOcr::readable(), config());
        let result = coordinator.run(Path::new("/nonexistent-corpus")).await;
        assert!(result.is_err());
    }
}
