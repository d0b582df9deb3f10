use chrono::Utc;
use clap::{Parser, Subcommand};
use pdf_ingest_core::{
    BatchPolicy, ChunkingConfig, CorpusScanner, EmbeddingConfig, ExtractionAdapter,
    HttpEmbeddingClient, IngestionCoordinator, MentionCatalog, OcrConfig, PipelineConfig,
    PopplerTesseract, ReadabilityConfig, RestStore, DEFAULT_EMBEDDING_MODEL,
};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-ingest", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Document-service base URL
    #[arg(long, default_value = "http://localhost:8080")]
    store_url: String,

    /// Embedding API endpoint
    #[arg(long, default_value = "https://api.openai.com/v1/embeddings")]
    embedding_endpoint: String,

    /// Embedding API credential
    #[arg(long, env = "EMBEDDING_API_KEY", hide_env_values = true)]
    embedding_api_key: Option<String>,

    /// Embedding model identifier
    #[arg(long, default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,
}

#[derive(Subcommand)]
enum Command {
    /// Report source folders and PDF counts under the corpus root.
    Scan {
        /// Corpus root containing the release folders.
        #[arg(long)]
        root: PathBuf,
    },
    /// Ingest every unprocessed PDF under the corpus root.
    Ingest {
        /// Corpus root containing the release folders.
        #[arg(long)]
        root: PathBuf,
        /// Concurrent document workers. Keep low with OCR enabled.
        #[arg(long, default_value = "3")]
        workers: usize,
        /// Skip the OCR fallback; image-only PDFs are deferred for a later
        /// OCR-enabled run.
        #[arg(long, default_value_t = false)]
        no_ocr: bool,
        /// Rasterization resolution for the OCR fallback.
        #[arg(long, default_value = "300")]
        dpi: u32,
        /// OCR recognition language.
        #[arg(long, default_value = "eng")]
        ocr_language: String,
        /// Stop after this many documents.
        #[arg(long)]
        limit: Option<usize>,
        /// Ignore the resumability checkpoint and reconsider every file.
        #[arg(long, default_value_t = false)]
        from_scratch: bool,
        /// JSON array of notable names to track instead of the built-in
        /// catalog.
        #[arg(long)]
        names_file: Option<PathBuf>,
        /// Chunks per embedding API call.
        #[arg(long, default_value = "20")]
        embedding_batch_size: usize,
        /// Token budget per chunk.
        #[arg(long, default_value = "500")]
        chunk_tokens: usize,
        /// Token budget for the overlap between consecutive chunks.
        #[arg(long, default_value = "50")]
        chunk_overlap: usize,
        /// Minimum extracted-text length accepted by the readability gate.
        #[arg(long, default_value = "50")]
        min_text_chars: usize,
        /// Minimum common-word ratio accepted by the readability gate.
        #[arg(long, default_value = "0.2")]
        min_word_ratio: f64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "pdf-ingest boot"
    );

    match cli.command {
        Command::Scan { root } => {
            let scanner = CorpusScanner::with_default_patterns()?;
            let folders = scanner.find_source_folders(&root)?;

            let mut total = 0usize;
            for folder in &folders {
                let count = scanner.find_pdfs(folder).len();
                total += count;
                println!(
                    "{}: {} PDFs",
                    folder.file_name().and_then(|name| name.to_str()).unwrap_or("?"),
                    count
                );
            }
            println!("{} folders, {} PDFs total", folders.len(), total);
        }
        Command::Ingest {
            root,
            workers,
            no_ocr,
            dpi,
            ocr_language,
            limit,
            from_scratch,
            names_file,
            embedding_batch_size,
            chunk_tokens,
            chunk_overlap,
            min_text_chars,
            min_word_ratio,
        } => {
            // Configuration problems stop the run before any document is
            // touched; everything past this point degrades per document.
            let api_key = cli.embedding_api_key.ok_or_else(|| {
                anyhow::anyhow!("embedding credential missing: set EMBEDDING_API_KEY or --embedding-api-key")
            })?;

            if !root.is_dir() {
                anyhow::bail!("corpus root {} is not a readable directory", root.display());
            }

            if !no_ocr {
                PopplerTesseract::ensure_tools().await.map_err(|error| {
                    anyhow::anyhow!("{error}; install poppler and tesseract or pass --no-ocr")
                })?;
            }

            let store = RestStore::new(&cli.store_url);
            if let Err(error) = store.ping().await {
                anyhow::bail!("document service at {} unreachable: {error}", cli.store_url);
            }

            let embedder = HttpEmbeddingClient::new(EmbeddingConfig::new(
                &cli.embedding_endpoint,
                api_key,
                cli.embedding_model,
            )?);

            let catalog = match names_file {
                Some(path) => MentionCatalog::from_json_file(&path)?,
                None => MentionCatalog::default(),
            };

            let ocr = (!no_ocr).then(|| {
                PopplerTesseract::new(OcrConfig {
                    dpi,
                    language: ocr_language,
                    ..OcrConfig::default()
                })
            });

            let config = PipelineConfig {
                workers,
                per_run_limit: limit,
                resume: !from_scratch,
                chunking: ChunkingConfig {
                    max_tokens: chunk_tokens,
                    overlap_tokens: chunk_overlap,
                    ..ChunkingConfig::default()
                },
                readability: ReadabilityConfig {
                    min_text_chars,
                    min_common_word_ratio: min_word_ratio,
                    ..ReadabilityConfig::default()
                },
                embedding: BatchPolicy {
                    batch_size: embedding_batch_size,
                    ..BatchPolicy::default()
                },
                ..PipelineConfig::default()
            };

            let coordinator = IngestionCoordinator::new(
                store,
                embedder,
                ExtractionAdapter::new(ocr),
                catalog,
                CorpusScanner::with_default_patterns()?,
                config,
            )?;

            let cancel = coordinator.cancel_flag();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, finishing the in-flight batch then stopping");
                    cancel.cancel();
                }
            });

            let report = coordinator.run(&root).await?;

            println!(
                "{} documents ingested ({} via OCR), {} chunks, {} embeddings, {} mentions",
                report.stats.persisted,
                report.stats.ocr_used,
                report.stats.chunks_created,
                report.stats.embeddings_created,
                report.stats.mentions_extracted,
            );
            println!(
                "skipped: {} already ingested, {} unreadable, {} awaiting OCR, {} errors",
                report.stats.already_ingested,
                report.stats.unreadable,
                report.stats.needs_ocr,
                report.stats.errors,
            );
            if report.cancelled {
                println!("run interrupted; re-run to resume from the checkpoint");
            }
        }
    }

    Ok(())
}
