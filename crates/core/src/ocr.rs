use crate::error::IngestError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// Settings for the external rasterizer and OCR binaries.
#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub dpi: u32,
    pub language: String,
    /// Shared scratch directory for rasterized page images.
    pub temp_dir: PathBuf,
    /// Budget for one external tool invocation.
    pub tool_timeout: Duration,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            language: "eng".to_string(),
            temp_dir: std::env::temp_dir().join("pdf-ingest-ocr"),
            tool_timeout: Duration::from_secs(60),
        }
    }
}

/// External OCR collaborator. Both operations are best-effort: rasterization
/// answers `None` and recognition answers an empty string on failure, and
/// the pipeline classifies the document accordingly instead of erroring.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Directory where this engine leaves page images, so callers can scope
    /// cleanup to their own prefix.
    fn artifact_dir(&self) -> &Path;

    /// Rasterize page 1 of the PDF to an image named under `prefix`.
    async fn rasterize_first_page(&self, pdf: &Path, prefix: &str) -> Option<PathBuf>;

    /// Recognize text from a rasterized page image.
    async fn recognize_text(&self, image: &Path) -> String;
}

/// OCR backed by poppler's `pdftoppm` and the `tesseract` CLI.
pub struct PopplerTesseract {
    config: OcrConfig,
}

impl PopplerTesseract {
    pub fn new(config: OcrConfig) -> Self {
        Self { config }
    }

    /// Startup probe for both binaries; a missing tool is a fatal
    /// configuration error, detected before any document is touched.
    pub async fn ensure_tools() -> Result<(), IngestError> {
        probe("pdftoppm", &["-v"]).await?;
        probe("tesseract", &["--version"]).await?;
        Ok(())
    }
}

async fn probe(binary: &str, args: &[&str]) -> Result<(), IngestError> {
    let status = Command::new(binary)
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    match status {
        Ok(status) if status.success() => Ok(()),
        _ => Err(IngestError::MissingTool(binary.to_string())),
    }
}

#[async_trait]
impl OcrEngine for PopplerTesseract {
    fn artifact_dir(&self) -> &Path {
        &self.config.temp_dir
    }

    async fn rasterize_first_page(&self, pdf: &Path, prefix: &str) -> Option<PathBuf> {
        if let Err(error) = tokio::fs::create_dir_all(&self.config.temp_dir).await {
            tracing::warn!(%error, "could not create OCR temp directory");
            return None;
        }

        let output_base = self.config.temp_dir.join(prefix);
        let run = Command::new("pdftoppm")
            .arg("-png")
            .args(["-f", "1", "-l", "1"])
            .args(["-r", &self.config.dpi.to_string()])
            .arg(pdf)
            .arg(&output_base)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match timeout(self.config.tool_timeout, run).await {
            Ok(Ok(status)) if status.success() => {}
            Ok(Ok(status)) => {
                tracing::debug!(pdf = %pdf.display(), code = ?status.code(), "pdftoppm failed");
                return None;
            }
            Ok(Err(error)) => {
                tracing::debug!(pdf = %pdf.display(), %error, "pdftoppm could not be spawned");
                return None;
            }
            Err(_) => {
                tracing::debug!(pdf = %pdf.display(), "pdftoppm timed out");
                return None;
            }
        }

        // pdftoppm picks the page-number suffix; probe the usual spellings.
        for suffix in ["-1.png", "-01.png", ".png"] {
            let candidate = self.config.temp_dir.join(format!("{prefix}{suffix}"));
            if candidate.exists() {
                return Some(candidate);
            }
        }
        None
    }

    async fn recognize_text(&self, image: &Path) -> String {
        let run = Command::new("tesseract")
            .arg(image)
            .arg("stdout")
            .args(["-l", &self.config.language])
            .stderr(Stdio::null())
            .output();

        match timeout(self.config.tool_timeout, run).await {
            Ok(Ok(output)) if output.status.success() => {
                String::from_utf8_lossy(&output.stdout).into_owned()
            }
            Ok(Ok(output)) => {
                tracing::debug!(image = %image.display(), code = ?output.status.code(), "tesseract failed");
                String::new()
            }
            Ok(Err(error)) => {
                tracing::debug!(image = %image.display(), %error, "tesseract could not be spawned");
                String::new()
            }
            Err(_) => {
                tracing::debug!(image = %image.display(), "tesseract timed out");
                String::new()
            }
        }
    }
}

/// Scoped cleanup of one worker's rasterization artifacts. Prefixes are
/// derived from the sanitized filename, so concurrent workers never touch
/// each other's files, and dropping the guard removes them on every exit
/// path.
pub struct TempArtifacts {
    dir: PathBuf,
    prefix: String,
}

impl TempArtifacts {
    pub fn new(dir: &Path, prefix: &str) -> Self {
        Self {
            dir: dir.to_path_buf(),
            prefix: prefix.to_string(),
        }
    }
}

impl Drop for TempArtifacts {
    fn drop(&mut self) {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return;
        };
        for entry in entries.flatten() {
            if entry.file_name().to_string_lossy().starts_with(&self.prefix) {
                let _ = std::fs::remove_file(entry.path());
            }
        }
    }
}

/// Temp-file namespace for a source file: alphanumerics kept, everything
/// else collapsed to underscores, capped at 50 chars.
pub fn sanitize_prefix(filename: &str) -> String {
    filename
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(50)
        .collect()
}
