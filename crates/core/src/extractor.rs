use crate::error::IngestError;
use crate::ocr::{sanitize_prefix, OcrEngine, TempArtifacts};
use crate::readability::ReadabilityGate;
use std::path::Path;

/// How a document's text was obtained, or why it was not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Direct {
        text: String,
        page_count: Option<u32>,
    },
    Ocr {
        text: String,
        page_count: Option<u32>,
    },
    /// Direct text failed the gate and rasterization was unavailable,
    /// failed, or timed out; the document awaits an OCR-capable run.
    NeedsOcr,
    /// Every extraction attempt failed the readability gate.
    Unreadable,
}

/// Turns a PDF file into text: structural extraction first, then a
/// rasterize-and-recognize fallback when the direct result is noise.
/// Constructed without an engine it runs in fast mode and classifies
/// image-only PDFs as [`Extraction::NeedsOcr`].
pub struct ExtractionAdapter<O> {
    ocr: Option<O>,
}

impl<O: OcrEngine> ExtractionAdapter<O> {
    pub fn new(ocr: Option<O>) -> Self {
        Self { ocr }
    }

    pub fn ocr_enabled(&self) -> bool {
        self.ocr.is_some()
    }

    pub async fn extract(
        &self,
        path: &Path,
        gate: &ReadabilityGate,
    ) -> Result<Extraction, IngestError> {
        let bytes = tokio::fs::read(path).await?;
        let (text, page_count) = direct_extract(bytes).await;

        if gate.is_readable(&text) {
            return Ok(Extraction::Direct { text, page_count });
        }

        let Some(ocr) = &self.ocr else {
            return Ok(Extraction::NeedsOcr);
        };

        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()))?;
        let prefix = sanitize_prefix(&filename);

        // Guard lives until the end of the call so page images are removed
        // on every exit path, including recognition failure.
        let _artifacts = TempArtifacts::new(ocr.artifact_dir(), &prefix);

        let Some(image) = ocr.rasterize_first_page(path, &prefix).await else {
            return Ok(Extraction::NeedsOcr);
        };

        let recognized = ocr.recognize_text(&image).await;
        if gate.is_readable(&recognized) {
            Ok(Extraction::Ocr {
                text: recognized,
                page_count,
            })
        } else {
            Ok(Extraction::Unreadable)
        }
    }
}

/// Structural text extraction. Any parse failure means "no text here", not
/// an error: corrupt and encrypted files are routed to OCR by the caller.
async fn direct_extract(bytes: Vec<u8>) -> (String, Option<u32>) {
    let parsed = tokio::task::spawn_blocking(move || {
        let document = lopdf::Document::load_mem(&bytes)?;
        let pages: Vec<u32> = document.get_pages().keys().copied().collect();
        let page_count = pages.len() as u32;
        let text = document.extract_text(&pages)?;
        Ok::<_, lopdf::Error>((text, page_count))
    })
    .await;

    match parsed {
        Ok(Ok((text, page_count))) => (text, Some(page_count)),
        Ok(Err(error)) => {
            tracing::debug!(%error, "direct pdf extraction failed");
            (String::new(), None)
        }
        Err(error) => {
            tracing::debug!(%error, "pdf extraction task panicked");
            (String::new(), None)
        }
    }
}
