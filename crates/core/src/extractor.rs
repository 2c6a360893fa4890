use crate::error::ExtractError;
use crate::models::Extraction;
use async_trait::async_trait;
use lopdf::Document as PdfDocument;
use std::path::Path;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, warn};

pub const NO_IMAGE_TEXT: &str = "No text could be extracted from this image.";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Docx,
    Image,
    PlainText,
    Other,
}

impl FileKind {
    pub fn from_filename(filename: &str) -> Self {
        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => Self::Pdf,
            "docx" | "doc" => Self::Docx,
            "txt" => Self::PlainText,
            ext if IMAGE_EXTENSIONS.contains(&ext) => Self::Image,
            _ => Self::Other,
        }
    }
}

pub trait PdfExtractor: Send + Sync {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<PageText>, ExtractError>;
}

pub trait DocxExtractor: Send + Sync {
    fn extract_paragraphs(&self, bytes: &[u8]) -> Result<Vec<String>, ExtractError>;
}

/// Page segmentation strategy for a single OCR pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrMode {
    Automatic,
    SingleBlock,
}

impl OcrMode {
    fn page_segmentation(self) -> &'static str {
        match self {
            Self::Automatic => "3",
            Self::SingleBlock => "6",
        }
    }
}

/// Dropping the `recognize` future must stop any work it started.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, bytes: &[u8], mode: OcrMode) -> Result<String, ExtractError>;
}

#[derive(Default)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<PageText>, ExtractError> {
        let document =
            PdfDocument::load_mem(bytes).map_err(|error| ExtractError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            // A page without a text layer contributes nothing rather than failing the file.
            let text = match document.extract_text(&[page_no]) {
                Ok(text) => text,
                Err(error) => {
                    debug!(page = page_no, error = %error, "pdf page has no extractable text");
                    String::new()
                }
            };

            pages.push(PageText {
                number: page_no,
                text,
            });
        }

        Ok(pages)
    }
}

#[derive(Default)]
pub struct DocxRsExtractor;

impl DocxExtractor for DocxRsExtractor {
    fn extract_paragraphs(&self, bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
        let docx =
            docx_rs::read_docx(bytes).map_err(|error| ExtractError::DocxParse(error.to_string()))?;

        let mut paragraphs = Vec::new();
        for child in &docx.document.children {
            if let docx_rs::DocumentChild::Paragraph(paragraph) = child {
                let mut text = String::new();
                push_paragraph_text(&paragraph.children, &mut text);
                paragraphs.push(text);
            }
        }

        Ok(paragraphs)
    }
}

fn push_paragraph_text(children: &[docx_rs::ParagraphChild], text: &mut String) {
    for child in children {
        match child {
            docx_rs::ParagraphChild::Run(run) => {
                for child in &run.children {
                    if let docx_rs::RunChild::Text(fragment) = child {
                        text.push_str(&fragment.text);
                    }
                }
            }
            docx_rs::ParagraphChild::Hyperlink(link) => push_paragraph_text(&link.children, text),
            _ => {}
        }
    }
}

/// Runs the `tesseract` binary against a temporary copy of the image.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    pub binary: String,
    pub languages: String,
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self {
            binary: "tesseract".to_string(),
            languages: "eng".to_string(),
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(&self, bytes: &[u8], mode: OcrMode) -> Result<String, ExtractError> {
        let input = tempfile::Builder::new()
            .prefix("docquery-ocr-")
            .tempfile()?;
        tokio::fs::write(input.path(), bytes).await?;

        let output = Command::new(&self.binary)
            .arg(input.path())
            .arg("stdout")
            .args(["--psm", mode.page_segmentation()])
            .args(["-l", &self.languages])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|error| ExtractError::Ocr(format!("failed to run {}: {error}", self.binary)))?;

        if !output.status.success() {
            return Err(ExtractError::Ocr(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Format dispatcher. Cloning is cheap; backends are shared.
#[derive(Clone)]
pub struct Extractor {
    pdf: Arc<dyn PdfExtractor>,
    docx: Arc<dyn DocxExtractor>,
    ocr: Arc<dyn OcrEngine>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(
            Arc::new(LopdfExtractor),
            Arc::new(DocxRsExtractor),
            Arc::new(TesseractOcr::default()),
        )
    }
}

impl Extractor {
    pub fn new(
        pdf: Arc<dyn PdfExtractor>,
        docx: Arc<dyn DocxExtractor>,
        ocr: Arc<dyn OcrEngine>,
    ) -> Self {
        Self { pdf, docx, ocr }
    }

    pub async fn extract(&self, filename: &str, bytes: Vec<u8>) -> Result<Extraction, ExtractError> {
        self.extract_holding(filename, bytes, ()).await
    }

    /// Extracts while holding `guard` until the work has really finished.
    /// Parsers run on the blocking pool and take the guard with them, so a
    /// caller that stops waiting does not release it early. OCR runs on the
    /// caller's task and is cancelled with it.
    pub async fn extract_holding<G>(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        guard: G,
    ) -> Result<Extraction, ExtractError>
    where
        G: Send + 'static,
    {
        let kind = FileKind::from_filename(filename);
        if kind == FileKind::Image {
            let extraction = self.extract_image(filename, bytes).await;
            drop(guard);
            return Ok(extraction);
        }

        let extractor = self.clone();
        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            extractor.extract_document(kind, &bytes)
        })
        .await
        .map_err(|error| ExtractError::Worker(error.to_string()))?
    }

    fn extract_document(&self, kind: FileKind, bytes: &[u8]) -> Result<Extraction, ExtractError> {
        match kind {
            FileKind::Pdf => {
                let pages = self.pdf.extract_pages(bytes)?;
                Ok(Extraction::text(
                    pages
                        .into_iter()
                        .map(|page| page.text)
                        .collect::<Vec<_>>()
                        .join("\n"),
                ))
            }
            FileKind::Docx => {
                let paragraphs = self.docx.extract_paragraphs(bytes)?;
                Ok(Extraction::text(paragraphs.join(" ")))
            }
            FileKind::PlainText => Ok(Extraction::text(decode_text(bytes))),
            FileKind::Other => decode_unknown(bytes).map(Extraction::text),
            FileKind::Image => Err(ExtractError::UnsupportedFormat(
                "images go through ocr".to_string(),
            )),
        }
    }

    async fn extract_image(&self, filename: &str, bytes: Vec<u8>) -> Extraction {
        let mut text = self
            .recognize_once(filename, &bytes, OcrMode::Automatic)
            .await;
        if text.is_none() {
            debug!(filename, "ocr found no text, retrying with single-block segmentation");
            text = self
                .recognize_once(filename, &bytes, OcrMode::SingleBlock)
                .await;
        }

        match text {
            Some(text) => Extraction::image(text, bytes),
            None => {
                warn!(filename, "no text recognized in image");
                Extraction::image(NO_IMAGE_TEXT, bytes)
            }
        }
    }

    async fn recognize_once(&self, filename: &str, bytes: &[u8], mode: OcrMode) -> Option<String> {
        match self.ocr.recognize(bytes, mode).await {
            Ok(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Ok(_) => None,
            Err(error) => {
                warn!(filename, ?mode, error = %error, "ocr pass failed");
                None
            }
        }
    }
}

/// UTF-8 first, then Latin-1 when the bytes read as text in that encoding,
/// then UTF-8 with replacement characters. Never fails.
pub fn decode_text(bytes: &[u8]) -> String {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }

    let latin1 = bytes.iter().map(|&byte| byte as char).collect::<String>();
    if latin1
        .chars()
        .all(|character| !character.is_control() || character.is_whitespace())
    {
        return latin1;
    }

    String::from_utf8_lossy(bytes).to_string()
}

fn decode_unknown(bytes: &[u8]) -> Result<String, ExtractError> {
    if bytes.contains(&0) {
        return Err(ExtractError::UnsupportedFormat(
            "binary content cannot be decoded as text".to_string(),
        ));
    }

    Ok(String::from_utf8_lossy(bytes).to_string())
}
