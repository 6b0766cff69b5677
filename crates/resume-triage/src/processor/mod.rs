pub mod docx;
pub mod image;
pub mod ocr;
pub mod pdf;
pub mod text;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::config::OcrConfig;
use crate::error::ProcessError;

pub use ocr::{OcrCapability, OcrEngine, PageRasterizer, PdftoppmRasterizer, TesseractOcr};

/// Archives, legacy office binaries and mail containers. Attachments with
/// these extensions never reach a parser.
pub const UNSUPPORTED_EXTENSIONS: &[&str] = &[
    "zip", "rar", "7z", "msg", "eml", "xls", "xlsx", "ppt", "pptx", "doc",
];

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Pdf,
    Docx,
    PlainText,
    Image,
}

impl DocumentKind {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "txt" | "text" | "md" => Some(Self::PlainText),
            "png" | "jpg" | "jpeg" | "gif" | "bmp" | "tif" | "tiff" | "webp" => Some(Self::Image),
            _ => None,
        }
    }

    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "application/pdf" => Some(Self::Pdf),
            DOCX_MIME => Some(Self::Docx),
            e if e.starts_with("text/") => Some(Self::PlainText),
            _ => mime_guess::get_mime_extensions_str(&essence)
                .into_iter()
                .flatten()
                .find_map(|ext| Self::from_extension(ext)),
        }
    }

    /// Picks the kind for an attachment. The filename extension wins over
    /// the declared content type; either one naming an unsupported format
    /// rejects the attachment.
    pub fn detect(filename: &str, content_type: Option<&str>) -> Result<Self, ProcessError> {
        let ext = extension(filename);

        if let Some(ext) = ext.as_deref() {
            if is_unsupported_extension(ext) {
                return Err(ProcessError::UnsupportedFormat(ext.to_string()));
            }
            if let Some(kind) = Self::from_extension(ext) {
                return Ok(kind);
            }
        }

        if let Some(content_type) = content_type.filter(|c| !c.trim().is_empty()) {
            if content_type_is_unsupported(content_type) {
                return Err(ProcessError::UnsupportedFormat(content_type.to_string()));
            }
            if let Some(kind) = Self::from_content_type(content_type) {
                return Ok(kind);
            }
        }

        Err(ProcessError::UnsupportedFormat(
            ext.or_else(|| content_type.map(str::to_string))
                .unwrap_or_else(|| "unknown".to_string()),
        ))
    }
}

fn extension(filename: &str) -> Option<String> {
    std::path::Path::new(filename.trim())
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

pub fn is_unsupported_extension(ext: &str) -> bool {
    let ext = ext.trim_start_matches('.').to_ascii_lowercase();
    UNSUPPORTED_EXTENSIONS.contains(&ext.as_str())
}

fn content_type_is_unsupported(content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    mime_guess::get_mime_extensions_str(essence)
        .is_some_and(|exts| exts.iter().any(|e| is_unsupported_extension(e)))
}

/// Text of one attachment, consumed by scoring and then dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDocument {
    pub kind: DocumentKind,
    pub text: String,
    pub ocr_used: bool,
    pub char_count: usize,
}

impl ExtractedDocument {
    fn new(kind: DocumentKind, text: String, ocr_used: bool) -> Self {
        let char_count = text.chars().count();
        Self {
            kind,
            text,
            ocr_used,
            char_count,
        }
    }

    pub fn empty(kind: DocumentKind) -> Self {
        Self::new(kind, String::new(), false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    Text(ExtractedDocument),
    Failed {
        kind: DocumentKind,
        error: ProcessError,
    },
}

impl ExtractionOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// A failed extraction becomes an empty document.
    pub fn into_document(self) -> ExtractedDocument {
        match self {
            Self::Text(doc) => doc,
            Self::Failed { kind, .. } => ExtractedDocument::empty(kind),
        }
    }
}

/// Dispatches attachment bytes to the handler for their kind.
#[derive(Debug, Clone)]
pub struct ContentExtractor {
    ocr: OcrCapability,
    min_text_chars: usize,
}

impl ContentExtractor {
    pub fn new(ocr: OcrCapability, min_text_chars: usize) -> Self {
        Self {
            ocr,
            min_text_chars,
        }
    }

    /// Probes the OCR backend once and keeps the result.
    pub fn from_config(config: &OcrConfig) -> Self {
        Self::new(OcrCapability::probe(config), config.min_text_chars)
    }

    pub fn ocr(&self) -> &OcrCapability {
        &self.ocr
    }

    pub fn extract(&self, kind: DocumentKind, bytes: &[u8]) -> ExtractionOutcome {
        let result = match kind {
            DocumentKind::Pdf => pdf::extract_pdf(bytes, &self.ocr, self.min_text_chars)
                .map(|pdf| (pdf.text, pdf.ocr_used)),
            DocumentKind::Docx => docx::extract_docx(bytes).map(|text| (text, false)),
            DocumentKind::PlainText => Ok((text::extract_text(bytes), false)),
            DocumentKind::Image => image::extract_image(bytes, &self.ocr).map(|text| (text, true)),
        };

        match result {
            Ok((text, ocr_used)) => {
                debug!(
                    "Extracted {} chars from {:?} (ocr: {})",
                    text.chars().count(),
                    kind,
                    ocr_used
                );
                ExtractionOutcome::Text(ExtractedDocument::new(kind, text, ocr_used))
            }
            Err(error) => {
                warn!("Extraction of {:?} failed: {}", kind, error);
                ExtractionOutcome::Failed { kind, error }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_by_extension() {
        assert_eq!(DocumentKind::detect("cv.PDF", None).unwrap(), DocumentKind::Pdf);
        assert_eq!(DocumentKind::detect("cv.docx", None).unwrap(), DocumentKind::Docx);
        assert_eq!(DocumentKind::detect("cv.txt", None).unwrap(), DocumentKind::PlainText);
        assert_eq!(DocumentKind::detect("scan.jpeg", None).unwrap(), DocumentKind::Image);
    }

    #[test]
    fn test_extension_wins_over_content_type() {
        let kind = DocumentKind::detect("cv.pdf", Some("application/octet-stream")).unwrap();
        assert_eq!(kind, DocumentKind::Pdf);

        let kind = DocumentKind::detect("cv.docx", Some("application/pdf")).unwrap();
        assert_eq!(kind, DocumentKind::Docx);
    }

    #[test]
    fn test_content_type_used_without_known_extension() {
        assert_eq!(
            DocumentKind::detect("curriculo", Some("application/pdf")).unwrap(),
            DocumentKind::Pdf
        );
        assert_eq!(
            DocumentKind::detect("curriculo.bin", Some(DOCX_MIME)).unwrap(),
            DocumentKind::Docx
        );
        assert_eq!(
            DocumentKind::detect("foto", Some("image/png")).unwrap(),
            DocumentKind::Image
        );
        assert_eq!(
            DocumentKind::detect("notas", Some("text/plain; charset=utf-8")).unwrap(),
            DocumentKind::PlainText
        );
    }

    #[test]
    fn test_unsupported_extensions_rejected() {
        for name in ["cv.zip", "cv.RAR", "a.7z", "m.msg", "m.eml", "p.xlsx", "s.pptx", "old.doc"] {
            assert!(
                matches!(
                    DocumentKind::detect(name, Some("application/pdf")),
                    Err(ProcessError::UnsupportedFormat(_))
                ),
                "{} should be rejected",
                name
            );
        }
    }

    #[test]
    fn test_unsupported_content_type_rejected() {
        assert!(DocumentKind::detect("arquivo", Some("application/zip")).is_err());
        assert!(DocumentKind::detect("arquivo", Some("application/msword")).is_err());
    }

    #[test]
    fn test_unknown_rejected() {
        assert!(DocumentKind::detect("dados.xyz", None).is_err());
        assert!(DocumentKind::detect("", None).is_err());
        assert!(DocumentKind::detect("x", Some("application/octet-stream")).is_err());
    }

    #[test]
    fn test_extract_plain_text() {
        let extractor = ContentExtractor::new(OcrCapability::unavailable("test"), 80);
        let outcome = extractor.extract(DocumentKind::PlainText, "Olá mundo".as_bytes());
        let doc = outcome.into_document();
        assert_eq!(doc.text, "Olá mundo");
        assert_eq!(doc.char_count, 9);
        assert!(!doc.ocr_used);
    }

    #[test]
    fn test_failures_become_empty_documents() {
        let extractor = ContentExtractor::new(OcrCapability::unavailable("test"), 80);

        let outcome = extractor.extract(DocumentKind::Image, b"\x89PNG");
        assert!(outcome.is_failed());
        assert_eq!(outcome.into_document(), ExtractedDocument::empty(DocumentKind::Image));

        let outcome = extractor.extract(DocumentKind::Docx, b"garbage");
        assert!(matches!(
            outcome,
            ExtractionOutcome::Failed {
                error: ProcessError::DocxProcessing(_),
                ..
            }
        ));

        let doc = extractor.extract(DocumentKind::Pdf, b"garbage").into_document();
        assert!(doc.text.is_empty());
        assert_eq!(doc.char_count, 0);
    }
}
