use log::{debug, warn};

use crate::error::ProcessError;
use crate::processor::ocr::{OcrCapability, OcrEngine, PageRasterizer};

/// Text pulled from a PDF and whether it came from OCR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfText {
    pub text: String,
    pub ocr_used: bool,
}

/// Extracts the text layer, falling back to page OCR when the layer is
/// missing, too short or garbled. OCR output replaces the text layer.
///
/// A PDF that lopdf cannot parse is OCRed when possible and is an error
/// otherwise.
pub fn extract_pdf(
    bytes: &[u8],
    ocr: &OcrCapability,
    min_text_chars: usize,
) -> Result<PdfText, ProcessError> {
    let _span = tracing::info_span!("processor.pdf").entered();

    let doc = match lopdf::Document::load_mem(bytes) {
        Ok(doc) => doc,
        Err(e) => {
            warn!("lopdf failed to parse PDF: {}", e);
            let Some((engine, rasterizer)) = ocr.pdf_pipeline() else {
                return Err(ProcessError::PdfProcessing(format!(
                    "Failed to load PDF: {}. OCR fallback unavailable.",
                    e
                )));
            };
            let _ocr_span =
                tracing::info_span!("processor.ocr_fallback", reason = "parse_failed").entered();
            let pages = rasterizer.page_count(bytes)?;
            return Ok(PdfText {
                text: ocr_pages(bytes, pages, engine, rasterizer),
                ocr_used: true,
            });
        }
    };

    let text = extract_text_layer(&doc);
    if !text_layer_missing(&text, min_text_chars) {
        return Ok(PdfText {
            text,
            ocr_used: false,
        });
    }

    let Some((engine, rasterizer)) = ocr.pdf_pipeline() else {
        debug!("PDF text layer is thin and OCR is unavailable; keeping it");
        return Ok(PdfText {
            text,
            ocr_used: false,
        });
    };

    let _ocr_span =
        tracing::info_span!("processor.ocr_fallback", reason = "text_quality").entered();
    Ok(PdfText {
        text: ocr_pages(bytes, doc.get_pages().len(), engine, rasterizer),
        ocr_used: true,
    })
}

fn extract_text_layer(doc: &lopdf::Document) -> String {
    let mut text = String::new();
    for page_num in doc.get_pages().keys() {
        match doc.extract_text(&[*page_num]) {
            Ok(page_text) => {
                text.push_str(&page_text);
                text.push('\n');
            }
            Err(e) => debug!("No text on page {}: {}", page_num, e),
        }
    }
    text
}

/// Pages that fail to render or recognize are skipped.
fn ocr_pages(
    bytes: &[u8],
    page_count: usize,
    engine: &dyn OcrEngine,
    rasterizer: &dyn PageRasterizer,
) -> String {
    let mut all_text = String::new();
    for page in 1..=page_count as u32 {
        let recognized = rasterizer
            .render_page(bytes, page)
            .and_then(|image| engine.recognize(&image));
        match recognized {
            Ok(page_text) => {
                all_text.push_str(&page_text);
                all_text.push('\n');
            }
            Err(e) => warn!("OCR of page {} failed: {}", page, e),
        }
    }
    all_text
}

/// Marker lopdf emits for CID fonts it cannot decode.
const IDENTITY_H_PATTERN: &str = "?Identity-H Unimplemented?";

/// The alphanumeric ratio is only judged above this many characters.
const MIN_TOTAL_CHARS: usize = 50;

const MIN_ALPHANUMERIC_PERCENT: usize = 10;

fn text_layer_missing(text: &str, min_text_chars: usize) -> bool {
    let significant = text.chars().filter(|c| !c.is_whitespace()).count();
    significant < min_text_chars || is_garbled(text)
}

/// Empty text, text made only of Identity-H markers, or text with a very
/// low share of alphanumeric characters.
fn is_garbled(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return true;
    }

    let cleaned = trimmed
        .replace(IDENTITY_H_PATTERN, "")
        .replace(char::is_whitespace, "");
    if cleaned.is_empty() {
        return true;
    }

    let total_chars = trimmed.chars().count();
    let alphanumeric_chars = trimmed.chars().filter(|c| c.is_alphanumeric()).count();
    total_chars > MIN_TOTAL_CHARS && alphanumeric_chars * 100 < total_chars * MIN_ALPHANUMERIC_PERCENT
}
