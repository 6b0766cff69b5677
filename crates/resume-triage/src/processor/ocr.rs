use std::io::Cursor;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

use log::{info, warn};

use crate::config::OcrConfig;
use crate::error::ProcessError;

/// Turns one raster image into text.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &[u8]) -> Result<String, ProcessError>;
}

/// Renders PDF pages to raster images for OCR.
pub trait PageRasterizer: Send + Sync {
    fn page_count(&self, pdf: &[u8]) -> Result<usize, ProcessError>;
    /// `page` is 1-based.
    fn render_page(&self, pdf: &[u8], page: u32) -> Result<Vec<u8>, ProcessError>;
}

/// Whether OCR can be used, decided once at startup and handed to the
/// extractor.
#[derive(Clone)]
pub enum OcrCapability {
    Unavailable {
        reason: String,
    },
    Available {
        engine: Arc<dyn OcrEngine>,
        /// Without a rasterizer only image attachments can be OCRed.
        rasterizer: Option<Arc<dyn PageRasterizer>>,
    },
}

impl std::fmt::Debug for OcrCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable { reason } => {
                f.debug_struct("Unavailable").field("reason", reason).finish()
            }
            Self::Available { rasterizer, .. } => f
                .debug_struct("Available")
                .field("pdf_pages", &rasterizer.is_some())
                .finish(),
        }
    }
}

impl OcrCapability {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn available(
        engine: Arc<dyn OcrEngine>,
        rasterizer: Option<Arc<dyn PageRasterizer>>,
    ) -> Self {
        Self::Available { engine, rasterizer }
    }

    /// Probes for Tesseract (with the configured languages) and `pdftoppm`.
    pub fn probe(config: &OcrConfig) -> Self {
        if !config.enabled {
            return Self::unavailable("disabled in configuration");
        }

        let engine = TesseractOcr::new(&config.languages);
        if let Err(e) = leptess::LepTess::new(None, engine.languages()) {
            warn!("Tesseract not usable ({}), OCR disabled", e);
            return Self::unavailable(format!("tesseract: {}", e));
        }

        let rasterizer: Option<Arc<dyn PageRasterizer>> =
            match Command::new("pdftoppm").arg("-v").output() {
                Ok(_) => Some(Arc::new(PdftoppmRasterizer::new(config.dpi))),
                Err(e) => {
                    warn!(
                        "pdftoppm not found ({}); scanned PDFs will not be OCRed",
                        e
                    );
                    None
                }
            };

        info!(
            "OCR available (languages: {}, pdf pages: {})",
            engine.languages(),
            rasterizer.is_some()
        );
        Self::available(Arc::new(engine), rasterizer)
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available { .. })
    }

    pub fn engine(&self) -> Option<&dyn OcrEngine> {
        match self {
            Self::Available { engine, .. } => Some(engine.as_ref()),
            Self::Unavailable { .. } => None,
        }
    }

    /// Engine plus rasterizer, when both exist.
    pub fn pdf_pipeline(&self) -> Option<(&dyn OcrEngine, &dyn PageRasterizer)> {
        match self {
            Self::Available {
                engine,
                rasterizer: Some(rasterizer),
            } => Some((engine.as_ref(), rasterizer.as_ref())),
            _ => None,
        }
    }
}

/// Tesseract through leptess. A fresh instance is created per image since
/// `LepTess` is not `Sync`.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    languages: String,
}

impl TesseractOcr {
    pub fn new(languages: &[String]) -> Self {
        let languages = if languages.is_empty() {
            "eng".to_string()
        } else {
            languages.join("+")
        };
        Self { languages }
    }

    pub fn languages(&self) -> &str {
        &self.languages
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize(&self, image: &[u8]) -> Result<String, ProcessError> {
        let _span = tracing::info_span!("processor.ocr").entered();

        let img = image::load_from_memory(image)
            .map_err(|e| ProcessError::OcrFailed(format!("Failed to load image: {}", e)))?;

        let mut png_data = Vec::new();
        img.write_to(&mut Cursor::new(&mut png_data), image::ImageFormat::Png)
            .map_err(|e| ProcessError::OcrFailed(format!("Failed to convert image: {}", e)))?;

        let mut lt = leptess::LepTess::new(None, &self.languages).map_err(|e| {
            ProcessError::OcrFailed(format!("Failed to initialize Tesseract: {}", e))
        })?;
        lt.set_image_from_mem(&png_data)
            .map_err(|e| ProcessError::OcrFailed(format!("Failed to set image for OCR: {}", e)))?;

        lt.get_utf8_text()
            .map_err(|e| ProcessError::OcrFailed(format!("OCR failed: {}", e)))
    }
}

/// Renders pages with poppler's `pdftoppm`, counting pages with `pdfinfo`.
#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    dpi: u32,
}

/// Temp file removed on drop.
struct ScratchFile(PathBuf);

impl ScratchFile {
    fn write(prefix: &str, bytes: &[u8]) -> Result<Self, ProcessError> {
        let path = std::env::temp_dir().join(format!("{}_{}.pdf", prefix, uuid::Uuid::new_v4()));
        std::fs::write(&path, bytes)
            .map_err(|e| ProcessError::PdfProcessing(format!("Failed to write temp PDF: {}", e)))?;
        Ok(Self(path))
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

impl PdftoppmRasterizer {
    pub fn new(dpi: u32) -> Self {
        Self { dpi }
    }
}

impl PageRasterizer for PdftoppmRasterizer {
    fn page_count(&self, pdf: &[u8]) -> Result<usize, ProcessError> {
        let input = ScratchFile::write("triage_pagecount", pdf)?;

        let output = Command::new("pdfinfo").arg(&input.0).output().map_err(|e| {
            ProcessError::PdfProcessing(format!(
                "Failed to run pdfinfo: {}. Make sure poppler-utils is installed.",
                e
            ))
        })?;
        if !output.status.success() {
            return Err(ProcessError::PdfProcessing(format!(
                "pdfinfo failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        Ok(parse_page_count(&String::from_utf8_lossy(&output.stdout)).unwrap_or(1))
    }

    fn render_page(&self, pdf: &[u8], page: u32) -> Result<Vec<u8>, ProcessError> {
        let input = ScratchFile::write("triage_render", pdf)?;
        let prefix = std::env::temp_dir().join(format!("triage_page_{}", uuid::Uuid::new_v4()));
        let page_arg = page.to_string();

        let output = Command::new("pdftoppm")
            .arg("-png")
            .args(["-r", &self.dpi.to_string()])
            .args(["-f", &page_arg, "-l", &page_arg])
            .arg(&input.0)
            .arg(&prefix)
            .output()
            .map_err(|e| {
                ProcessError::PdfProcessing(format!(
                    "Failed to run pdftoppm: {}. Make sure poppler-utils is installed.",
                    e
                ))
            })?;
        if !output.status.success() {
            return Err(ProcessError::PdfProcessing(format!(
                "pdftoppm failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        // pdftoppm zero-pads the page suffix depending on the page count.
        let rendered = [
            format!("{}-{}.png", prefix.display(), page),
            format!("{}-{:02}.png", prefix.display(), page),
            format!("{}-{:03}.png", prefix.display(), page),
        ]
        .into_iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .ok_or_else(|| {
            ProcessError::PdfProcessing("Failed to find rendered page image".to_string())
        })?;

        let image = std::fs::read(&rendered).map_err(|e| {
            ProcessError::PdfProcessing(format!("Failed to read rendered image: {}", e))
        });
        let _ = std::fs::remove_file(&rendered);
        image
    }
}

fn parse_page_count(pdfinfo: &str) -> Option<usize> {
    pdfinfo
        .lines()
        .find_map(|line| line.strip_prefix("Pages:"))
        .and_then(|count| count.trim().parse().ok())
}
