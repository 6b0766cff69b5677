use crate::error::ProcessError;
use crate::processor::ocr::OcrCapability;

/// Raster images only carry text through OCR.
pub fn extract_image(bytes: &[u8], ocr: &OcrCapability) -> Result<String, ProcessError> {
    let _span = tracing::info_span!("processor.image").entered();

    let engine = ocr.engine().ok_or(ProcessError::OcrUnavailable)?;
    engine.recognize(bytes)
}
