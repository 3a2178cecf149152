//! Page text plus OCR over embedded images.

use std::path::Path;

use image::GenericImageView;
use serde::Serialize;
use tracing::{info, warn};

use crate::analysis::{TextRecognizer, word_count};
use crate::error::ServiceResult;

use super::{PageRange, create_pdfium, get_page, open_document, page_images, page_text, resolve_page_range};

/// OCR output shorter than this is reported with low confidence
const HIGH_CONFIDENCE_MIN_CHARS: usize = 10;

#[derive(Debug, Serialize)]
pub struct ImageText {
    pub image_index: usize,
    pub ocr_text: String,
    pub confidence: &'static str,
}

impl ImageText {
    fn new(image_index: usize, ocr_text: String) -> Self {
        let confidence = if ocr_text.chars().count() > HIGH_CONFIDENCE_MIN_CHARS {
            "high"
        } else {
            "low"
        };
        Self {
            image_index,
            ocr_text,
            confidence,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PageOcr {
    pub page_number: u32,
    pub text: String,
    pub ocr_text: String,
    pub images_with_text: Vec<ImageText>,
    pub combined_text: String,
    pub text_word_count: usize,
    pub ocr_word_count: usize,
}

impl PageOcr {
    fn new(page_number: u32, text: String, images_with_text: Vec<ImageText>) -> Self {
        let ocr_text = images_with_text
            .iter()
            .map(|i| i.ocr_text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            page_number,
            combined_text: format!("{}\n{}", text, ocr_text).trim().to_string(),
            text_word_count: word_count(&text),
            ocr_word_count: word_count(&ocr_text),
            text,
            ocr_text,
            images_with_text,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OcrSummary {
    pub total_text_word_count: usize,
    pub total_ocr_word_count: usize,
    pub combined_word_count: usize,
    pub combined_character_count: usize,
    /// Images that yielded OCR text
    pub images_processed: usize,
}

#[derive(Debug, Serialize)]
pub struct OcrReport {
    pub pages_processed: String,
    pub total_pages: u16,
    pub ocr_language: String,
    pub pages_data: Vec<PageOcr>,
    pub summary: OcrSummary,
    pub combined_text: String,
    pub combined_ocr_text: String,
    pub all_text_combined: String,
    /// Set when the OCR engine could not be used; page text is still returned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr_error: Option<String>,
}

impl OcrReport {
    fn new(
        pages_processed: String,
        total_pages: u16,
        ocr_language: String,
        pages_data: Vec<PageOcr>,
        ocr_error: Option<String>,
    ) -> Self {
        let total_text: String = pages_data.iter().map(|p| format!("{}\n", p.text)).collect();
        let total_ocr: String = pages_data.iter().map(|p| format!("{}\n", p.ocr_text)).collect();
        let all_text_combined = format!("{}\n{}", total_text, total_ocr).trim().to_string();

        let summary = OcrSummary {
            total_text_word_count: word_count(&total_text),
            total_ocr_word_count: word_count(&total_ocr),
            combined_word_count: word_count(&all_text_combined),
            combined_character_count: all_text_combined.chars().count(),
            images_processed: pages_data.iter().map(|p| p.images_with_text.len()).sum(),
        };

        Self {
            pages_processed,
            total_pages,
            ocr_language,
            pages_data,
            summary,
            combined_text: total_text.trim().to_string(),
            combined_ocr_text: total_ocr.trim().to_string(),
            all_text_combined,
            ocr_error,
        }
    }
}

/// Read page text and OCR every image at least `min_dimension` pixels per side.
pub fn read_with_ocr(
    path: &Path,
    range: Option<&PageRange>,
    language: &str,
    recognizer: &dyn TextRecognizer,
    min_dimension: u32,
) -> ServiceResult<OcrReport> {
    let pdfium = create_pdfium()?;
    let document = open_document(&pdfium, path)?;
    let total_pages = document.pages().len();
    let span = resolve_page_range(range, total_pages)?;

    let ocr_error = recognizer.ensure_available().err().map(|e| e.to_string());

    let mut pages_data = Vec::new();
    for index in span.indices() {
        let page_number = index as u32 + 1;
        let page = get_page(&document, index)?;
        let text = page_text(&page, index)?;

        let mut images_with_text = Vec::new();
        if ocr_error.is_none() {
            for (i, image) in page_images(&page, page_number).into_iter().enumerate() {
                let Some(image) = image else { continue };
                let (width, height) = image.dimensions();
                if width < min_dimension || height < min_dimension {
                    continue;
                }
                match recognizer.recognize(&image, language) {
                    Ok(text) if !text.is_empty() => images_with_text.push(ImageText::new(i + 1, text)),
                    Ok(_) => {}
                    Err(e) => {
                        warn!(page = page_number, image_index = i + 1, error = %e, "OCR failed for image");
                    }
                }
            }
        }

        pages_data.push(PageOcr::new(page_number, text, images_with_text));
    }

    let report = OcrReport::new(
        span.label(),
        total_pages,
        language.to_string(),
        pages_data,
        ocr_error,
    );
    info!(
        pages = %report.pages_processed,
        images_with_text = report.summary.images_processed,
        "Read PDF with OCR"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_threshold() {
        assert_eq!(ImageText::new(1, "0123456789".to_string()).confidence, "low");
        assert_eq!(ImageText::new(1, "0123456789a".to_string()).confidence, "high");
    }

    #[test]
    fn test_page_combines_text_and_ocr() {
        let page = PageOcr::new(
            2,
            "Body text".to_string(),
            vec![
                ImageText::new(1, "CHART TITLE".to_string()),
                ImageText::new(3, "legend".to_string()),
            ],
        );
        assert_eq!(page.ocr_text, "CHART TITLE\nlegend");
        assert_eq!(page.combined_text, "Body text\nCHART TITLE\nlegend");
        assert_eq!(page.text_word_count, 2);
        assert_eq!(page.ocr_word_count, 3);
    }

    #[test]
    fn test_report_summary() {
        let pages = vec![
            PageOcr::new(1, "alpha beta".to_string(), vec![ImageText::new(1, "gamma".to_string())]),
            PageOcr::new(2, "delta".to_string(), Vec::new()),
        ];
        let report = OcrReport::new("1-2".to_string(), 2, "eng".to_string(), pages, None);

        assert_eq!(report.combined_text, "alpha beta\ndelta");
        assert_eq!(report.combined_ocr_text, "gamma");
        assert_eq!(report.summary.total_text_word_count, 3);
        assert_eq!(report.summary.total_ocr_word_count, 1);
        assert_eq!(report.summary.combined_word_count, 4);
        assert_eq!(report.summary.images_processed, 1);
        assert!(report.ocr_error.is_none());
    }
}
