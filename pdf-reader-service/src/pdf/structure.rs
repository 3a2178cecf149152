//! Per-page content classification.

use std::path::Path;

use pdfium_render::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::analysis::round_to;
use crate::error::ServiceResult;

use super::{count_text_blocks, create_pdfium, get_page, open_document, page_image_count, page_text};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Mixed,
    TextOnly,
    ImagesOnly,
    Empty,
}

impl ContentType {
    pub fn classify(has_text: bool, has_images: bool) -> Self {
        match (has_text, has_images) {
            (true, true) => ContentType::Mixed,
            (true, false) => ContentType::TextOnly,
            (false, true) => ContentType::ImagesOnly,
            (false, false) => ContentType::Empty,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PageDimensions {
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Serialize)]
pub struct PageStructure {
    pub page_number: u32,
    pub content_type: ContentType,
    pub text_blocks: usize,
    pub image_count: usize,
    pub text_length: usize,
    pub dimensions: PageDimensions,
    /// Clockwise degrees
    pub rotation: u16,
}

#[derive(Debug, Serialize)]
pub struct DocumentStructure {
    pub total_pages: u16,
    pub is_encrypted: bool,
    pub pdf_version: String,
}

#[derive(Debug, Default, Serialize)]
pub struct ContentAnalysis {
    pub pages_with_text: usize,
    pub pages_with_images: usize,
    pub pages_text_only: usize,
    pub pages_images_only: usize,
    pub pages_mixed_content: usize,
    pub total_text_blocks: usize,
    pub total_images: usize,
}

#[derive(Debug, Serialize)]
pub struct ContentDistribution {
    pub text_only_pages: usize,
    pub images_only_pages: usize,
    pub mixed_content_pages: usize,
    pub empty_pages: usize,
}

#[derive(Debug, Serialize)]
pub struct StructureSummary {
    pub content_distribution: ContentDistribution,
    pub avg_images_per_page: f64,
    pub avg_text_blocks_per_page: f64,
}

#[derive(Debug, Serialize)]
pub struct StructureReport {
    pub document_structure: DocumentStructure,
    pub content_analysis: ContentAnalysis,
    pub page_details: Vec<PageStructure>,
    pub summary: StructureSummary,
}

pub fn analyze_structure(path: &Path) -> ServiceResult<StructureReport> {
    let pdfium = create_pdfium()?;
    let document = open_document(&pdfium, path)?;
    let total_pages = document.pages().len();

    let mut page_details = Vec::with_capacity(total_pages as usize);
    for index in 0..total_pages {
        let page = get_page(&document, index)?;
        let text = page_text(&page, index)?;
        let trimmed = text.trim();
        let image_count = page_image_count(&page);

        page_details.push(PageStructure {
            page_number: index as u32 + 1,
            content_type: ContentType::classify(!trimmed.is_empty(), image_count > 0),
            text_blocks: count_text_blocks(&text),
            image_count,
            text_length: trimmed.chars().count(),
            dimensions: PageDimensions {
                width: page.width().value,
                height: page.height().value,
            },
            rotation: page.rotation().map(rotation_degrees).unwrap_or(0),
        });
    }

    let document_structure = DocumentStructure {
        total_pages,
        is_encrypted: false,
        pdf_version: version_label(document.version()),
    };
    let report = StructureReport::new(document_structure, page_details);
    info!(
        pages = total_pages,
        mixed = report.content_analysis.pages_mixed_content,
        "Analyzed PDF structure"
    );
    Ok(report)
}

impl StructureReport {
    fn new(document_structure: DocumentStructure, page_details: Vec<PageStructure>) -> Self {
        let mut analysis = ContentAnalysis::default();
        let mut empty_pages = 0;
        for page in &page_details {
            analysis.total_text_blocks += page.text_blocks;
            analysis.total_images += page.image_count;
            match page.content_type {
                ContentType::Mixed => analysis.pages_mixed_content += 1,
                ContentType::TextOnly => analysis.pages_text_only += 1,
                ContentType::ImagesOnly => analysis.pages_images_only += 1,
                ContentType::Empty => empty_pages += 1,
            }
        }
        analysis.pages_with_text = analysis.pages_text_only + analysis.pages_mixed_content;
        analysis.pages_with_images = analysis.pages_images_only + analysis.pages_mixed_content;

        let pages = (document_structure.total_pages as f64).max(1.0);
        let summary = StructureSummary {
            content_distribution: ContentDistribution {
                text_only_pages: analysis.pages_text_only,
                images_only_pages: analysis.pages_images_only,
                mixed_content_pages: analysis.pages_mixed_content,
                empty_pages,
            },
            avg_images_per_page: round_to(analysis.total_images as f64 / pages, 2),
            avg_text_blocks_per_page: round_to(analysis.total_text_blocks as f64 / pages, 2),
        };

        Self {
            document_structure,
            content_analysis: analysis,
            page_details,
            summary,
        }
    }
}

fn rotation_degrees(rotation: PdfPageRenderRotation) -> u16 {
    match rotation {
        PdfPageRenderRotation::None => 0,
        PdfPageRenderRotation::Degrees90 => 90,
        PdfPageRenderRotation::Degrees180 => 180,
        PdfPageRenderRotation::Degrees270 => 270,
    }
}

fn version_label(version: PdfDocumentVersion) -> String {
    match version {
        PdfDocumentVersion::Unset => "unknown".to_string(),
        PdfDocumentVersion::Pdf1_0 => "1.0".to_string(),
        PdfDocumentVersion::Pdf1_1 => "1.1".to_string(),
        PdfDocumentVersion::Pdf1_2 => "1.2".to_string(),
        PdfDocumentVersion::Pdf1_3 => "1.3".to_string(),
        PdfDocumentVersion::Pdf1_4 => "1.4".to_string(),
        PdfDocumentVersion::Pdf1_5 => "1.5".to_string(),
        PdfDocumentVersion::Pdf1_6 => "1.6".to_string(),
        PdfDocumentVersion::Pdf1_7 => "1.7".to_string(),
        PdfDocumentVersion::Pdf2_0 => "2.0".to_string(),
        // Pdfium encodes versions as major * 10 + minor
        PdfDocumentVersion::Other(raw) => format!("{}.{}", raw / 10, raw % 10),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(number: u32, text_blocks: usize, image_count: usize) -> PageStructure {
        PageStructure {
            page_number: number,
            content_type: ContentType::classify(text_blocks > 0, image_count > 0),
            text_blocks,
            image_count,
            text_length: text_blocks * 40,
            dimensions: PageDimensions {
                width: 612.0,
                height: 792.0,
            },
            rotation: 0,
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(ContentType::classify(true, true), ContentType::Mixed);
        assert_eq!(ContentType::classify(true, false), ContentType::TextOnly);
        assert_eq!(ContentType::classify(false, true), ContentType::ImagesOnly);
        assert_eq!(ContentType::classify(false, false), ContentType::Empty);
    }

    #[test]
    fn test_content_type_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(ContentType::ImagesOnly).unwrap(),
            serde_json::json!("images_only")
        );
    }

    #[test]
    fn test_report_counters_and_averages() {
        let structure = DocumentStructure {
            total_pages: 3,
            is_encrypted: false,
            pdf_version: "1.7".to_string(),
        };
        let report = StructureReport::new(structure, vec![page(1, 3, 1), page(2, 2, 0), page(3, 0, 0)]);

        let analysis = &report.content_analysis;
        assert_eq!(analysis.pages_with_text, 2);
        assert_eq!(analysis.pages_with_images, 1);
        assert_eq!(analysis.pages_mixed_content, 1);
        assert_eq!(analysis.pages_text_only, 1);
        assert_eq!(analysis.pages_images_only, 0);
        assert_eq!(analysis.total_text_blocks, 5);
        assert_eq!(analysis.total_images, 1);

        assert_eq!(report.summary.content_distribution.empty_pages, 1);
        assert_eq!(report.summary.avg_images_per_page, 0.33);
        assert_eq!(report.summary.avg_text_blocks_per_page, 1.67);
    }

    #[test]
    fn test_version_label() {
        assert_eq!(version_label(PdfDocumentVersion::Pdf1_4), "1.4");
        assert_eq!(version_label(PdfDocumentVersion::Other(18)), "1.8");
        assert_eq!(version_label(PdfDocumentVersion::Unset), "unknown");
    }

    #[test]
    fn test_rotation_degrees() {
        assert_eq!(rotation_degrees(PdfPageRenderRotation::Degrees270), 270);
    }
}
