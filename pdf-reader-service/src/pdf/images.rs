//! Embedded image extraction.

use std::path::{Path, PathBuf};

use image::GenericImageView;
use serde::Serialize;
use tracing::{info, warn};

use crate::analysis::{AnalysisResult, encode_png};
use crate::error::ServiceResult;

use super::{PageRange, PageSpan, create_pdfium, get_page, open_document, page_images, resolve_page_range};

#[derive(Debug, Serialize)]
pub struct ExtractedImage {
    pub page_number: u32,
    pub image_index: usize,
    pub filename: String,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug)]
pub struct Extraction {
    pub span: PageSpan,
    pub total_pages: u16,
    pub images: Vec<ExtractedImage>,
}

/// Save every image of at least `min_dimension` pixels per side as PNG.
///
/// Files are named `page_{page}_img_{index}.png`, where the index counts
/// every image object on the page, including skipped ones.
pub fn extract_images(
    path: &Path,
    range: Option<&PageRange>,
    output_dir: &Path,
    min_dimension: u32,
) -> ServiceResult<Extraction> {
    std::fs::create_dir_all(output_dir)?;

    let pdfium = create_pdfium()?;
    let document = open_document(&pdfium, path)?;
    let total_pages = document.pages().len();
    let span = resolve_page_range(range, total_pages)?;

    let mut images = Vec::new();
    for index in span.indices() {
        let page_number = index as u32 + 1;
        let page = get_page(&document, index)?;

        for (i, image) in page_images(&page, page_number).into_iter().enumerate() {
            let Some(image) = image else { continue };
            let image_index = i + 1;
            let (width, height) = image.dimensions();
            if width < min_dimension || height < min_dimension {
                continue;
            }

            let filename = image_filename(page_number, image_index);
            let image_path = output_dir.join(&filename);
            let saved = encode_png(&image)
                .map_err(|e| e.to_string())
                .and_then(|png| {
                    std::fs::write(&image_path, &png)
                        .map(|_| png.len() as u64)
                        .map_err(|e| e.to_string())
                });

            match saved {
                Ok(size_bytes) => images.push(ExtractedImage {
                    page_number,
                    image_index,
                    filename,
                    path: image_path,
                    width,
                    height,
                    size_bytes,
                    analysis: None,
                    description: None,
                }),
                Err(e) => {
                    warn!(page = page_number, image_index, error = %e, "Failed to save image");
                }
            }
        }
    }

    info!(
        images = images.len(),
        output_dir = %output_dir.display(),
        "Extracted PDF images"
    );

    Ok(Extraction {
        span,
        total_pages,
        images,
    })
}

pub fn image_filename(page_number: u32, image_index: usize) -> String {
    format!("page_{}_img_{}.png", page_number, image_index)
}

#[derive(Debug, Serialize)]
pub struct ExtractionSummary {
    pub total_images: usize,
    pub images_with_text: usize,
    pub images_analyzed: usize,
}

impl ExtractionSummary {
    pub fn of(images: &[ExtractedImage]) -> Self {
        Self {
            total_images: images.len(),
            images_with_text: images
                .iter()
                .filter(|i| i.analysis.as_ref().is_some_and(AnalysisResult::has_text))
                .count(),
            images_analyzed: images.iter().filter(|i| i.analysis.is_some()).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_filename() {
        assert_eq!(image_filename(3, 2), "page_3_img_2.png");
    }

    #[test]
    fn test_summary_counts_unanalyzed_images() {
        let image = ExtractedImage {
            page_number: 1,
            image_index: 1,
            filename: image_filename(1, 1),
            path: PathBuf::from("/tmp/page_1_img_1.png"),
            width: 64,
            height: 64,
            size_bytes: 120,
            analysis: None,
            description: None,
        };
        let summary = ExtractionSummary::of(&[image]);
        assert_eq!(summary.total_images, 1);
        assert_eq!(summary.images_analyzed, 0);
        assert_eq!(summary.images_with_text, 0);
    }
}
