//! PDF document access.
//!
//! This module handles everything that touches a PDF:
//! - Resolving a file path or URL to a local file
//! - Text, image and OCR extraction over a page range
//! - Metadata and structural statistics
//!
//! All functions here are blocking and expect to run on the blocking pool.

pub mod images;
pub mod info;
pub mod ocr;
pub mod source;
pub mod structure;
pub mod text;

use std::ops::RangeInclusive;
use std::path::Path;

use image::DynamicImage;
use pdfium_render::prelude::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{PdfError, ServiceError, ServiceResult};

pub use images::extract_images;
pub use info::pdf_info;
pub use ocr::read_with_ocr;
pub use source::PdfSource;
pub use structure::analyze_structure;
pub use text::read_text;

/// Create a new Pdfium instance (dynamically linked).
///
/// Searches for libpdfium in:
/// 1. Current directory (./libpdfium.so)
/// 2. vendor/pdfium/lib/
/// 3. System library paths
pub fn create_pdfium() -> Result<Pdfium, PdfError> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "./vendor/pdfium/lib/",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| PdfError::Library {
            message: format!("install libpdfium or place it next to the binary ({:?})", e),
        })?;

    Ok(Pdfium::new(bindings))
}

/// Open a document, reporting encrypted files distinctly.
pub fn open_document<'a>(pdfium: &'a Pdfium, path: &Path) -> Result<PdfDocument<'a>, PdfError> {
    pdfium.load_pdf_from_file(path, None).map_err(|e| match e {
        PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
            PdfError::PasswordProtected
        }
        other => PdfError::Open {
            message: format!("{:?}", other),
        },
    })
}

/// Requested pages, 1-indexed and inclusive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PageRange {
    /// First page to read (default 1)
    pub start: Option<u32>,
    /// Last page to read (default: last page)
    pub end: Option<u32>,
}

/// A validated, 0-indexed inclusive page span
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSpan {
    pub first: u16,
    pub last: u16,
}

impl PageSpan {
    pub fn indices(&self) -> RangeInclusive<u16> {
        self.first..=self.last
    }

    /// `"start-end"` in 1-indexed page numbers
    pub fn label(&self) -> String {
        format!("{}-{}", self.first as u32 + 1, self.last as u32 + 1)
    }
}

/// Clamp a requested range to the document.
///
/// Missing bounds default to the whole document. Out-of-range values are
/// pulled back inside it and the end never precedes the start.
pub fn resolve_page_range(range: Option<&PageRange>, page_count: u16) -> ServiceResult<PageSpan> {
    if page_count == 0 {
        return Err(ServiceError::InvalidRequest {
            message: "PDF has no pages".to_string(),
        });
    }
    let last = page_count as i64 - 1;

    let Some(range) = range else {
        return Ok(PageSpan {
            first: 0,
            last: last as u16,
        });
    };

    let start = range.start.map_or(0, |s| s as i64 - 1);
    let end = range.end.map_or(last, |e| e as i64 - 1);

    let start = start.clamp(0, last);
    let end = end.min(last).max(start);

    Ok(PageSpan {
        first: start as u16,
        last: end as u16,
    })
}

pub(crate) fn get_page<'a>(document: &PdfDocument<'a>, index: u16) -> Result<PdfPage<'a>, PdfError> {
    document.pages().get(index).map_err(|e| PdfError::Page {
        page: index as u32 + 1,
        message: format!("{:?}", e),
    })
}

pub(crate) fn page_text(page: &PdfPage, index: u16) -> Result<String, PdfError> {
    page.text().map(|t| t.all()).map_err(|e| PdfError::Page {
        page: index as u32 + 1,
        message: format!("cannot read text: {:?}", e),
    })
}

/// Number of image objects placed directly on the page
pub(crate) fn page_image_count(page: &PdfPage) -> usize {
    page.objects()
        .iter()
        .filter(|object| matches!(object, PdfPageObject::Image(_)))
        .count()
}

/// Decode every image object on a page, in page order.
///
/// Entries that fail to decode are logged and returned as `None` so callers
/// keep stable 1-based image indices.
pub(crate) fn page_images(page: &PdfPage, page_number: u32) -> Vec<Option<DynamicImage>> {
    let mut images = Vec::new();
    for object in page.objects().iter() {
        if let PdfPageObject::Image(image_obj) = &object {
            match image_obj.get_raw_image() {
                Ok(image) => images.push(Some(image)),
                Err(e) => {
                    warn!(
                        page = page_number,
                        image_index = images.len() + 1,
                        error = ?e,
                        "Failed to decode image object"
                    );
                    images.push(None);
                }
            }
        }
    }
    images
}

/// Count paragraph-style text blocks: runs of non-blank lines.
pub fn count_text_blocks(text: &str) -> usize {
    let mut blocks = 0;
    let mut in_block = false;
    for line in text.lines() {
        if line.trim().is_empty() {
            in_block = false;
        } else if !in_block {
            in_block = true;
            blocks += 1;
        }
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: Option<u32>, end: Option<u32>) -> PageRange {
        PageRange { start, end }
    }

    #[test]
    fn test_missing_range_is_whole_document() {
        let span = resolve_page_range(None, 12).unwrap();
        assert_eq!(span, PageSpan { first: 0, last: 11 });
        assert_eq!(span.label(), "1-12");
    }

    #[test]
    fn test_partial_ranges_use_defaults() {
        assert_eq!(
            resolve_page_range(Some(&range(Some(3), None)), 10).unwrap().label(),
            "3-10"
        );
        assert_eq!(
            resolve_page_range(Some(&range(None, Some(4))), 10).unwrap().label(),
            "1-4"
        );
    }

    #[test]
    fn test_out_of_bounds_ranges_are_clamped() {
        assert_eq!(
            resolve_page_range(Some(&range(Some(0), Some(99))), 5).unwrap(),
            PageSpan { first: 0, last: 4 }
        );
        assert_eq!(
            resolve_page_range(Some(&range(Some(50), Some(60))), 5).unwrap(),
            PageSpan { first: 4, last: 4 }
        );
        // End before start collapses onto start
        assert_eq!(
            resolve_page_range(Some(&range(Some(4), Some(2))), 5).unwrap(),
            PageSpan { first: 3, last: 3 }
        );
    }

    #[test]
    fn test_empty_document_is_rejected() {
        let err = resolve_page_range(None, 0).unwrap_err();
        assert_eq!(err.error_code(), "invalid_request");
    }

    #[test]
    fn test_span_indices() {
        let span = PageSpan { first: 2, last: 4 };
        assert_eq!(span.indices().collect::<Vec<_>>(), vec![2, 3, 4]);
    }

    #[test]
    fn test_count_text_blocks() {
        assert_eq!(count_text_blocks(""), 0);
        assert_eq!(count_text_blocks("one line"), 1);
        assert_eq!(
            count_text_blocks("Heading\n\nFirst paragraph\ncontinues\n  \nSecond\n\n\n"),
            3
        );
    }
}
