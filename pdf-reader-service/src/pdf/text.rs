//! Plain text extraction.

use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::analysis::word_count;
use crate::error::ServiceResult;

use super::{PageRange, create_pdfium, get_page, open_document, page_text, resolve_page_range};

#[derive(Debug, Serialize)]
pub struct PageText {
    pub page_number: u32,
    pub text: String,
    pub word_count: usize,
}

#[derive(Debug, Serialize)]
pub struct TextReport {
    pub pages_processed: String,
    pub total_pages: u16,
    pub pages_text: Vec<PageText>,
    pub combined_text: String,
    pub total_word_count: usize,
    pub total_character_count: usize,
}

/// Extract the text layer of each page in range.
pub fn read_text(path: &Path, range: Option<&PageRange>) -> ServiceResult<TextReport> {
    let pdfium = create_pdfium()?;
    let document = open_document(&pdfium, path)?;
    let total_pages = document.pages().len();
    let span = resolve_page_range(range, total_pages)?;

    let mut pages_text = Vec::new();
    for index in span.indices() {
        let page = get_page(&document, index)?;
        let text = page_text(&page, index)?;
        pages_text.push(PageText {
            page_number: index as u32 + 1,
            word_count: word_count(&text),
            text,
        });
    }

    let report = TextReport::new(span.label(), total_pages, pages_text);
    info!(
        pages = %report.pages_processed,
        words = report.total_word_count,
        "Extracted PDF text"
    );
    Ok(report)
}

impl TextReport {
    fn new(pages_processed: String, total_pages: u16, pages_text: Vec<PageText>) -> Self {
        let joined: String = pages_text.iter().map(|p| format!("{}\n", p.text)).collect();
        Self {
            pages_processed,
            total_pages,
            total_word_count: word_count(&joined),
            total_character_count: joined.chars().count(),
            combined_text: joined.trim().to_string(),
            pages_text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(number: u32, text: &str) -> PageText {
        PageText {
            page_number: number,
            text: text.to_string(),
            word_count: word_count(text),
        }
    }

    #[test]
    fn test_report_totals() {
        let report = TextReport::new(
            "1-2".to_string(),
            2,
            vec![page(1, "Hello world"), page(2, "Second page here")],
        );
        assert_eq!(report.combined_text, "Hello world\nSecond page here");
        assert_eq!(report.total_word_count, 5);
        // Each page contributes a trailing newline
        assert_eq!(report.total_character_count, 11 + 1 + 16 + 1);
    }

    #[test]
    fn test_blank_pages_trim_away() {
        let report = TextReport::new("1-1".to_string(), 1, vec![page(1, "  \n")]);
        assert_eq!(report.combined_text, "");
        assert_eq!(report.total_word_count, 0);
    }
}
