//! File and document metadata.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use pdfium_render::prelude::*;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::analysis::round_to;
use crate::error::ServiceResult;

use super::{create_pdfium, get_page, open_document, page_image_count, page_text};

#[derive(Debug, Serialize)]
pub struct FileInfo {
    pub size_bytes: u64,
    pub size_mb: f64,
    pub sha256: String,
    pub created: Option<String>,
    pub modified: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct PdfMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DocumentStats {
    pub total_pages: u16,
    pub total_images: usize,
    pub pages_with_text: usize,
    pub pages_with_images: usize,
    pub is_encrypted: bool,
    pub can_extract_text: bool,
}

#[derive(Debug, Serialize)]
pub struct PageInfo {
    pub page_number: u32,
    pub images_count: usize,
    pub text_length: usize,
    pub has_text: bool,
    pub page_width: f32,
    pub page_height: f32,
}

#[derive(Debug, Serialize)]
pub struct PdfInfo {
    pub file_info: FileInfo,
    pub pdf_metadata: PdfMetadata,
    pub document_stats: DocumentStats,
    pub page_details: Vec<PageInfo>,
}

pub fn pdf_info(path: &Path) -> ServiceResult<PdfInfo> {
    let file_info = file_info(path)?;

    let pdfium = create_pdfium()?;
    let document = open_document(&pdfium, path)?;
    let pdf_metadata = read_metadata(&document);

    let total_pages = document.pages().len();
    let mut page_details = Vec::with_capacity(total_pages as usize);
    for index in 0..total_pages {
        let page = get_page(&document, index)?;
        let text = page_text(&page, index)?;
        let text_length = text.trim().chars().count();
        page_details.push(PageInfo {
            page_number: index as u32 + 1,
            images_count: page_image_count(&page),
            text_length,
            has_text: text_length > 0,
            page_width: page.width().value,
            page_height: page.height().value,
        });
    }

    let document_stats = DocumentStats::of(total_pages, &page_details);
    info!(
        pages = total_pages,
        images = document_stats.total_images,
        "Read PDF info"
    );

    Ok(PdfInfo {
        file_info,
        pdf_metadata,
        document_stats,
        page_details,
    })
}

impl DocumentStats {
    /// Opening succeeded, so the document is readable without a password.
    fn of(total_pages: u16, pages: &[PageInfo]) -> Self {
        Self {
            total_pages,
            total_images: pages.iter().map(|p| p.images_count).sum(),
            pages_with_text: pages.iter().filter(|p| p.has_text).count(),
            pages_with_images: pages.iter().filter(|p| p.images_count > 0).count(),
            is_encrypted: false,
            can_extract_text: true,
        }
    }
}

fn read_metadata(document: &PdfDocument) -> PdfMetadata {
    let metadata = document.metadata();
    let tag = |tag_type: PdfDocumentMetadataTagType| {
        metadata
            .get(tag_type)
            .map(|entry| entry.value().to_string())
            .filter(|value| !value.is_empty())
    };

    PdfMetadata {
        title: tag(PdfDocumentMetadataTagType::Title),
        author: tag(PdfDocumentMetadataTagType::Author),
        subject: tag(PdfDocumentMetadataTagType::Subject),
        creator: tag(PdfDocumentMetadataTagType::Creator),
        producer: tag(PdfDocumentMetadataTagType::Producer),
        creation_date: tag(PdfDocumentMetadataTagType::CreationDate),
        modification_date: tag(PdfDocumentMetadataTagType::ModificationDate),
    }
}

fn file_info(path: &Path) -> std::io::Result<FileInfo> {
    let metadata = std::fs::metadata(path)?;
    let size_bytes = metadata.len();

    Ok(FileInfo {
        size_bytes,
        size_mb: round_to(size_bytes as f64 / (1024.0 * 1024.0), 2),
        sha256: file_sha256(path)?,
        created: metadata.created().ok().map(rfc3339),
        modified: metadata.modified().ok().map(rfc3339),
    })
}

/// Streaming SHA-256 of a file as lowercase hex.
fn file_sha256(path: &Path) -> std::io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

fn rfc3339(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    #[test]
    fn test_file_sha256() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();
        file.flush().unwrap();

        assert_eq!(
            file_sha256(file.path()).unwrap(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_file_info_sizes() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&vec![0u8; 1536 * 1024]).unwrap();
        file.flush().unwrap();

        let info = file_info(file.path()).unwrap();
        assert_eq!(info.size_bytes, 1536 * 1024);
        assert_eq!(info.size_mb, 1.5);
        assert!(info.modified.is_some());
    }

    #[test]
    fn test_rfc3339() {
        let time = SystemTime::UNIX_EPOCH + Duration::from_secs(86_400);
        assert_eq!(rfc3339(time), "1970-01-02T00:00:00+00:00");
    }

    #[test]
    fn test_document_stats() {
        let page = |number, images_count, text_length| PageInfo {
            page_number: number,
            images_count,
            text_length,
            has_text: text_length > 0,
            page_width: 612.0,
            page_height: 792.0,
        };
        let stats = DocumentStats::of(3, &[page(1, 2, 100), page(2, 0, 40), page(3, 1, 0)]);
        assert_eq!(stats.total_images, 3);
        assert_eq!(stats.pages_with_text, 2);
        assert_eq!(stats.pages_with_images, 2);
        assert!(!stats.is_encrypted);
        assert!(stats.can_extract_text);
    }
}
