//! Tool argument and response types.
//!
//! This module contains:
//! - Argument structs for each tool (deserialized from MCP `arguments`,
//!   and the source of each tool's JSON schema)
//! - The success and failure envelopes every tool returns
//! - The tool registry

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, format_error_chain};
use crate::pdf::{PageRange, PdfSource};

pub mod registry;

pub use registry::{McpToolDefinition, REGISTRY, ToolName};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ReadPdfTextArgs {
    #[serde(flatten)]
    pub source: PdfSource,
    /// Pages to read, e.g. {"start": 1, "end": 5}
    #[serde(default)]
    pub page_range: Option<PageRange>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExtractPdfImagesArgs {
    #[serde(flatten)]
    pub source: PdfSource,
    /// Directory to save images to (default: a new temporary directory)
    #[serde(default)]
    pub output_dir: Option<String>,
    #[serde(default)]
    pub page_range: Option<PageRange>,
    /// Run statistics and OCR on each extracted image (default true)
    #[serde(default = "default_true")]
    pub analyze_images: bool,
    /// Ask the vision model for a caption of each image (default true)
    #[serde(default = "default_true")]
    pub use_vision_model: bool,
    /// Tesseract language code (default from configuration, normally "eng")
    #[serde(default)]
    pub ocr_language: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ReadPdfWithOcrArgs {
    #[serde(flatten)]
    pub source: PdfSource,
    #[serde(default)]
    pub page_range: Option<PageRange>,
    /// Tesseract language code (default from configuration, normally "eng")
    #[serde(default)]
    pub ocr_language: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PdfDocumentArgs {
    #[serde(flatten)]
    pub source: PdfSource,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AnalyzeImageArgs {
    /// Path to an image file on disk
    pub image_path: String,
    /// Ask the vision model for a caption (default false)
    #[serde(default)]
    pub use_vision_model: bool,
    #[serde(default)]
    pub ocr_language: Option<String>,
}

/// Successful tool output: the tool's own fields follow the common header.
#[derive(Debug, Serialize)]
pub struct ToolResponse<T> {
    pub success: bool,
    pub file_path: Option<String>,
    pub url: Option<String>,
    #[serde(flatten)]
    pub body: T,
}

impl<T> ToolResponse<T> {
    pub fn new(file_path: Option<String>, url: Option<String>, body: T) -> Self {
        Self {
            success: true,
            file_path,
            url,
            body,
        }
    }
}

/// Failed tool output. `file_path` and `url` echo the caller's arguments.
#[derive(Debug, Serialize)]
pub struct ToolFailure {
    pub success: bool,
    pub error: String,
    pub code: &'static str,
    pub file_path: Option<String>,
    pub url: Option<String>,
}

impl ToolFailure {
    pub fn new(error: &ServiceError, file_path: Option<String>, url: Option<String>) -> Self {
        Self {
            success: false,
            error: format_error_chain(error),
            code: error.error_code(),
            file_path,
            url,
        }
    }

    pub fn for_source(error: &ServiceError, source: &PdfSource) -> Self {
        Self::new(error, source.file_path.clone(), source.url.clone())
    }
}
