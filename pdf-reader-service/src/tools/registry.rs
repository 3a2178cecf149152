//! Tool registry for the MCP server.
//!
//! Tool names are derived from enum variants via strum, and each tool's input
//! schema is generated from its argument struct, so the advertised schema and
//! the deserializer cannot drift apart.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::LazyLock;

use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use super::{
    AnalyzeImageArgs, ExtractPdfImagesArgs, PdfDocumentArgs, ReadPdfTextArgs, ReadPdfWithOcrArgs,
};

/// All tool names as an exhaustive enum.
///
/// Adding a new tool requires:
/// 1. Add variant here
/// 2. Add its metadata in `metadata_for`
/// 3. Add a handler in `mcp::tools` (compile error if missing due to exhaustive match)
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumString,
    EnumIter,
    Display,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    ReadPdfText,
    ExtractPdfImages,
    ReadPdfWithOcr,
    GetPdfInfo,
    AnalyzePdfStructure,
    AnalyzeImage,
}

/// Metadata for a tool definition.
#[derive(Debug, Clone)]
pub struct ToolMetadata {
    pub name: ToolName,

    pub description: &'static str,

    /// Tool category for organizational purposes ("pdf" or "image")
    pub category: &'static str,

    /// JSON Schema for tool parameters (called lazily)
    pub parameters: fn() -> serde_json::Value,
}

fn schema<T: JsonSchema>() -> serde_json::Value {
    serde_json::to_value(schema_for!(T)).unwrap_or_else(|_| serde_json::json!({ "type": "object" }))
}

fn metadata_for(name: ToolName) -> ToolMetadata {
    let (description, category, parameters): (&'static str, &'static str, fn() -> serde_json::Value) =
        match name {
            ToolName::ReadPdfText => (
                "Read text content from a PDF file or URL. Provide either file_path or url, and optionally a page_range.",
                "pdf",
                schema::<ReadPdfTextArgs>,
            ),
            ToolName::ExtractPdfImages => (
                "Extract images from a PDF file or URL and save them as PNG files. Each image can be analyzed with statistics, OCR and an optional vision-model caption.",
                "pdf",
                schema::<ExtractPdfImagesArgs>,
            ),
            ToolName::ReadPdfWithOcr => (
                "Read text from a PDF and run OCR on its embedded images. Useful for scanned pages and charts containing text.",
                "pdf",
                schema::<ReadPdfWithOcrArgs>,
            ),
            ToolName::GetPdfInfo => (
                "Get file details, document metadata and per-page statistics for a PDF.",
                "pdf",
                schema::<PdfDocumentArgs>,
            ),
            ToolName::AnalyzePdfStructure => (
                "Classify each page of a PDF as text, images, mixed or empty and summarize the layout.",
                "pdf",
                schema::<PdfDocumentArgs>,
            ),
            ToolName::AnalyzeImage => (
                "Characterize an image file: pixel statistics, OCR text, an optional caption and a one-paragraph description.",
                "image",
                schema::<AnalyzeImageArgs>,
            ),
        };

    ToolMetadata {
        name,
        description,
        category,
        parameters,
    }
}

/// Central registry of all tools, ordered by name.
pub struct ToolRegistry {
    tools: BTreeMap<ToolName, ToolMetadata>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        let tools = ToolName::iter()
            .map(|name| (name, metadata_for(name)))
            .collect();
        Self { tools }
    }

    /// Get all tools as MCP tool definitions
    pub fn mcp_definitions(&self) -> Vec<McpToolDefinition> {
        self.tools
            .values()
            .map(|t| McpToolDefinition {
                name: t.name.to_string(),
                description: t.description.to_string(),
                input_schema: (t.parameters)(),
                category: Some(t.category.to_string()),
            })
            .collect()
    }

    /// Get metadata by string name
    pub fn get_by_str(&self, name: &str) -> Option<&ToolMetadata> {
        ToolName::from_str(name)
            .ok()
            .and_then(|n| self.tools.get(&n))
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Global singleton registry instance
pub static REGISTRY: LazyLock<ToolRegistry> = LazyLock::new(ToolRegistry::new);

/// MCP tool definition structure (for output generation)
#[derive(Debug, Clone, Serialize)]
pub struct McpToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_name_string_conversion() {
        assert_eq!(ToolName::ReadPdfText.to_string(), "read_pdf_text");
        assert_eq!(ToolName::ReadPdfWithOcr.to_string(), "read_pdf_with_ocr");
        assert_eq!(ToolName::GetPdfInfo.to_string(), "get_pdf_info");
        assert_eq!(ToolName::AnalyzeImage.to_string(), "analyze_image");
    }

    #[test]
    fn test_tool_name_from_string() {
        assert_eq!(
            ToolName::from_str("extract_pdf_images").unwrap(),
            ToolName::ExtractPdfImages
        );
        assert_eq!(
            ToolName::from_str("analyze_pdf_structure").unwrap(),
            ToolName::AnalyzePdfStructure
        );
        assert!(ToolName::from_str("unknown_tool").is_err());
    }

    #[test]
    fn test_every_tool_is_registered_with_an_object_schema() {
        let definitions = REGISTRY.mcp_definitions();
        assert_eq!(definitions.len(), ToolName::iter().count());
        for definition in &definitions {
            assert_eq!(
                definition.input_schema["type"],
                serde_json::json!("object"),
                "{} schema",
                definition.name
            );
        }
    }

    #[test]
    fn test_flattened_source_appears_in_schema() {
        let schema = schema::<ReadPdfTextArgs>();
        let properties = schema["properties"].as_object().unwrap();
        assert!(properties.contains_key("file_path"));
        assert!(properties.contains_key("url"));
        assert!(properties.contains_key("page_range"));
    }

    #[test]
    fn test_image_path_is_required() {
        let metadata = REGISTRY.get_by_str("analyze_image").unwrap();
        let schema = (metadata.parameters)();
        assert_eq!(schema["required"], serde_json::json!(["image_path"]));
    }
}
