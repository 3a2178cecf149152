//! MCP tool call handler.
//!
//! Handles execution of individual tool calls from MCP clients.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::service::is_failure;
use crate::tools::{REGISTRY, ToolName};

use super::{McpError, McpState};

/// Handle tools/call request
pub async fn handle_tool_call(
    state: &McpState,
    params: Option<Value>,
) -> Result<Value, McpError> {
    let params = params.ok_or_else(|| McpError::invalid_params("Missing params"))?;

    let name = params
        .get("name")
        .and_then(|v| v.as_str())
        .ok_or_else(|| McpError::invalid_params("Missing tool name"))?;

    let arguments = params
        .get("arguments")
        .filter(|v| !v.is_null())
        .cloned()
        .unwrap_or(serde_json::json!({}));

    let tool = REGISTRY
        .get_by_str(name)
        .ok_or_else(|| McpError::new(-32601, format!("Unknown tool: {}", name)))?;

    let service = &state.service;
    let output = match tool.name {
        ToolName::ReadPdfText => service.read_pdf_text(parse_args(arguments)?).await,
        ToolName::ExtractPdfImages => service.extract_pdf_images(parse_args(arguments)?).await,
        ToolName::ReadPdfWithOcr => service.read_pdf_with_ocr(parse_args(arguments)?).await,
        ToolName::GetPdfInfo => service.get_pdf_info(parse_args(arguments)?).await,
        ToolName::AnalyzePdfStructure => {
            service.analyze_pdf_structure(parse_args(arguments)?).await
        }
        ToolName::AnalyzeImage => service.analyze_image(parse_args(arguments)?).await,
    };

    Ok(tool_result(&output))
}

fn parse_args<T: DeserializeOwned>(arguments: Value) -> Result<T, McpError> {
    serde_json::from_value(arguments)
        .map_err(|e| McpError::invalid_params(format!("Invalid arguments: {}", e)))
}

/// Wrap a tool response as MCP text content
fn tool_result(output: &Value) -> Value {
    serde_json::json!({
        "content": [{
            "type": "text",
            "text": serde_json::to_string_pretty(output).unwrap_or_default()
        }],
        "isError": is_failure(output)
    })
}
