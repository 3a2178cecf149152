//! MCP message handlers.
//!
//! Handlers for initialize and tools/list requests.

use crate::tools::REGISTRY;

use super::{McpError, McpState, PROTOCOL_VERSION};

const INSTRUCTIONS: &str = "PDF reader MCP server. Read text, extract and characterize images, run OCR and inspect document structure for local PDF files or URLs.";

/// Protocol version, capabilities and server identity
pub fn server_info() -> serde_json::Value {
    serde_json::json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {
            "tools": { "listChanged": false }
        },
        "serverInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION")
        },
        "instructions": INSTRUCTIONS
    })
}

/// Handle initialize request
pub async fn handle_initialize(_state: &McpState) -> Result<serde_json::Value, McpError> {
    Ok(server_info())
}

/// Handle tools/list request
pub async fn handle_tools_list(_state: &McpState) -> Result<serde_json::Value, McpError> {
    let tools = REGISTRY.mcp_definitions();
    Ok(serde_json::json!({ "tools": tools }))
}
