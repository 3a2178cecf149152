//! MCP server: JSON-RPC over HTTP (SSE + POST) or stdio.

mod handlers;
mod tools;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response, Sse, sse::Event},
    routing::{get, post},
};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::service::PdfReaderService;

use handlers::{handle_initialize, handle_tools_list, server_info};
use tools::handle_tool_call;

pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// MCP server state
pub struct McpState {
    pub service: Arc<PdfReaderService>,
    /// Where clients POST JSON-RPC messages (announced over SSE)
    pub messages_path: String,
}

/// Build the MCP router, to be nested at `mount_path`
pub fn mcp_router(service: Arc<PdfReaderService>, mount_path: &str) -> Router {
    let state = Arc::new(McpState {
        service,
        messages_path: format!("{}/messages", mount_path.trim_end_matches('/')),
    });

    Router::new()
        .route("/", get(mcp_sse_handler))
        .route("/messages", post(mcp_message_handler))
        .with_state(state)
}

/// MCP SSE handler: announces the message endpoint and server info, then keeps the stream alive
async fn mcp_sse_handler(
    State(state): State<Arc<McpState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("MCP client connected");

    let info_json = serde_json::to_string(&server_info()).unwrap_or_default();
    let events = vec![
        Ok(Event::default()
            .event("endpoint")
            .data(state.messages_path.clone())),
        Ok(Event::default().event("message").data(info_json)),
    ];

    Sse::new(stream::iter(events)).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("ping"),
    )
}

/// MCP message handler. Notifications are acknowledged with 202 and no body.
async fn mcp_message_handler(State(state): State<Arc<McpState>>, body: String) -> Response {
    match handle_message(&state, &body).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// Serve line-delimited JSON-RPC on stdin/stdout until stdin closes.
pub async fn serve_stdio(service: Arc<PdfReaderService>) -> std::io::Result<()> {
    let state = McpState {
        service,
        messages_path: String::new(),
    };
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    info!("MCP server listening on stdio");
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(response) = handle_message(&state, &line).await {
            let mut out = serde_json::to_string(&response).map_err(std::io::Error::other)?;
            out.push('\n');
            stdout.write_all(out.as_bytes()).await?;
            stdout.flush().await?;
        }
    }
    info!("stdin closed, shutting down");
    Ok(())
}

/// Parse one raw JSON-RPC message and dispatch it.
pub async fn handle_message(state: &McpState, raw: &str) -> Option<McpResponse> {
    match serde_json::from_str::<McpRequest>(raw) {
        Ok(request) => dispatch(state, request).await,
        Err(e) => {
            warn!(error = %e, "Unparseable MCP message");
            Some(McpResponse::error(
                Value::Null,
                McpError::new(-32700, format!("Parse error: {}", e)),
            ))
        }
    }
}

/// Route a request to its handler. Returns `None` for notifications.
pub async fn dispatch(state: &McpState, request: McpRequest) -> Option<McpResponse> {
    debug!(method = %request.method, "MCP request received");

    let Some(id) = request.id else {
        debug!(method = %request.method, "MCP notification");
        return None;
    };

    let result = match request.method.as_str() {
        "initialize" => handle_initialize(state).await,
        "tools/list" => handle_tools_list(state).await,
        "tools/call" => handle_tool_call(state, request.params).await,
        "ping" => Ok(serde_json::json!({})),
        _ => Err(McpError::new(
            -32601,
            format!("Method not found: {}", request.method),
        )),
    };

    Some(match result {
        Ok(data) => McpResponse::result(id, data),
        Err(error) => McpResponse::error(id, error),
    })
}

// MCP Protocol Types

#[derive(Debug, Deserialize)]
pub struct McpRequest {
    /// Absent for notifications
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct McpResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<McpError>,
}

impl McpResponse {
    fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Value, error: McpError) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct McpError {
    code: i32,
    message: String,
}

impl McpError {
    fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(-32602, message)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::{AppConfig, VisionConfig};
    use serde_json::json;

    pub(crate) fn test_state() -> McpState {
        let config = AppConfig {
            vision: VisionConfig {
                enabled: false,
                ..VisionConfig::default()
            },
            ..AppConfig::default()
        };
        McpState {
            service: Arc::new(PdfReaderService::new(config).unwrap()),
            messages_path: "/mcp/messages".to_string(),
        }
    }

    async fn call(raw: Value) -> Option<Value> {
        let state = test_state();
        handle_message(&state, &raw.to_string())
            .await
            .map(|r| serde_json::to_value(r).unwrap())
    }

    #[tokio::test]
    async fn test_initialize() {
        let response = call(json!({
            "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}
        }))
        .await
        .unwrap();
        assert_eq!(response["id"], json!(1));
        assert_eq!(response["result"]["protocolVersion"], json!(PROTOCOL_VERSION));
        assert_eq!(
            response["result"]["serverInfo"]["name"],
            json!("pdf-reader-service")
        );
    }

    #[tokio::test]
    async fn test_tools_list() {
        let response = call(json!({ "jsonrpc": "2.0", "id": "a", "method": "tools/list" }))
            .await
            .unwrap();
        let tools = response["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 6);
        assert!(tools.iter().all(|t| t["inputSchema"].is_object()));
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let response = call(json!({ "jsonrpc": "2.0", "id": 7, "method": "resources/list" }))
            .await
            .unwrap();
        assert_eq!(response["error"]["code"], json!(-32601));
        assert!(response.get("result").is_none());
    }

    #[tokio::test]
    async fn test_notification_has_no_response() {
        let response = call(json!({
            "jsonrpc": "2.0", "method": "notifications/initialized"
        }))
        .await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_ping() {
        let response = call(json!({ "jsonrpc": "2.0", "id": 2, "method": "ping" }))
            .await
            .unwrap();
        assert_eq!(response["result"], json!({}));
    }

    #[tokio::test]
    async fn test_parse_error() {
        let state = test_state();
        let response = handle_message(&state, "{not json").await.unwrap();
        let response = serde_json::to_value(response).unwrap();
        assert_eq!(response["error"]["code"], json!(-32700));
        assert_eq!(response["id"], json!(null));
    }
}
