//! HTTP transport.
//!
//! Serves the health endpoint and nests the MCP router at the configured path.

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

use crate::mcp::mcp_router;
use crate::service::{EngineHealth, PdfReaderService};

/// Application state
pub struct AppState {
    pub service: Arc<PdfReaderService>,
    pub start_time: Instant,
}

/// Build the HTTP router
pub fn router(service: Arc<PdfReaderService>) -> Router {
    let mcp_path = service.config.mcp.path.clone();
    let state = Arc::new(AppState {
        service: service.clone(),
        start_time: Instant::now(),
    });

    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
        .nest(&mcp_path, mcp_router(service, &mcp_path))
        .layer(TraceLayer::new_for_http())
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let engines = state.service.health().await;
    let status = health_status(&engines);

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        engines,
    })
}

/// "healthy" when every enabled engine responds, otherwise "degraded"
fn health_status(engines: &EngineHealth) -> &'static str {
    let vision_ok = !engines.vision_enabled || engines.ollama_available;
    if engines.ocr_available && vision_ok {
        "healthy"
    } else {
        "degraded"
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_seconds: u64,
    #[serde(flatten)]
    engines: EngineHealth,
}
