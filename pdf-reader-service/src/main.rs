use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

mod analysis;
mod api;
mod config;
mod error;
mod mcp;
mod ollama;
mod pdf;
mod service;
mod tools;

use crate::config::{Transport, load_config};
use crate::service::PdfReaderService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    init_logging();

    info!(
        "Starting PDF reader service v{}",
        env!("CARGO_PKG_VERSION")
    );

    let config = load_config()?;
    info!(
        transport = ?config.server.transport,
        host = %config.server.host,
        port = config.server.port,
        "Configuration loaded"
    );

    let transport = config.server.transport;
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let service = Arc::new(PdfReaderService::new(config)?);

    match transport {
        Transport::Stdio => mcp::serve_stdio(service).await?,
        Transport::Http => {
            info!(path = %service.config.mcp.path, "MCP server enabled");
            let app = api::router(service);

            let listener = TcpListener::bind(&addr).await?;
            info!("Listening on {}", addr);

            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}

/// Logs always go to stderr; stdout carries protocol traffic in stdio mode.
fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let format = fmt::format()
        .with_target(true)
        .with_thread_ids(true)
        .compact();

    // Use RUST_LOG if set, otherwise default to info level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pdf_reader_service=info"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .event_format(format)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}
