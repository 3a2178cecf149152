//! Service configuration.
//!
//! Loaded once at startup from an optional `config.{toml,yaml,json}` file,
//! overridden by `PDF_READER__SECTION__KEY` environment variables.

mod loader;

pub use loader::load_config;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::analysis::ImageHeuristics;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub mcp: McpConfig,

    #[serde(default)]
    pub download: DownloadConfig,

    #[serde(default)]
    pub ocr: OcrConfig,

    #[serde(default)]
    pub vision: VisionConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// How MCP messages reach the service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// SSE + POST endpoints served by axum
    #[default]
    Http,
    /// Line-delimited JSON-RPC on stdin/stdout
    Stdio,
}

/// Server binding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub transport: Transport,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            transport: Transport::default(),
        }
    }
}

/// MCP endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    #[serde(default = "default_mcp_path")]
    pub path: String,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            path: default_mcp_path(),
        }
    }
}

/// PDF download settings for URL sources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    #[serde(default = "default_download_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Upper bound on downloaded bytes (0 = unlimited)
    #[serde(default)]
    pub max_size_bytes: u64,
}

impl DownloadConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_download_timeout_secs(),
            max_redirects: default_max_redirects(),
            max_size_bytes: 0,
        }
    }
}

/// Tesseract OCR configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Explicit path to the tesseract executable. When unset, PATH and the
    /// usual install locations are searched.
    #[serde(default)]
    pub tesseract_cmd: Option<PathBuf>,

    #[serde(default = "default_ocr_language")]
    pub default_language: String,

    /// Tesseract `--psm` value (6 = assume a uniform block of text)
    #[serde(default = "default_page_segmentation_mode")]
    pub page_segmentation_mode: u8,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tesseract_cmd: None,
            default_language: default_ocr_language(),
            page_segmentation_mode: default_page_segmentation_mode(),
        }
    }
}

/// Vision model (Ollama) configuration for image captioning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    #[serde(default = "default_vision_enabled")]
    pub enabled: bool,

    #[serde(default = "default_ollama_url")]
    pub base_url: String,

    /// Vision model name (e.g., llava, moondream). Empty means no captioning.
    #[serde(default = "default_vision_model")]
    pub model: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_caption_prompt")]
    pub prompt: String,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            enabled: default_vision_enabled(),
            base_url: default_ollama_url(),
            model: default_vision_model(),
            request_timeout_secs: default_request_timeout_secs(),
            prompt: default_caption_prompt(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub heuristics: ImageHeuristics,
}

// ==================== Default Value Functions ====================

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8090
}

fn default_mcp_path() -> String {
    "/mcp".to_string()
}

fn default_download_timeout_secs() -> u64 {
    30
}

fn default_max_redirects() -> usize {
    10
}

fn default_ocr_language() -> String {
    "eng".to_string()
}

fn default_page_segmentation_mode() -> u8 {
    6
}

fn default_vision_enabled() -> bool {
    true
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_vision_model() -> String {
    "llava".to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_caption_prompt() -> String {
    "Describe this image in detail. Focus on what it depicts (people, objects, charts, \
     diagrams, scenery) and any text that is visible. Be concise but specific."
        .to_string()
}
