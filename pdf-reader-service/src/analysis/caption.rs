//! Image captioning through an Ollama vision model.

use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD};
use image::DynamicImage;
use tokio::sync::OnceCell;
use tracing::{error, info};

use crate::config::VisionConfig;
use crate::error::{AnalysisError, format_error_chain};
use crate::ollama::{ChatMessage, OllamaClient};

use super::encode_png;

/// Process-wide handle to the vision model.
///
/// The first `ensure_loaded` call checks the model is installed; the outcome,
/// success or failure, is kept for the life of the process.
pub struct CaptionModel {
    config: VisionConfig,
    loaded: OnceCell<Result<Arc<Captioner>, AnalysisError>>,
}

impl CaptionModel {
    pub fn new(config: VisionConfig) -> Self {
        Self {
            config,
            loaded: OnceCell::new(),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.config.model
    }

    pub async fn ensure_loaded(&self) -> Result<Arc<Captioner>, AnalysisError> {
        self.loaded
            .get_or_init(|| async {
                let result = self.load().await;
                match &result {
                    Ok(_) => info!(model = %self.config.model, "Vision model ready"),
                    Err(e) => error!(error = %e, "Vision model unavailable"),
                }
                result
            })
            .await
            .clone()
    }

    async fn load(&self) -> Result<Arc<Captioner>, AnalysisError> {
        let model = self.config.model.trim();
        if !self.config.enabled || model.is_empty() {
            return Err(AnalysisError::CaptionUnavailable {
                message: "vision captioning is disabled".to_string(),
            });
        }

        let unavailable = |e: crate::error::ServiceError| AnalysisError::CaptionUnavailable {
            message: format_error_chain(&e),
        };

        let client = OllamaClient::new(&self.config).map_err(unavailable)?;
        let installed = client.list_model_names().await.map_err(unavailable)?;

        if !installed.iter().any(|name| model_matches(name, model)) {
            return Err(AnalysisError::CaptionUnavailable {
                message: format!("model '{}' is not installed at {}", model, client.base_url()),
            });
        }

        Ok(Arc::new(Captioner {
            client,
            model: model.to_string(),
            prompt: self.config.prompt.clone(),
        }))
    }
}

/// A loaded vision model, ready to caption images.
pub struct Captioner {
    client: OllamaClient,
    model: String,
    prompt: String,
}

impl Captioner {
    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn caption(&self, image: &DynamicImage) -> Result<String, AnalysisError> {
        let png = encode_png(image).map_err(|e| AnalysisError::CaptionFailed {
            message: format!("cannot encode image: {}", e),
        })?;

        let message = ChatMessage::user_with_image(self.prompt.clone(), STANDARD.encode(png));
        let response = self
            .client
            .generate_simple(&self.model, vec![message])
            .await
            .map_err(|e| AnalysisError::CaptionFailed {
                message: format_error_chain(&e),
            })?;

        let caption = strip_think_tags(&response).trim().to_string();
        if caption.is_empty() {
            return Err(AnalysisError::CaptionFailed {
                message: "model returned an empty description".to_string(),
            });
        }
        Ok(caption)
    }
}

/// `llava` matches an installed `llava:latest` and vice versa.
fn model_matches(installed: &str, wanted: &str) -> bool {
    installed == wanted
        || installed.strip_suffix(":latest") == Some(wanted)
        || wanted.strip_suffix(":latest") == Some(installed)
}

/// Remove `<think>...</think>` blocks emitted by reasoning models.
/// An unclosed block runs to the end of the text.
pub fn strip_think_tags(text: &str) -> String {
    let mut result = text.to_string();
    while let Some(start) = result.find("<think>") {
        match result[start..].find("</think>") {
            Some(end) => {
                result.replace_range(start..start + end + "</think>".len(), "");
            }
            None => {
                result.truncate(start);
                break;
            }
        }
    }
    result
}
