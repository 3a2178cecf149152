//! Tool execution.
//!
//! `PdfReaderService` owns the long-lived pieces (HTTP client, OCR engine,
//! caption model) and runs each tool: resolve the PDF, do the blocking work on
//! the blocking pool, wrap the result in the response envelope and remove any
//! downloaded file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::analysis::{AnalysisOptions, AnalysisResult, CaptionModel, ImageAnalyzer, TesseractOcr};
use crate::config::AppConfig;
use crate::error::{ServiceError, ServiceResult, format_error_chain};
use crate::ollama::OllamaClient;
use crate::pdf::images::{ExtractedImage, ExtractionSummary};
use crate::pdf::{self, PdfSource, source::download_client};
use crate::tools::{
    AnalyzeImageArgs, ExtractPdfImagesArgs, PdfDocumentArgs, ReadPdfTextArgs, ReadPdfWithOcrArgs,
    ToolFailure, ToolResponse,
};

/// Main service coordinator
pub struct PdfReaderService {
    pub config: AppConfig,
    http: reqwest::Client,
    analyzer: ImageAnalyzer,
    /// Only present when captioning is enabled
    ollama: Option<OllamaClient>,
}

#[derive(Debug, Serialize)]
struct ImageExtractionReport {
    output_directory: PathBuf,
    pages_processed: String,
    total_pages: u16,
    images_extracted: usize,
    images: Vec<ExtractedImage>,
    summary: ExtractionSummary,
}

/// Readiness of the external engines
#[derive(Debug, Serialize)]
pub struct EngineHealth {
    pub ocr_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr_error: Option<String>,
    pub vision_enabled: bool,
    pub vision_model: String,
    pub ollama_available: bool,
}

impl PdfReaderService {
    pub fn new(config: AppConfig) -> ServiceResult<Self> {
        info!("Initializing PDF reader service");

        let http = download_client(&config.download)?;

        let recognizer = Arc::new(TesseractOcr::new(&config.ocr));
        info!(command = %recognizer.command().display(), "OCR engine configured");

        let captions = Arc::new(CaptionModel::new(config.vision.clone()));
        let ollama = if config.vision.enabled {
            info!(
                url = %config.vision.base_url,
                model = captions.model_name(),
                "Vision captioning enabled"
            );
            Some(OllamaClient::new(&config.vision)?)
        } else {
            info!("Vision captioning disabled");
            None
        };

        let analyzer = ImageAnalyzer::new(config.analysis.heuristics.clone(), recognizer, captions);

        Ok(Self {
            config,
            http,
            analyzer,
            ollama,
        })
    }

    /// Run a blocking closure on the blocking pool.
    async fn blocking<T, F>(f: F) -> ServiceResult<T>
    where
        F: FnOnce() -> ServiceResult<T> + Send + 'static,
        T: Send + 'static,
    {
        tokio::task::spawn_blocking(f)
            .await
            .map_err(|e| ServiceError::Internal {
                message: format!("blocking task failed: {}", e),
            })?
    }

    fn ocr_language(&self, requested: Option<String>) -> String {
        requested
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| self.config.ocr.default_language.clone())
    }

    /// Resolve the source, run `work`, and release any download.
    async fn with_pdf<T, Fut>(
        &self,
        tool: &'static str,
        source: &PdfSource,
        work: impl FnOnce(PathBuf) -> Fut,
    ) -> Value
    where
        T: Serialize,
        Fut: Future<Output = ServiceResult<T>>,
    {
        info!(tool, file_path = ?source.file_path, url = ?source.url, "Tool started");

        let resolved = match source.resolve(&self.http, &self.config.download).await {
            Ok(resolved) => resolved,
            Err(e) => return failure(tool, &e, source),
        };

        let result = work(resolved.path().to_path_buf()).await;
        let response = match result {
            Ok(body) => {
                info!(tool, "Tool finished");
                to_value(ToolResponse::new(resolved.file_path(), resolved.url(), body))
            }
            Err(e) => failure(tool, &e, source),
        };

        resolved.cleanup();
        response
    }

    pub async fn read_pdf_text(&self, args: ReadPdfTextArgs) -> Value {
        let range = args.page_range;
        self.with_pdf("read_pdf_text", &args.source, |path| {
            Self::blocking(move || pdf::read_text(&path, range.as_ref()))
        })
        .await
    }

    pub async fn read_pdf_with_ocr(&self, args: ReadPdfWithOcrArgs) -> Value {
        let range = args.page_range;
        let language = self.ocr_language(args.ocr_language);
        let recognizer = self.analyzer.recognizer();
        let min_dimension = self.analyzer.heuristics().min_ocr_dimension;

        self.with_pdf("read_pdf_with_ocr", &args.source, |path| {
            Self::blocking(move || {
                pdf::read_with_ocr(
                    &path,
                    range.as_ref(),
                    &language,
                    recognizer.as_ref(),
                    min_dimension,
                )
            })
        })
        .await
    }

    pub async fn get_pdf_info(&self, args: PdfDocumentArgs) -> Value {
        self.with_pdf("get_pdf_info", &args.source, |path| {
            Self::blocking(move || pdf::pdf_info(&path))
        })
        .await
    }

    pub async fn analyze_pdf_structure(&self, args: PdfDocumentArgs) -> Value {
        self.with_pdf("analyze_pdf_structure", &args.source, |path| {
            Self::blocking(move || pdf::analyze_structure(&path))
        })
        .await
    }

    pub async fn extract_pdf_images(&self, args: ExtractPdfImagesArgs) -> Value {
        let ExtractPdfImagesArgs {
            source,
            output_dir,
            page_range,
            analyze_images,
            use_vision_model,
            ocr_language,
        } = args;
        let options = AnalysisOptions {
            use_vision: use_vision_model,
            ocr_language: self.ocr_language(ocr_language),
        };
        let min_dimension = self.analyzer.heuristics().min_analysis_dimension;

        self.with_pdf("extract_pdf_images", &source, |path| async move {
            let output_dir = match output_dir {
                Some(dir) => PathBuf::from(dir),
                None => tempfile::Builder::new()
                    .prefix("pdf_images_")
                    .tempdir()?
                    .keep(),
            };

            let dir = output_dir.clone();
            let extraction = Self::blocking(move || {
                pdf::extract_images(&path, page_range.as_ref(), &dir, min_dimension)
            })
            .await?;

            let mut images = extraction.images;
            if analyze_images {
                for image in &mut images {
                    let analysis = self.analyzer.analyze_file(&image.path, &options).await;
                    image.description = analysis.description.clone();
                    image.analysis = Some(analysis);
                }
            }

            Ok::<_, ServiceError>(ImageExtractionReport {
                output_directory: output_dir,
                pages_processed: extraction.span.label(),
                total_pages: extraction.total_pages,
                images_extracted: images.len(),
                summary: ExtractionSummary::of(&images),
                images,
            })
        })
        .await
    }

    pub async fn analyze_image(&self, args: AnalyzeImageArgs) -> Value {
        info!(tool = "analyze_image", image_path = %args.image_path, "Tool started");

        let path = Path::new(&args.image_path);
        if !path.is_file() {
            let e = ServiceError::FileNotFound {
                path: args.image_path.clone(),
            };
            warn!(tool = "analyze_image", error = %e, "Tool failed");
            return to_value(ToolFailure::new(&e, Some(args.image_path), None));
        }

        let options = AnalysisOptions {
            use_vision: args.use_vision_model,
            ocr_language: self.ocr_language(args.ocr_language),
        };
        let result: AnalysisResult = self.analyzer.analyze_file(path, &options).await;
        info!(
            tool = "analyze_image",
            has_text = result.has_text(),
            "Tool finished"
        );
        to_value(ToolResponse::new(Some(args.image_path), None, result))
    }

    pub async fn health(&self) -> EngineHealth {
        let recognizer = self.analyzer.recognizer();
        let probe = tokio::task::spawn_blocking(move || recognizer.ensure_available())
            .await
            .map_err(|e| e.to_string())
            .and_then(|r| r.map_err(|e| e.to_string()));

        let ollama_available = match &self.ollama {
            Some(client) => client.health_check().await,
            None => false,
        };

        EngineHealth {
            ocr_available: probe.is_ok(),
            ocr_error: probe.err(),
            vision_enabled: self.ollama.is_some(),
            vision_model: self.config.vision.model.clone(),
            ollama_available,
        }
    }
}

fn failure(tool: &'static str, error: &ServiceError, source: &PdfSource) -> Value {
    warn!(tool, error = %format_error_chain(error), "Tool failed");
    to_value(ToolFailure::for_source(error, source))
}

fn to_value<T: Serialize>(response: T) -> Value {
    serde_json::to_value(response).unwrap_or_else(|e| {
        serde_json::json!({
            "success": false,
            "error": format!("Failed to serialize tool response: {}", e),
            "code": "internal_error",
        })
    })
}

/// Whether a tool response reports failure
pub fn is_failure(response: &Value) -> bool {
    response.get("success").and_then(Value::as_bool) == Some(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VisionConfig;
    use serde_json::json;
    use std::io::Write;

    fn offline_config() -> AppConfig {
        AppConfig {
            vision: VisionConfig {
                enabled: false,
                ..VisionConfig::default()
            },
            ..AppConfig::default()
        }
    }

    #[tokio::test]
    async fn test_both_sources_fail_with_envelope() {
        let service = PdfReaderService::new(offline_config()).unwrap();
        let args: ReadPdfTextArgs = serde_json::from_value(json!({
            "file_path": "a.pdf",
            "url": "https://example.com/a.pdf"
        }))
        .unwrap();

        let response = service.read_pdf_text(args).await;
        assert!(is_failure(&response));
        assert_eq!(response["code"], json!("invalid_request"));
        assert_eq!(response["file_path"], json!("a.pdf"));
        assert_eq!(response["url"], json!("https://example.com/a.pdf"));
    }

    #[tokio::test]
    async fn test_missing_pdf_reports_not_found() {
        let service = PdfReaderService::new(offline_config()).unwrap();
        let args: PdfDocumentArgs =
            serde_json::from_value(json!({ "file_path": "/no/such/report.pdf" })).unwrap();

        let response = service.get_pdf_info(args).await;
        assert!(is_failure(&response));
        assert_eq!(response["code"], json!("file_not_found"));
    }

    #[tokio::test]
    async fn test_analyze_missing_image() {
        let service = PdfReaderService::new(offline_config()).unwrap();
        let args: AnalyzeImageArgs =
            serde_json::from_value(json!({ "image_path": "/no/such/chart.png" })).unwrap();

        let response = service.analyze_image(args).await;
        assert!(is_failure(&response));
        assert_eq!(response["code"], json!("file_not_found"));
    }

    #[tokio::test]
    async fn test_analyze_unreadable_image_still_succeeds() {
        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        file.write_all(b"not really a png").unwrap();
        let path = file.path().display().to_string();

        let service = PdfReaderService::new(offline_config()).unwrap();
        let args: AnalyzeImageArgs =
            serde_json::from_value(json!({ "image_path": path })).unwrap();

        let response = service.analyze_image(args).await;
        assert!(!is_failure(&response));
        assert_eq!(response["error_kind"], json!("image_unreadable"));
        assert_eq!(response["file_path"], json!(path));
    }

    #[test]
    fn test_ocr_language_falls_back_to_config() {
        let service = PdfReaderService::new(offline_config()).unwrap();
        assert_eq!(service.ocr_language(None), "eng");
        assert_eq!(service.ocr_language(Some("  ".to_string())), "eng");
        assert_eq!(service.ocr_language(Some("deu".to_string())), "deu");
    }

    #[tokio::test]
    async fn test_health_without_vision() {
        let mut config = offline_config();
        config.ocr.tesseract_cmd = Some(PathBuf::from("/definitely/not/tesseract"));
        let service = PdfReaderService::new(config).unwrap();

        let health = service.health().await;
        assert!(!health.ocr_available);
        assert!(health.ocr_error.is_some());
        assert!(!health.vision_enabled);
        assert!(!health.ollama_available);
    }
}
