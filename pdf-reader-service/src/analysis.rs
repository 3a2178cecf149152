//! Image characterization.
//!
//! Combines pixel statistics, OCR text and an optional vision-model caption
//! into a single [`AnalysisResult`]. Failures in any one part are recorded in
//! that part of the result; the caller always gets a result back.

mod caption;
mod description;
mod heuristics;
mod ocr;
mod stats;

pub use caption::CaptionModel;
pub use description::describe;
pub use heuristics::ImageHeuristics;
pub use ocr::{TesseractOcr, TextRecognizer, word_count};
pub use stats::{ImageStats, compute_stats};
pub(crate) use stats::round_to;

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::AnalysisError;

/// Per-call analysis switches.
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub use_vision: bool,
    pub ocr_language: String,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            use_vision: false,
            ocr_language: "eng".to_string(),
        }
    }
}

/// Statistics, or the reason there are none
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum BasicInfo {
    Stats(ImageStats),
    Error {
        error: String,
        error_kind: &'static str,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct OcrOutcome {
    pub ocr_text: String,
    pub has_text: bool,
    pub word_count: usize,
    pub character_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
}

impl From<Result<String, AnalysisError>> for OcrOutcome {
    fn from(result: Result<String, AnalysisError>) -> Self {
        match result {
            Ok(text) => Self {
                has_text: !text.is_empty(),
                word_count: word_count(&text),
                character_count: text.chars().count(),
                ocr_text: text,
                error: None,
                error_kind: None,
            },
            Err(e) => Self {
                ocr_text: String::new(),
                has_text: false,
                word_count: 0,
                character_count: 0,
                error: Some(e.to_string()),
                error_kind: Some(e.kind()),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CaptionOutcome {
    pub vision_description: String,
    pub has_description: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
}

impl CaptionOutcome {
    fn new(result: Result<String, AnalysisError>, model_used: Option<String>) -> Self {
        match result {
            Ok(caption) => Self {
                has_description: !caption.is_empty(),
                vision_description: caption,
                model_used,
                error: None,
                error_kind: None,
            },
            Err(e) => Self {
                vision_description: String::new(),
                has_description: false,
                model_used,
                error: Some(e.to_string()),
                error_kind: Some(e.kind()),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisSummary {
    pub has_text: bool,
    pub has_vision_description: bool,
    pub is_likely_text: Option<bool>,
}

/// Everything known about one image.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    /// Set only when the image could not be read at all
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basic_info: Option<BasicInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr: Option<OcrOutcome>,
    /// Absent unless captioning was requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vision: Option<CaptionOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_summary: Option<AnalysisSummary>,
}

impl AnalysisResult {
    fn unreadable(image_path: Option<String>, error: AnalysisError) -> Self {
        warn!(path = ?image_path, error = %error, "Image could not be analyzed");
        Self {
            image_path,
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
            basic_info: None,
            ocr: None,
            vision: None,
            description: None,
            analysis_summary: None,
        }
    }

    fn assemble(
        image_path: Option<String>,
        stats: Result<ImageStats, AnalysisError>,
        ocr: OcrOutcome,
        vision: Option<CaptionOutcome>,
    ) -> Self {
        let description = describe(
            stats.as_ref().ok(),
            Some(&ocr.ocr_text),
            vision.as_ref().map(|v| v.vision_description.as_str()),
        );

        let analysis_summary = AnalysisSummary {
            has_text: ocr.has_text,
            has_vision_description: vision.as_ref().is_some_and(|v| v.has_description),
            is_likely_text: stats.as_ref().ok().and_then(|s| s.is_likely_text),
        };

        let basic_info = match stats {
            Ok(stats) => BasicInfo::Stats(stats),
            Err(e) => BasicInfo::Error {
                error: e.to_string(),
                error_kind: e.kind(),
            },
        };

        Self {
            image_path,
            error: None,
            error_kind: None,
            basic_info: Some(basic_info),
            ocr: Some(ocr),
            vision,
            description: Some(description),
            analysis_summary: Some(analysis_summary),
        }
    }

    pub fn has_text(&self) -> bool {
        self.ocr.as_ref().is_some_and(|o| o.has_text)
    }
}

/// Runs statistics, OCR and captioning over images.
pub struct ImageAnalyzer {
    heuristics: ImageHeuristics,
    recognizer: Arc<dyn TextRecognizer>,
    captions: Arc<CaptionModel>,
}

impl ImageAnalyzer {
    pub fn new(
        heuristics: ImageHeuristics,
        recognizer: Arc<dyn TextRecognizer>,
        captions: Arc<CaptionModel>,
    ) -> Self {
        Self {
            heuristics,
            recognizer,
            captions,
        }
    }

    pub fn heuristics(&self) -> &ImageHeuristics {
        &self.heuristics
    }

    pub fn recognizer(&self) -> Arc<dyn TextRecognizer> {
        self.recognizer.clone()
    }

    /// Decode an image file and analyze it.
    ///
    /// Decoding, statistics and OCR run on the blocking pool; the caption
    /// request is awaited afterwards.
    pub async fn analyze_file(&self, path: &Path, options: &AnalysisOptions) -> AnalysisResult {
        let display_path = Some(path.display().to_string());
        let path: PathBuf = path.to_path_buf();
        let heuristics = self.heuristics.clone();
        let recognizer = self.recognizer.clone();
        let language = options.ocr_language.clone();

        let local = tokio::task::spawn_blocking(move || {
            let loaded = load_image(&path)?;
            let (stats, ocr) =
                characterize(&loaded.image, &heuristics, recognizer.as_ref(), &language);
            let stats = stats.map(|s| s.with_source(loaded.format, Some(loaded.size_bytes)));
            Ok::<_, AnalysisError>((loaded.image, stats, ocr))
        })
        .await;

        let (image, stats, ocr) = match local {
            Ok(Ok(parts)) => parts,
            Ok(Err(e)) => return AnalysisResult::unreadable(display_path, e),
            Err(e) => {
                return AnalysisResult::unreadable(
                    display_path,
                    AnalysisError::ImageUnreadable {
                        message: format!("analysis task failed: {}", e),
                    },
                );
            }
        };

        let vision = if options.use_vision {
            Some(self.caption(&image).await)
        } else {
            None
        };

        AnalysisResult::assemble(display_path, stats, ocr, vision)
    }

    async fn caption(&self, image: &DynamicImage) -> CaptionOutcome {
        match self.captions.ensure_loaded().await {
            Ok(captioner) => {
                let result = captioner.caption(image).await;
                if let Err(e) = &result {
                    warn!(error = %e, model = captioner.model(), "Captioning failed");
                }
                CaptionOutcome::new(result, Some(captioner.model().to_string()))
            }
            Err(e) => CaptionOutcome::new(Err(e), None),
        }
    }
}

/// Statistics and OCR for an already decoded image. Blocking.
pub fn characterize(
    image: &DynamicImage,
    heuristics: &ImageHeuristics,
    recognizer: &dyn TextRecognizer,
    language: &str,
) -> (Result<ImageStats, AnalysisError>, OcrOutcome) {
    let stats = compute_stats(image, heuristics);
    if let Err(e) = &stats {
        debug!(error = %e, "No statistics for image");
    }

    let (width, height) = image.dimensions();
    let ocr = if heuristics.too_small_for_ocr(width, height) {
        Err(AnalysisError::OcrSkipped)
    } else {
        recognizer.recognize(image, language)
    };
    match &ocr {
        Err(AnalysisError::OcrSkipped) | Ok(_) => {}
        Err(e) => warn!(error = %e, "OCR failed"),
    }

    (stats, OcrOutcome::from(ocr))
}

struct LoadedImage {
    image: DynamicImage,
    format: Option<String>,
    size_bytes: u64,
}

fn load_image(path: &Path) -> Result<LoadedImage, AnalysisError> {
    let unreadable = |e: &dyn std::fmt::Display| AnalysisError::ImageUnreadable {
        message: format!("{}: {}", path.display(), e),
    };

    let size_bytes = std::fs::metadata(path).map_err(|e| unreadable(&e))?.len();
    let reader = ImageReader::open(path)
        .map_err(|e| unreadable(&e))?
        .with_guessed_format()
        .map_err(|e| unreadable(&e))?;
    let format = reader
        .format()
        .and_then(|f| f.extensions_str().first().map(|ext| ext.to_string()));
    let image = reader.decode().map_err(|e| unreadable(&e))?;

    Ok(LoadedImage {
        image,
        format,
        size_bytes,
    })
}

/// PNG-encode an image, converting float pixel formats PNG cannot hold.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buffer = Vec::new();
    let mut cursor = Cursor::new(&mut buffer);
    match image {
        DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
            DynamicImage::ImageRgba8(image.to_rgba8()).write_to(&mut cursor, ImageFormat::Png)?
        }
        _ => image.write_to(&mut cursor, ImageFormat::Png)?,
    }
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VisionConfig;
    use image::{Rgb, RgbImage};
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedOcr {
        text: Result<String, AnalysisError>,
        calls: AtomicUsize,
    }

    impl FixedOcr {
        fn new(text: Result<&str, AnalysisError>) -> Self {
            Self {
                text: text.map(str::to_string),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl TextRecognizer for FixedOcr {
        fn ensure_available(&self) -> Result<(), AnalysisError> {
            self.text.as_ref().map(|_| ()).map_err(Clone::clone)
        }

        fn recognize(&self, _image: &DynamicImage, _language: &str) -> Result<String, AnalysisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.text.clone()
        }
    }

    fn disabled_captions() -> Arc<CaptionModel> {
        Arc::new(CaptionModel::new(VisionConfig {
            enabled: false,
            ..VisionConfig::default()
        }))
    }

    fn solid(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([90, 140, 200])))
    }

    #[test]
    fn test_small_image_skips_ocr() {
        let ocr = FixedOcr::new(Ok("never read"));
        let (stats, outcome) = characterize(&solid(30, 120), &ImageHeuristics::default(), &ocr, "eng");

        assert!(stats.is_ok());
        assert_eq!(outcome.error_kind, Some("ocr_skipped"));
        assert_eq!(outcome.error.as_deref(), Some("Image too small for OCR"));
        assert!(!outcome.has_text);
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_ocr_failure_leaves_stats_intact() {
        let ocr = FixedOcr::new(Err(AnalysisError::OcrUnavailable {
            message: "not installed".to_string(),
        }));
        let (stats, outcome) = characterize(&solid(80, 80), &ImageHeuristics::default(), &ocr, "eng");

        assert!(stats.unwrap().brightness.is_some());
        assert_eq!(outcome.error_kind, Some("ocr_unavailable"));
        assert_eq!(outcome.ocr_text, "");
    }

    #[test]
    fn test_ocr_counts() {
        let ocr = FixedOcr::new(Ok("Quarterly report 2024"));
        let (_, outcome) = characterize(&solid(80, 80), &ImageHeuristics::default(), &ocr, "eng");
        assert!(outcome.has_text);
        assert_eq!(outcome.word_count, 3);
        assert_eq!(outcome.character_count, 21);
    }

    #[tokio::test]
    async fn test_analyze_file_without_caption_model() {
        let file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        solid(120, 80).save_with_format(file.path(), ImageFormat::Png).unwrap();

        let analyzer = ImageAnalyzer::new(
            ImageHeuristics::default(),
            Arc::new(FixedOcr::new(Ok("INVOICE 42"))),
            disabled_captions(),
        );
        let options = AnalysisOptions {
            use_vision: true,
            ..AnalysisOptions::default()
        };
        let result = analyzer.analyze_file(file.path(), &options).await;

        assert!(result.error.is_none());
        let Some(BasicInfo::Stats(stats)) = result.basic_info.as_ref() else {
            panic!("expected statistics, got {:?}", result.basic_info);
        };
        assert_eq!(stats.format.as_deref(), Some("png"));
        assert!(stats.file_size_bytes.unwrap() > 0);

        let vision = result.vision.as_ref().unwrap();
        assert!(!vision.has_description);
        assert_eq!(vision.error_kind, Some("caption_unavailable"));

        let description = result.description.as_deref().unwrap();
        assert!(description.contains("The image contains the following text: \"INVOICE 42\""));
        assert!(!description.contains("Content description"));
        assert!(result.has_text());
        let summary = result.analysis_summary.as_ref().unwrap();
        assert!(!summary.has_vision_description);
    }

    #[tokio::test]
    async fn test_vision_absent_unless_requested() {
        let file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        solid(60, 60).save_with_format(file.path(), ImageFormat::Png).unwrap();

        let analyzer = ImageAnalyzer::new(
            ImageHeuristics::default(),
            Arc::new(FixedOcr::new(Ok(""))),
            disabled_captions(),
        );
        let result = analyzer
            .analyze_file(file.path(), &AnalysisOptions::default())
            .await;

        assert!(result.vision.is_none());
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("vision").is_none());
    }

    #[tokio::test]
    async fn test_unreadable_image_reports_only_error() {
        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        file.write_all(b"definitely not an image").unwrap();
        file.flush().unwrap();

        let analyzer = ImageAnalyzer::new(
            ImageHeuristics::default(),
            Arc::new(FixedOcr::new(Ok("unused"))),
            disabled_captions(),
        );
        let result = analyzer
            .analyze_file(file.path(), &AnalysisOptions::default())
            .await;

        assert_eq!(result.error_kind, Some("image_unreadable"));
        assert!(result.basic_info.is_none());
        assert!(result.ocr.is_none());
        assert!(result.description.is_none());
    }

    #[tokio::test]
    async fn test_tiny_image_still_gets_a_description() {
        let file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        solid(8, 8).save_with_format(file.path(), ImageFormat::Png).unwrap();

        let analyzer = ImageAnalyzer::new(
            ImageHeuristics::default(),
            Arc::new(FixedOcr::new(Ok("unused"))),
            disabled_captions(),
        );
        let result = analyzer
            .analyze_file(file.path(), &AnalysisOptions::default())
            .await;

        match result.basic_info.as_ref().unwrap() {
            BasicInfo::Error { error_kind, .. } => assert_eq!(*error_kind, "image_too_small"),
            BasicInfo::Stats(_) => panic!("expected a basic info error"),
        }
        assert!(
            result
                .description
                .as_deref()
                .unwrap()
                .starts_with("Image analysis completed.")
        );
    }

    #[test]
    fn test_encode_png_roundtrips_dimensions() {
        let png = encode_png(&solid(17, 9)).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.dimensions(), (17, 9));
    }
}
