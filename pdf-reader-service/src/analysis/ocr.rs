//! Text recognition over raster images.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use image::DynamicImage;
use tracing::{debug, info, warn};

use crate::config::OcrConfig;
use crate::error::AnalysisError;

use super::encode_png;

/// An OCR engine.
///
/// Implementations are called from blocking contexts only.
pub trait TextRecognizer: Send + Sync {
    /// Probe the engine once; errors are `OcrUnavailable`.
    fn ensure_available(&self) -> Result<(), AnalysisError>;

    /// Recognize text in `image`, returning it trimmed.
    fn recognize(&self, image: &DynamicImage, language: &str) -> Result<String, AnalysisError>;
}

/// Tesseract invoked as a subprocess.
pub struct TesseractOcr {
    command: PathBuf,
    page_segmentation_mode: u8,
    probe: OnceLock<Result<(), AnalysisError>>,
}

/// Default install locations checked on Windows when tesseract is not on PATH
const WINDOWS_INSTALL_PATHS: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR\tesseract.exe",
    r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
];

impl TesseractOcr {
    pub fn new(config: &OcrConfig) -> Self {
        let command = config
            .tesseract_cmd
            .clone()
            .unwrap_or_else(default_command);
        Self {
            command,
            page_segmentation_mode: config.page_segmentation_mode,
            probe: OnceLock::new(),
        }
    }

    pub fn command(&self) -> &Path {
        &self.command
    }

    fn probe(&self) -> Result<(), AnalysisError> {
        let output = Command::new(&self.command)
            .arg("--version")
            .output()
            .map_err(|e| AnalysisError::OcrUnavailable {
                message: format!("cannot run {}: {}", self.command.display(), e),
            })?;

        if !output.status.success() {
            return Err(AnalysisError::OcrUnavailable {
                message: format!(
                    "{} --version exited with {}",
                    self.command.display(),
                    output.status
                ),
            });
        }

        // Tesseract has printed its version to either stream depending on release
        let banner = if output.stdout.is_empty() {
            String::from_utf8_lossy(&output.stderr).into_owned()
        } else {
            String::from_utf8_lossy(&output.stdout).into_owned()
        };
        info!(
            command = %self.command.display(),
            version = banner.lines().next().unwrap_or_default(),
            "Tesseract available"
        );
        Ok(())
    }
}

impl TextRecognizer for TesseractOcr {
    fn ensure_available(&self) -> Result<(), AnalysisError> {
        self.probe
            .get_or_init(|| {
                let result = self.probe();
                if let Err(e) = &result {
                    warn!(error = %e, "OCR disabled");
                }
                result
            })
            .clone()
    }

    fn recognize(&self, image: &DynamicImage, language: &str) -> Result<String, AnalysisError> {
        self.ensure_available()?;

        let png = encode_png(image).map_err(|e| AnalysisError::OcrFailed {
            message: format!("cannot encode image: {}", e),
        })?;

        let mut scratch = tempfile::Builder::new()
            .prefix("ocr_")
            .suffix(".png")
            .tempfile()
            .map_err(|e| AnalysisError::OcrFailed {
                message: format!("cannot create temp file: {}", e),
            })?;
        scratch
            .write_all(&png)
            .and_then(|_| scratch.flush())
            .map_err(|e| AnalysisError::OcrFailed {
                message: format!("cannot write temp file: {}", e),
            })?;

        let output = Command::new(&self.command)
            .arg(scratch.path())
            .arg("stdout")
            .args(["-l", language])
            .arg("--psm")
            .arg(self.page_segmentation_mode.to_string())
            .output()
            .map_err(|e| AnalysisError::OcrFailed {
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(AnalysisError::OcrFailed {
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!(chars = text.chars().count(), language, "OCR complete");
        Ok(text)
    }
}

fn default_command() -> PathBuf {
    if cfg!(windows)
        && !on_path("tesseract")
        && let Some(found) = WINDOWS_INSTALL_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|p| p.is_file())
    {
        return found;
    }
    PathBuf::from("tesseract")
}

fn on_path(program: &str) -> bool {
    Command::new(program)
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Count whitespace-separated words.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary_is_unavailable() {
        let ocr = TesseractOcr::new(&OcrConfig {
            tesseract_cmd: Some(PathBuf::from("/nonexistent/bin/tesseract-for-tests")),
            ..OcrConfig::default()
        });

        let err = ocr.ensure_available().unwrap_err();
        assert_eq!(err.kind(), "ocr_unavailable");

        // Result is cached and recognize reports the same failure
        let image = DynamicImage::new_rgb8(100, 100);
        assert_eq!(ocr.recognize(&image, "eng").unwrap_err(), err);
    }

    #[test]
    fn test_configured_command_wins() {
        let ocr = TesseractOcr::new(&OcrConfig {
            tesseract_cmd: Some(PathBuf::from("/opt/ocr/tesseract")),
            ..OcrConfig::default()
        });
        assert_eq!(ocr.command(), Path::new("/opt/ocr/tesseract"));
    }

    #[test]
    fn test_word_count() {
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("  one\ttwo\nthree  "), 3);
    }
}
