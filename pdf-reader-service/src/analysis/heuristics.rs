//! Tunable thresholds for image characterization.

use serde::{Deserialize, Serialize};

/// Thresholds used when turning pixel statistics into descriptive flags.
///
/// All values are on the 0-255 channel scale unless noted. Every field can be
/// overridden from the `[analysis.heuristics]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageHeuristics {
    /// Mean per-channel standard deviation above which an image is "colorful"
    pub colorful_std_threshold: f64,

    /// Mean sample value above which an image is "bright"
    pub bright_threshold: f64,

    /// Mean sample value below which an image is "dark"
    pub dark_threshold: f64,

    /// Gray-level standard deviation above which an image may be text
    pub text_contrast_threshold: f64,

    /// Gray-level mean below which an image may be text
    pub text_darkness_threshold: f64,

    /// Fraction (0-1) of sampled pixels a channel must win to name the hue
    pub hue_dominance_fraction: f64,

    /// Maximum number of pixels sampled for color statistics
    pub sample_size: usize,

    /// Images narrower or shorter than this get no statistics
    pub min_analysis_dimension: u32,

    /// Images narrower or shorter than this are not sent to OCR
    pub min_ocr_dimension: u32,
}

impl ImageHeuristics {
    pub fn too_small_for_analysis(&self, width: u32, height: u32) -> bool {
        width < self.min_analysis_dimension || height < self.min_analysis_dimension
    }

    pub fn too_small_for_ocr(&self, width: u32, height: u32) -> bool {
        width < self.min_ocr_dimension || height < self.min_ocr_dimension
    }
}

impl Default for ImageHeuristics {
    fn default() -> Self {
        Self {
            colorful_std_threshold: 30.0,
            bright_threshold: 180.0,
            dark_threshold: 75.0,
            text_contrast_threshold: 50.0,
            text_darkness_threshold: 128.0,
            hue_dominance_fraction: 0.4,
            sample_size: 10_000,
            min_analysis_dimension: 10,
            min_ocr_dimension: 50,
        }
    }
}
