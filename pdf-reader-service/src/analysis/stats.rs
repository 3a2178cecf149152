//! Pixel statistics for a single decoded image.
//!
//! Color, brightness and hue estimates come from a random pixel sample;
//! the text-likelihood check looks at every pixel. A statistic that cannot
//! be computed is left as `None` and its failure is recorded in
//! `partial_errors`.

use image::{DynamicImage, GenericImageView, RgbImage};
use rand::Rng;
use rand::seq::index;
use serde::Serialize;
use tracing::warn;

use crate::error::AnalysisError;

use super::ImageHeuristics;

/// ITU-R BT.601 luma weights
const GRAY_WEIGHTS: [f64; 3] = [0.2989, 0.5870, 0.1140];

/// Pixel layout of the source image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    Grayscale,
    Rgb,
    RgbAlpha,
    Unknown,
}

impl ColorMode {
    pub fn of(image: &DynamicImage) -> Self {
        match image {
            DynamicImage::ImageLuma8(_)
            | DynamicImage::ImageLumaA8(_)
            | DynamicImage::ImageLuma16(_)
            | DynamicImage::ImageLumaA16(_) => ColorMode::Grayscale,
            DynamicImage::ImageRgb8(_)
            | DynamicImage::ImageRgb16(_)
            | DynamicImage::ImageRgb32F(_) => ColorMode::Rgb,
            DynamicImage::ImageRgba8(_)
            | DynamicImage::ImageRgba16(_)
            | DynamicImage::ImageRgba32F(_) => ColorMode::RgbAlpha,
            _ => ColorMode::Unknown,
        }
    }

    fn color_type(self) -> DominantColorType {
        match self {
            ColorMode::Grayscale => DominantColorType::Grayscale,
            ColorMode::Rgb => DominantColorType::Color,
            ColorMode::RgbAlpha => DominantColorType::ColorWithAlpha,
            ColorMode::Unknown => DominantColorType::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DominantColorType {
    Color,
    ColorWithAlpha,
    Grayscale,
    Unknown,
}

/// Coarse hue bucket: the channel that is brightest in most sampled pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DominantHue {
    Red,
    Green,
    Blue,
    Mixed,
    Grayscale,
    Unknown,
}

impl DominantHue {
    pub fn as_str(self) -> &'static str {
        match self {
            DominantHue::Red => "red",
            DominantHue::Green => "green",
            DominantHue::Blue => "blue",
            DominantHue::Mixed => "mixed",
            DominantHue::Grayscale => "grayscale",
            DominantHue::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Descriptive statistics for one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageStats {
    pub dimensions: Dimensions,
    /// Decoder format name (e.g. `png`), when the image came from a file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    pub color_mode: ColorMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size_kb: Option<f64>,
    pub aspect_ratio: f64,
    pub is_likely_text: Option<bool>,
    pub dominant_color_type: DominantColorType,
    /// One value for grayscale images, three for color
    pub average_color_rgb: Option<Vec<u8>>,
    pub is_colorful: Option<bool>,
    pub brightness: Option<f64>,
    pub is_bright: Option<bool>,
    pub is_dark: Option<bool>,
    pub dominant_hue: DominantHue,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub partial_errors: Vec<String>,
}

impl ImageStats {
    fn empty(width: u32, height: u32, mode: ColorMode) -> Self {
        Self {
            dimensions: Dimensions { width, height },
            format: None,
            color_mode: mode,
            file_size_bytes: None,
            file_size_kb: None,
            aspect_ratio: round_to(width as f64 / height as f64, 2),
            is_likely_text: None,
            dominant_color_type: mode.color_type(),
            average_color_rgb: None,
            is_colorful: None,
            brightness: None,
            is_bright: None,
            is_dark: None,
            dominant_hue: DominantHue::Unknown,
            partial_errors: Vec::new(),
        }
    }

    /// Attach file-level details once the image is known to come from disk.
    pub fn with_source(mut self, format: Option<String>, file_size_bytes: Option<u64>) -> Self {
        self.format = format;
        self.file_size_bytes = file_size_bytes;
        self.file_size_kb = file_size_bytes.map(|bytes| round_to(bytes as f64 / 1024.0, 2));
        self
    }

    fn record(&mut self, error: AnalysisError) {
        warn!(error = %error, "Image statistic unavailable");
        self.partial_errors.push(error.to_string());
    }
}

/// Compute statistics using the thread-local RNG for pixel sampling.
pub fn compute_stats(
    image: &DynamicImage,
    heuristics: &ImageHeuristics,
) -> Result<ImageStats, AnalysisError> {
    compute_stats_with_rng(image, heuristics, &mut rand::thread_rng())
}

pub fn compute_stats_with_rng<R: Rng + ?Sized>(
    image: &DynamicImage,
    heuristics: &ImageHeuristics,
    rng: &mut R,
) -> Result<ImageStats, AnalysisError> {
    let (width, height) = image.dimensions();
    if heuristics.too_small_for_analysis(width, height) {
        return Err(AnalysisError::ImageTooSmall { width, height });
    }

    let mode = ColorMode::of(image);
    let mut stats = ImageStats::empty(width, height, mode);

    let (summary, gray) = if mode == ColorMode::Grayscale {
        let luma = image.to_luma8();
        let gray = mean_std(luma.as_raw().iter().map(|&v| v as f64));
        (ColorSummary::from_gray(gray), gray)
    } else {
        let rgb = image.to_rgb8();
        let summary = sample_colors(&rgb, heuristics.sample_size, rng);
        let gray = mean_std(rgb.as_raw().chunks_exact(3).map(|px| {
            GRAY_WEIGHTS[0] * px[0] as f64
                + GRAY_WEIGHTS[1] * px[1] as f64
                + GRAY_WEIGHTS[2] * px[2] as f64
        }));
        (summary, gray)
    };

    match summary
        .average
        .iter()
        .map(|&c| finite("average color", c))
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(average) => {
            stats.average_color_rgb = Some(average.into_iter().map(|c| c as u8).collect());
        }
        Err(e) => stats.record(e),
    }

    match finite("brightness", summary.brightness) {
        Ok(brightness) => {
            stats.brightness = Some(round_to(brightness, 1));
            stats.is_bright = Some(brightness > heuristics.bright_threshold);
            stats.is_dark = Some(brightness < heuristics.dark_threshold);
        }
        Err(e) => stats.record(e),
    }

    match summary.channel_spread {
        None => stats.is_colorful = Some(false),
        Some(spread) => match finite("colorfulness", spread) {
            Ok(spread) => stats.is_colorful = Some(spread > heuristics.colorful_std_threshold),
            Err(e) => stats.record(e),
        },
    }

    stats.dominant_hue = match mode {
        ColorMode::Grayscale => DominantHue::Grayscale,
        ColorMode::Unknown => DominantHue::Unknown,
        ColorMode::Rgb | ColorMode::RgbAlpha => match summary.channel_wins {
            Some(fractions) if fractions.iter().all(|f| f.is_finite()) => {
                dominant_hue(fractions, heuristics.hue_dominance_fraction)
            }
            _ => {
                stats.record(AnalysisError::StatComputationPartial {
                    statistic: "dominant hue",
                    message: "no pixels sampled".to_string(),
                });
                DominantHue::Unknown
            }
        },
    };

    let (gray_mean, gray_std) = gray;
    match (finite("gray mean", gray_mean), finite("gray contrast", gray_std)) {
        (Ok(mean), Ok(std)) => {
            stats.is_likely_text = Some(
                std > heuristics.text_contrast_threshold
                    && mean < heuristics.text_darkness_threshold,
            );
        }
        (Err(e), _) | (_, Err(e)) => stats.record(e),
    }

    Ok(stats)
}

struct ColorSummary {
    average: Vec<f64>,
    brightness: f64,
    /// Mean per-channel standard deviation; not meaningful for grayscale
    channel_spread: Option<f64>,
    /// Fraction of sampled pixels each of R, G, B is the strongest channel in
    channel_wins: Option<[f64; 3]>,
}

impl ColorSummary {
    fn from_gray((mean, _): (f64, f64)) -> Self {
        Self {
            average: vec![mean],
            brightness: mean,
            channel_spread: None,
            channel_wins: None,
        }
    }
}

fn sample_colors<R: Rng + ?Sized>(rgb: &RgbImage, sample_size: usize, rng: &mut R) -> ColorSummary {
    let pixels = rgb.as_raw();
    let total = pixels.len() / 3;
    let amount = sample_size.min(total);

    let mut sum = [0.0f64; 3];
    let mut sum_sq = [0.0f64; 3];
    let mut wins = [0usize; 3];

    for i in index::sample(rng, total, amount).iter() {
        let px = &pixels[i * 3..i * 3 + 3];
        for c in 0..3 {
            let v = px[c] as f64;
            sum[c] += v;
            sum_sq[c] += v * v;
        }
        wins[strongest_channel(px)] += 1;
    }

    let n = amount as f64;
    let mean = sum.map(|s| s / n);
    let std: [f64; 3] = std::array::from_fn(|c| variance(sum_sq[c] / n, mean[c]).sqrt());

    ColorSummary {
        average: mean.to_vec(),
        brightness: mean.iter().sum::<f64>() / 3.0,
        channel_spread: Some(std.iter().sum::<f64>() / 3.0),
        channel_wins: Some(wins.map(|w| w as f64 / n)),
    }
}

/// Index of the largest channel; ties go to the earlier channel.
fn strongest_channel(px: &[u8]) -> usize {
    let mut best = 0;
    for c in 1..px.len() {
        if px[c] > px[best] {
            best = c;
        }
    }
    best
}

fn dominant_hue(fractions: [f64; 3], threshold: f64) -> DominantHue {
    if fractions[0] > threshold {
        DominantHue::Red
    } else if fractions[1] > threshold {
        DominantHue::Green
    } else if fractions[2] > threshold {
        DominantHue::Blue
    } else {
        DominantHue::Mixed
    }
}

/// Population mean and standard deviation. NaN for an empty input.
fn mean_std(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (mut n, mut sum, mut sum_sq) = (0usize, 0.0f64, 0.0f64);
    for v in values {
        n += 1;
        sum += v;
        sum_sq += v * v;
    }
    let n = n as f64;
    let mean = sum / n;
    (mean, variance(sum_sq / n, mean).sqrt())
}

/// `E[x^2] - E[x]^2`, clamped at zero against rounding. NaN stays NaN.
fn variance(mean_sq: f64, mean: f64) -> f64 {
    let v = mean_sq - mean * mean;
    if v < 0.0 { 0.0 } else { v }
}

fn finite(statistic: &'static str, value: f64) -> Result<f64, AnalysisError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(AnalysisError::StatComputationPartial {
            statistic,
            message: format!("non-finite result ({})", value),
        })
    }
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
