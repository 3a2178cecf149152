//! Natural-language summary of an analyzed image.

use super::stats::{DominantHue, ImageStats};

const WIDE_ASPECT_RATIO: f64 = 2.0;
const TALL_ASPECT_RATIO: f64 = 0.6;
const OCR_PREVIEW_CHARS: usize = 200;

const FALLBACK: &str = "Image analysis completed. This appears to be a visual image with the \
                        dimensions and color characteristics described above.";

/// Fold statistics, OCR text and a caption into one paragraph.
///
/// Clauses appear in a fixed order: orientation, hue, colorfulness,
/// brightness, text-likelihood, OCR preview, caption. Each is emitted only
/// when its input is present.
pub fn describe(stats: Option<&ImageStats>, ocr_text: Option<&str>, caption: Option<&str>) -> String {
    let mut clauses: Vec<String> = Vec::new();

    if let Some(stats) = stats {
        stats_clauses(stats, &mut clauses);
    }

    if let Some(text) = ocr_text.filter(|t| !t.is_empty()) {
        clauses.push(format!(
            "The image contains the following text: \"{}\"",
            preview(text)
        ));
    }

    if let Some(caption) = caption.filter(|c| !c.is_empty()) {
        clauses.push(format!("Content description: {}", caption));
    }

    if clauses.is_empty() {
        return FALLBACK.to_string();
    }

    let mut description = clauses.join(". ");
    if !description.ends_with('.') {
        description.push('.');
    }
    description
}

fn stats_clauses(stats: &ImageStats, clauses: &mut Vec<String>) {
    let orientation = if stats.aspect_ratio > WIDE_ASPECT_RATIO {
        "wide, panoramic"
    } else if stats.aspect_ratio < TALL_ASPECT_RATIO {
        "tall, portrait-oriented"
    } else {
        "standard"
    };
    clauses.push(format!(
        "This is a {} image ({}x{} pixels)",
        orientation, stats.dimensions.width, stats.dimensions.height
    ));

    match stats.dominant_hue {
        DominantHue::Unknown => {}
        DominantHue::Grayscale => clauses.push("The image is grayscale".to_string()),
        DominantHue::Mixed => clauses.push("The image has a mixed color palette".to_string()),
        hue => clauses.push(format!(
            "The image has a {}-dominant color palette",
            hue.as_str()
        )),
    }

    match stats.is_colorful {
        Some(true) => clauses.push("The image is colorful with varied hues".to_string()),
        Some(false) => clauses
            .push("The image has a more monochromatic or muted color scheme".to_string()),
        None => {}
    }

    if let Some(brightness) = stats.brightness {
        if stats.is_bright == Some(true) {
            clauses.push("The image is bright and well-lit".to_string());
        } else if stats.is_dark == Some(true) {
            clauses.push("The image is dark or dimly lit".to_string());
        } else {
            clauses.push(format!(
                "The image has moderate brightness (average: {:.0}/255)",
                brightness
            ));
        }
    }

    match stats.is_likely_text {
        Some(true) => {
            clauses.push("The image appears to contain primarily text content".to_string())
        }
        Some(false) => clauses.push(
            "The image appears to be a visual/graphical element rather than text-based"
                .to_string(),
        ),
        None => {}
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() > OCR_PREVIEW_CHARS {
        let mut preview: String = text.chars().take(OCR_PREVIEW_CHARS).collect();
        preview.push_str("...");
        preview
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{ImageHeuristics, compute_stats};
    use image::{DynamicImage, Rgb, RgbImage};

    fn stats_for(width: u32, height: u32, color: [u8; 3]) -> ImageStats {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)));
        compute_stats(&image, &ImageHeuristics::default()).unwrap()
    }

    #[test]
    fn test_wide_image_orientation() {
        let stats = stats_for(1600, 400, [120, 120, 120]);
        let description = describe(Some(&stats), None, None);
        assert!(
            description.starts_with("This is a wide, panoramic image (1600x400 pixels)"),
            "{}",
            description
        );
    }

    #[test]
    fn test_tall_image_orientation() {
        let stats = stats_for(400, 1600, [120, 120, 120]);
        let description = describe(Some(&stats), None, None);
        assert!(description.starts_with("This is a tall, portrait-oriented image (400x1600 pixels)"));
    }

    #[test]
    fn test_long_ocr_text_is_truncated() {
        let text: String = "abcdefghij".repeat(25);
        assert_eq!(text.len(), 250);

        let description = describe(None, Some(&text), None);
        let expected = format!(
            "The image contains the following text: \"{}...\".",
            &text[..200]
        );
        assert_eq!(description, expected);
    }

    #[test]
    fn test_short_ocr_text_is_verbatim() {
        let description = describe(None, Some("EXIT"), None);
        assert_eq!(description, "The image contains the following text: \"EXIT\".");
    }

    #[test]
    fn test_stats_only_clauses() {
        let stats = stats_for(100, 100, [40, 40, 200]);
        let description = describe(Some(&stats), Some(""), None);
        assert_eq!(
            description,
            "This is a standard image (100x100 pixels). \
             The image has a blue-dominant color palette. \
             The image has a more monochromatic or muted color scheme. \
             The image has moderate brightness (average: 93/255). \
             The image appears to be a visual/graphical element rather than text-based."
        );
    }

    #[test]
    fn test_caption_clause_is_last() {
        let stats = stats_for(100, 100, [250, 250, 250]);
        let description = describe(Some(&stats), None, Some("A blank sheet of paper"));
        assert!(description.contains("The image is bright and well-lit"));
        assert!(description.ends_with("Content description: A blank sheet of paper."));
    }

    #[test]
    fn test_empty_caption_adds_nothing() {
        let stats = stats_for(100, 100, [250, 250, 250]);
        let with_empty = describe(Some(&stats), None, Some(""));
        let without = describe(Some(&stats), None, None);
        assert_eq!(with_empty, without);
        assert!(!with_empty.contains("Content description"));
    }

    #[test]
    fn test_fallback_when_nothing_known() {
        assert_eq!(describe(None, None, None), FALLBACK);
    }

    #[test]
    fn test_unknown_hue_skips_hue_clause() {
        let mut stats = stats_for(100, 100, [250, 10, 10]);
        stats.dominant_hue = DominantHue::Unknown;
        let description = describe(Some(&stats), None, None);
        assert!(!description.contains("palette"));
        assert!(!description.contains("grayscale"));
    }

    #[test]
    fn test_absent_stats_are_skipped() {
        let mut stats = stats_for(100, 100, [250, 10, 10]);
        stats.brightness = None;
        stats.is_colorful = None;
        stats.is_likely_text = None;
        let description = describe(Some(&stats), None, None);
        assert_eq!(
            description,
            "This is a standard image (100x100 pixels). The image has a red-dominant color palette."
        );
    }
}
