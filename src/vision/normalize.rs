//! Label image normalization
//!
//! Produces the upright, size-limited image shown next to the original upload.
//! Orientation is fixed in two steps: the EXIF tag (phones often store labels
//! sideways) and a projection-profile check that turns the image a quarter
//! when the printed lines run vertically.

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageDecoder, ImageReader, RgbImage};
use std::io::Cursor;
use tracing::debug;

use crate::config::PreprocessSettings;

/// Side length the orientation check works at
const ANALYSIS_SIZE: u32 = 400;

/// Dominant direction of printed text lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextDirection {
    /// Lines run left to right (upright or upside down)
    Horizontal,
    /// Lines run top to bottom (image is lying on its side)
    Vertical,
}

/// A decoded, upright, size-limited label image
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    /// RGB pixels
    pub image: RgbImage,
    /// Whether the EXIF orientation changed the image
    pub exif_corrected: bool,
    /// Whether the text-direction check rotated the image
    pub auto_rotated: bool,
    /// Size of the decoded image before any change
    pub source_size: (u32, u32),
}

impl NormalizedImage {
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Decode raw bytes, honouring the EXIF orientation when asked to
pub fn decode_image(bytes: &[u8], apply_exif: bool) -> Result<(DynamicImage, bool)> {
    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .context("Failed to read image header")?
        .into_decoder()
        .context("Unsupported or corrupted image")?;

    let orientation = if apply_exif {
        decoder.orientation().ok()
    } else {
        None
    };

    let mut image = DynamicImage::from_decoder(decoder).context("Failed to decode image")?;

    let corrected = match orientation {
        Some(orientation) if orientation != image::metadata::Orientation::NoTransforms => {
            debug!("Applying EXIF orientation {:?}", orientation);
            image.apply_orientation(orientation);
            true
        }
        _ => false,
    };

    Ok((image, corrected))
}

/// Decode, auto-rotate and resize an uploaded label for display
pub fn preprocess_image(bytes: &[u8], settings: &PreprocessSettings) -> Result<NormalizedImage> {
    let (mut image, exif_corrected) = decode_image(bytes, settings.apply_exif_orientation)?;
    let source_size = (image.width(), image.height());

    let mut auto_rotated = false;
    if settings.auto_rotate {
        let direction = estimate_text_direction(&image.to_luma8(), settings.rotation_ratio);
        if direction == TextDirection::Vertical {
            debug!("Text runs vertically, rotating label 90 degrees clockwise");
            image = image.rotate90();
            auto_rotated = true;
        }
    }

    let image = limit_size(image, settings.max_side).to_rgb8();

    debug!(
        "Normalized label {}x{} -> {}x{} (exif: {}, rotated: {})",
        source_size.0,
        source_size.1,
        image.width(),
        image.height(),
        exif_corrected,
        auto_rotated
    );

    Ok(NormalizedImage {
        image,
        exif_corrected,
        auto_rotated,
        source_size,
    })
}

/// Scale down (never up) so the longest side fits within `max_side`
pub fn limit_size(image: DynamicImage, max_side: u32) -> DynamicImage {
    if max_side == 0 || image.width().max(image.height()) <= max_side {
        return image;
    }
    image.resize(max_side, max_side, FilterType::Lanczos3)
}

/// Estimate the direction of the text lines from ink projection profiles.
///
/// Horizontal lines of text make the row profile alternate between ink and
/// gaps while every column crosses roughly the same amount of ink. The
/// profile with the larger coefficient of variation wins; `ratio` is how much
/// larger the column score must be before the text counts as vertical.
pub fn estimate_text_direction(gray: &GrayImage, ratio: f32) -> TextDirection {
    let (width, height) = gray.dimensions();
    if width < 2 || height < 2 {
        return TextDirection::Horizontal;
    }

    let scale = (ANALYSIS_SIZE as f32 / width.max(height) as f32).min(1.0);
    let small = if scale < 1.0 {
        let w = ((width as f32 * scale) as u32).max(2);
        let h = ((height as f32 * scale) as u32).max(2);
        image::imageops::resize(gray, w, h, FilterType::Triangle)
    } else {
        gray.clone()
    };

    let level = imageproc::contrast::otsu_level(&small);
    let total = (small.width() * small.height()) as usize;
    let dark = small.pixels().filter(|p| p.0[0] <= level).count();

    // Ink is the minority class: dark text on light paper, or the reverse
    let ink_is_dark = dark * 2 <= total;

    let (w, h) = small.dimensions();
    let mut rows = vec![0u32; h as usize];
    let mut cols = vec![0u32; w as usize];
    for (x, y, pixel) in small.enumerate_pixels() {
        let is_ink = (pixel.0[0] <= level) == ink_is_dark;
        if is_ink {
            rows[y as usize] += 1;
            cols[x as usize] += 1;
        }
    }

    let row_score = coefficient_of_variation(&rows);
    let col_score = coefficient_of_variation(&cols);

    debug!(
        "Text direction profile scores: rows={:.3}, cols={:.3}",
        row_score, col_score
    );

    if col_score > row_score * ratio && col_score > 0.0 {
        TextDirection::Vertical
    } else {
        TextDirection::Horizontal
    }
}

fn coefficient_of_variation(values: &[u32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f32;
    let mean = values.iter().map(|&v| v as f32).sum::<f32>() / n;
    if mean <= f32::EPSILON {
        return 0.0;
    }
    let variance = values
        .iter()
        .map(|&v| {
            let d = v as f32 - mean;
            d * d
        })
        .sum::<f32>()
        / n;
    variance.sqrt() / mean
}
