//! Image preprocessing for OCR models
//!
//! Handles image resizing, normalization, and tensor conversion for PaddleOCR models.

use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array4;

use crate::extraction::Region;

/// ImageNet statistics used by the detection model
const DET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const DET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// The recognition model expects (pixel / 255.0 - 0.5) / 0.5, mapping [0, 255] to [-1, 1]
const REC_MEAN: [f32; 3] = [0.5, 0.5, 0.5];
const REC_STD: [f32; 3] = [0.5, 0.5, 0.5];

/// Detection input sides must be multiples of this
const DET_STRIDE: u32 = 32;

/// Narrowest crop handed to the recognizer
const REC_MIN_WIDTH: u32 = 16;

/// Preprocessing configuration
#[derive(Debug, Clone)]
pub struct PreprocessConfig {
    /// Longest side of the detection input (larger images are scaled down)
    pub det_max_side: u32,
    /// Target height for recognition model
    pub rec_target_height: u32,
    /// Maximum width for recognition
    pub rec_max_width: u32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            det_max_side: 960,
            rec_target_height: 48,
            rec_max_width: 640,
        }
    }
}

/// Detection tensor plus the factors mapping it back to the source image
#[derive(Debug, Clone)]
pub struct DetectionInput {
    /// NCHW tensor, batch size 1
    pub tensor: Array4<f32>,
    /// Source width / tensor width
    pub scale_x: f32,
    /// Source height / tensor height
    pub scale_y: f32,
}

/// Compute the detection input size: fit within `max_side`, round to the stride
pub fn detection_size(width: u32, height: u32, max_side: u32) -> (u32, u32) {
    let longest = width.max(height).max(1) as f32;
    let scale = if max_side > 0 && longest > max_side as f32 {
        max_side as f32 / longest
    } else {
        1.0
    };

    let round = |side: u32| -> u32 {
        let scaled = (side as f32 * scale).round() as u32;
        let stepped = ((scaled + DET_STRIDE / 2) / DET_STRIDE) * DET_STRIDE;
        stepped.max(DET_STRIDE)
    };

    (round(width), round(height))
}

/// Convert an RGB image to a normalized NCHW tensor (batch size 1)
pub fn image_to_nchw(image: &RgbImage, mean: &[f32; 3], std: &[f32; 3]) -> Array4<f32> {
    let (w, h) = image.dimensions();
    let mut tensor = Array4::<f32>::zeros((1, 3, h as usize, w as usize));

    for (x, y, pixel) in image.enumerate_pixels() {
        for c in 0..3 {
            let value = pixel.0[c] as f32 / 255.0;
            tensor[[0, c, y as usize, x as usize]] = (value - mean[c]) / std[c];
        }
    }

    tensor
}

/// Full preprocessing pipeline for detection
pub fn preprocess_for_detection(image: &RgbImage, config: &PreprocessConfig) -> DetectionInput {
    let (width, height) = image.dimensions();
    let (det_w, det_h) = detection_size(width, height, config.det_max_side);

    let tensor = if (det_w, det_h) == (width, height) {
        image_to_nchw(image, &DET_MEAN, &DET_STD)
    } else {
        let resized = image::imageops::resize(image, det_w, det_h, FilterType::Triangle);
        image_to_nchw(&resized, &DET_MEAN, &DET_STD)
    };

    DetectionInput {
        tensor,
        scale_x: width as f32 / det_w as f32,
        scale_y: height as f32 / det_h as f32,
    }
}

/// Width of a recognition crop after scaling it to the target height
pub fn recognition_width(width: u32, height: u32, config: &PreprocessConfig) -> u32 {
    let ratio = width as f32 / height.max(1) as f32;
    let scaled = (config.rec_target_height as f32 * ratio).ceil() as u32;
    scaled.clamp(REC_MIN_WIDTH, config.rec_max_width.max(REC_MIN_WIDTH))
}

/// Full preprocessing pipeline for recognition
pub fn preprocess_for_recognition(crop: &RgbImage, config: &PreprocessConfig) -> Array4<f32> {
    let (width, height) = crop.dimensions();
    let target_w = recognition_width(width, height, config);
    let resized = image::imageops::resize(crop, target_w, config.rec_target_height, FilterType::Triangle);
    image_to_nchw(&resized, &REC_MEAN, &REC_STD)
}

/// Crop the axis-aligned bounds of a region, clamped to the image
pub fn crop_region(image: &RgbImage, region: &Region) -> Option<RgbImage> {
    let (img_w, img_h) = image.dimensions();
    let (x, y, w, h) = region.bounds();

    let x = x.min(img_w);
    let y = y.min(img_h);
    let w = w.min(img_w - x);
    let h = h.min(img_h - y);

    if w == 0 || h == 0 {
        return None;
    }

    Some(image::imageops::crop_imm(image, x, y, w, h).to_image())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_detection_size_rounds_to_stride() {
        assert_eq!(detection_size(100, 50, 960), (96, 64));
        assert_eq!(detection_size(10, 10, 960), (32, 32));
    }

    #[test]
    fn test_detection_size_scales_down_large_images() {
        let (w, h) = detection_size(1920, 960, 960);
        assert_eq!((w, h), (960, 480));
        assert_eq!(w % 32, 0);
        assert_eq!(h % 32, 0);
    }

    #[test]
    fn test_image_to_nchw_layout() {
        let mut image = RgbImage::new(4, 2);
        image.put_pixel(3, 1, Rgb([255, 0, 127]));

        let tensor = image_to_nchw(&image, &[0.0; 3], &[1.0; 3]);
        assert_eq!(tensor.dim(), (1, 3, 2, 4));
        assert!((tensor[[0, 0, 1, 3]] - 1.0).abs() < 1e-6);
        assert_eq!(tensor[[0, 1, 1, 3]], 0.0);
        assert!((tensor[[0, 2, 1, 3]] - 127.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_recognition_normalization_range() {
        let white = RgbImage::from_pixel(96, 48, Rgb([255, 255, 255]));
        let tensor = preprocess_for_recognition(&white, &PreprocessConfig::default());
        assert_eq!(tensor.dim(), (1, 3, 48, 96));
        assert!(tensor.iter().all(|&v| (v - 1.0).abs() < 1e-5));

        let black = RgbImage::new(96, 48);
        let tensor = preprocess_for_recognition(&black, &PreprocessConfig::default());
        assert!(tensor.iter().all(|&v| (v + 1.0).abs() < 1e-5));
    }

    #[test]
    fn test_detection_scale_factors() {
        let image = RgbImage::new(100, 50);
        let input = preprocess_for_detection(&image, &PreprocessConfig::default());
        assert_eq!(input.tensor.dim(), (1, 3, 64, 96));
        assert!((input.scale_x - 100.0 / 96.0).abs() < 1e-6);
        assert!((input.scale_y - 50.0 / 64.0).abs() < 1e-6);
    }

    #[test]
    fn test_recognition_width_clamped() {
        let config = PreprocessConfig::default();
        assert_eq!(recognition_width(200, 25, &config), 384);
        assert_eq!(recognition_width(5000, 48, &config), 640);
        assert_eq!(recognition_width(2, 48, &config), 16);
    }

    #[test]
    fn test_crop_region_clamps_to_image() {
        let image = RgbImage::from_pixel(50, 40, Rgb([1, 2, 3]));

        let crop = crop_region(&image, &Region::from_rect(40.0, 30.0, 30.0, 30.0)).unwrap();
        assert_eq!(crop.dimensions(), (10, 10));

        assert!(crop_region(&image, &Region::from_rect(60.0, 0.0, 10.0, 10.0)).is_none());
    }
}
