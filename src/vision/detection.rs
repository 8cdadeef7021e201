//! Text region detection
//!
//! Turns the DB (Differentiable Binarization) probability map produced by the
//! detection model into text boxes in source image coordinates.

use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use ndarray::ArrayView2;
use tracing::debug;

use crate::config::OcrSettings;
use crate::extraction::Region;

/// Boxes whose centres are closer than this (in pixels) share a text line
const LINE_TOLERANCE: f32 = 10.0;

/// A detected text box with its mean text probability
#[derive(Debug, Clone, PartialEq)]
pub struct TextBox {
    pub region: Region,
    pub score: f32,
}

impl TextBox {
    fn top_left(&self) -> (f32, f32) {
        self.region.points[0]
    }
}

/// DB post-processing parameters
#[derive(Debug, Clone)]
pub struct DbPostProcess {
    /// Probability above which a pixel counts as text
    pub det_threshold: f32,
    /// Minimum mean probability for a box to be kept
    pub box_threshold: f32,
    /// How far boxes are expanded after scoring
    pub unclip_ratio: f32,
    /// Boxes with a shorter side are noise
    pub min_size: f32,
    /// Upper bound on contours examined per image
    pub max_candidates: usize,
}

impl Default for DbPostProcess {
    fn default() -> Self {
        Self::from_settings(&OcrSettings::default())
    }
}

impl DbPostProcess {
    pub fn from_settings(settings: &OcrSettings) -> Self {
        Self {
            det_threshold: settings.det_threshold,
            box_threshold: settings.box_threshold,
            unclip_ratio: settings.unclip_ratio,
            min_size: 3.0,
            max_candidates: 1000,
        }
    }

    /// Extract boxes from a probability map.
    ///
    /// `scale_x`/`scale_y` map probability-map pixels to source pixels and
    /// `source_size` clamps the result. Boxes come back in reading order.
    pub fn boxes(
        &self,
        prob: ArrayView2<f32>,
        scale_x: f32,
        scale_y: f32,
        source_size: (u32, u32),
    ) -> Vec<TextBox> {
        let (height, width) = prob.dim();
        if height == 0 || width == 0 {
            return Vec::new();
        }

        let mask = GrayImage::from_fn(width as u32, height as u32, |x, y| {
            if prob[[y as usize, x as usize]] > self.det_threshold {
                Luma([255])
            } else {
                Luma([0])
            }
        });

        let contours = find_contours::<u32>(&mask);
        let (src_w, src_h) = (source_size.0 as f32, source_size.1 as f32);
        let mut boxes = Vec::new();

        for contour in contours
            .iter()
            .filter(|c| c.border_type == BorderType::Outer)
            .take(self.max_candidates)
        {
            let Some((min_x, min_y, max_x, max_y)) = point_bounds(&contour.points) else {
                continue;
            };

            let w = (max_x - min_x + 1) as f32;
            let h = (max_y - min_y + 1) as f32;
            if w.min(h) < self.min_size {
                continue;
            }

            let score = box_score(&prob, min_x, min_y, max_x, max_y);
            if score < self.box_threshold {
                continue;
            }

            let (x, y, w, h) = unclip(min_x as f32, min_y as f32, w, h, self.unclip_ratio);
            if w.min(h) < self.min_size + 2.0 {
                continue;
            }

            let x0 = (x * scale_x).clamp(0.0, src_w);
            let y0 = (y * scale_y).clamp(0.0, src_h);
            let x1 = ((x + w) * scale_x).clamp(0.0, src_w);
            let y1 = ((y + h) * scale_y).clamp(0.0, src_h);

            boxes.push(TextBox {
                region: Region::from_rect(x0, y0, x1 - x0, y1 - y0),
                score,
            });
        }

        sort_reading_order(&mut boxes);
        debug!("DB post-processing kept {} boxes", boxes.len());
        boxes
    }
}

fn point_bounds(points: &[imageproc::point::Point<u32>]) -> Option<(u32, u32, u32, u32)> {
    let first = points.first()?;
    let init = (first.x, first.y, first.x, first.y);
    Some(points.iter().fold(init, |(x0, y0, x1, y1), p| {
        (x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y))
    }))
}

/// Mean probability inside an inclusive pixel rectangle
fn box_score(prob: &ArrayView2<f32>, min_x: u32, min_y: u32, max_x: u32, max_y: u32) -> f32 {
    let mut sum = 0.0f32;
    let mut count = 0usize;
    for y in min_y..=max_y {
        for x in min_x..=max_x {
            if let Some(&p) = prob.get([y as usize, x as usize]) {
                sum += p;
                count += 1;
            }
        }
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f32
    }
}

/// Grow a rectangle on every side by area * ratio / perimeter
fn unclip(x: f32, y: f32, w: f32, h: f32, ratio: f32) -> (f32, f32, f32, f32) {
    let perimeter = 2.0 * (w + h);
    if perimeter <= f32::EPSILON {
        return (x, y, w, h);
    }
    let distance = w * h * ratio / perimeter;
    (x - distance, y - distance, w + 2.0 * distance, h + 2.0 * distance)
}

/// Sort top-to-bottom, then left-to-right within a line
pub fn sort_reading_order(boxes: &mut [TextBox]) {
    boxes.sort_by(|a, b| {
        let (ax, ay) = a.top_left();
        let (bx, by) = b.top_left();
        ay.total_cmp(&by).then(ax.total_cmp(&bx))
    });

    // Boxes on the same line may start a few pixels apart vertically
    for i in 0..boxes.len().saturating_sub(1) {
        for j in (0..=i).rev() {
            let (x_next, y_next) = boxes[j + 1].top_left();
            let (x_cur, y_cur) = boxes[j].top_left();
            if (y_next - y_cur).abs() < LINE_TOLERANCE && x_next < x_cur {
                boxes.swap(j, j + 1);
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn fill(prob: &mut Array2<f32>, x: usize, y: usize, w: usize, h: usize, value: f32) {
        for row in y..y + h {
            for col in x..x + w {
                prob[[row, col]] = value;
            }
        }
    }

    fn text_box(x: f32, y: f32) -> TextBox {
        TextBox {
            region: Region::from_rect(x, y, 10.0, 5.0),
            score: 1.0,
        }
    }

    #[test]
    fn test_empty_map_has_no_boxes() {
        let prob = Array2::<f32>::zeros((64, 64));
        assert!(DbPostProcess::default().boxes(prob.view(), 1.0, 1.0, (64, 64)).is_empty());
    }

    #[test]
    fn test_single_block_detected_and_unclipped() {
        let mut prob = Array2::<f32>::zeros((64, 128));
        fill(&mut prob, 10, 20, 40, 10, 0.9);

        let boxes = DbPostProcess::default().boxes(prob.view(), 1.0, 1.0, (128, 64));
        assert_eq!(boxes.len(), 1);
        assert!((boxes[0].score - 0.9).abs() < 1e-4);

        // 40x10 grows by 40 * 10 * 1.5 / 100 = 6 px on each side
        let (x, y, w, h) = boxes[0].region.bounds();
        assert_eq!((x, y, w, h), (4, 14, 52, 22));
    }

    #[test]
    fn test_scale_maps_to_source_and_clamps() {
        let mut prob = Array2::<f32>::zeros((32, 32));
        fill(&mut prob, 2, 2, 20, 8, 0.95);

        let boxes = DbPostProcess::default().boxes(prob.view(), 2.0, 2.0, (64, 64));
        assert_eq!(boxes.len(), 1);
        let (x, y, _, _) = boxes[0].region.bounds();
        assert_eq!((x, y), (0, 0));
        assert!(boxes[0].region.points[2].0 <= 64.0);
    }

    #[test]
    fn test_low_score_and_tiny_boxes_dropped() {
        let mut prob = Array2::<f32>::zeros((64, 64));
        // Above the pixel threshold but below the box threshold
        fill(&mut prob, 5, 5, 30, 10, 0.4);
        // Too thin to be text
        fill(&mut prob, 5, 40, 30, 2, 0.99);

        assert!(DbPostProcess::default().boxes(prob.view(), 1.0, 1.0, (64, 64)).is_empty());
    }

    #[test]
    fn test_boxes_in_reading_order() {
        let mut prob = Array2::<f32>::zeros((100, 200));
        fill(&mut prob, 120, 60, 40, 10, 0.9);
        fill(&mut prob, 10, 62, 40, 10, 0.9);
        fill(&mut prob, 60, 10, 40, 10, 0.9);

        let boxes = DbPostProcess::default().boxes(prob.view(), 1.0, 1.0, (200, 100));
        let origins: Vec<u32> = boxes.iter().map(|b| b.region.bounds().0).collect();
        assert_eq!(origins, vec![54, 4, 114]);
    }

    #[test]
    fn test_sort_same_line_left_to_right() {
        let mut boxes = vec![text_box(50.0, 12.0), text_box(5.0, 15.0), text_box(0.0, 40.0)];
        sort_reading_order(&mut boxes);
        let xs: Vec<f32> = boxes.iter().map(|b| b.top_left().0).collect();
        assert_eq!(xs, vec![5.0, 50.0, 0.0]);
    }

    #[test]
    fn test_unclip_zero_area() {
        assert_eq!(unclip(1.0, 2.0, 0.0, 0.0, 1.5), (1.0, 2.0, 0.0, 0.0));
    }
}
