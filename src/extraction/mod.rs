//! Target-line extraction
//!
//! Finds the OCR line that carries the `_1_` marker on a shipping label.
//! This is the only decision logic the application owns; everything that
//! produces the detections lives in [`crate::vision`].

pub mod report;

pub use report::{LabelReport, ReportStatus};

use serde::{Deserialize, Serialize};

/// Marker literal identifying the line of interest
pub const MARKER: &str = "_1_";

/// Quadrilateral bounding region of a detection (source image pixels)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Corner points, clockwise from top-left
    pub points: [(f32, f32); 4],
}

impl Region {
    /// Build an axis-aligned region from a rectangle
    pub fn from_rect(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            points: [
                (x, y),
                (x + width, y),
                (x + width, y + height),
                (x, y + height),
            ],
        }
    }

    /// Axis-aligned bounding box as (x, y, width, height)
    pub fn bounds(&self) -> (u32, u32, u32, u32) {
        let min_x = self.points.iter().map(|p| p.0).fold(f32::INFINITY, f32::min);
        let min_y = self.points.iter().map(|p| p.1).fold(f32::INFINITY, f32::min);
        let max_x = self.points.iter().map(|p| p.0).fold(f32::NEG_INFINITY, f32::max);
        let max_y = self.points.iter().map(|p| p.1).fold(f32::NEG_INFINITY, f32::max);

        let min_x = min_x.max(0.0);
        let min_y = min_y.max(0.0);

        (
            min_x as u32,
            min_y as u32,
            (max_x - min_x).max(0.0) as u32,
            (max_y - min_y).max(0.0) as u32,
        )
    }
}

/// One OCR-recognized text region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Where the text was found
    pub region: Region,
    /// Recognized text
    pub text: String,
    /// Recognition confidence (0.0 - 1.0)
    pub confidence: f32,
}

impl Detection {
    pub fn new(region: Region, text: impl Into<String>, confidence: f32) -> Self {
        Self {
            region,
            text: text.into(),
            confidence,
        }
    }

    /// Whether this detection's text carries the marker
    pub fn has_marker(&self) -> bool {
        self.text.contains(MARKER)
    }
}

/// Outcome of scanning a detection sequence for the marker line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Extraction {
    /// A detection contained the marker
    Found { text: String, confidence: f32 },
    /// No detection contained the marker
    NotFound,
}

impl Extraction {
    pub fn is_found(&self) -> bool {
        matches!(self, Extraction::Found { .. })
    }

    /// Matched text, if any
    pub fn text(&self) -> Option<&str> {
        match self {
            Extraction::Found { text, .. } => Some(text),
            Extraction::NotFound => None,
        }
    }

    /// Matched confidence, if any
    pub fn confidence(&self) -> Option<f32> {
        match self {
            Extraction::Found { confidence, .. } => Some(*confidence),
            Extraction::NotFound => None,
        }
    }
}

/// Return the first detection whose text contains [`MARKER`].
///
/// Matching is case-sensitive substring containment, so `ABC_1_XYZ` matches.
/// When several detections match, the earliest one in sequence order wins;
/// confidence plays no part in the choice. The confidence is copied from the
/// matched detection unchanged.
pub fn extract_target_line(detections: &[Detection]) -> Extraction {
    detections
        .iter()
        .find(|d| d.has_marker())
        .map(|d| Extraction::Found {
            text: d.text.clone(),
            confidence: d.confidence,
        })
        .unwrap_or(Extraction::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(text: &str, confidence: f32) -> Detection {
        Detection::new(Region::from_rect(0.0, 0.0, 10.0, 10.0), text, confidence)
    }

    #[test]
    fn test_single_match() {
        let detections = vec![det("TRACK_1_ABC", 0.92)];
        assert_eq!(
            extract_target_line(&detections),
            Extraction::Found {
                text: "TRACK_1_ABC".to_string(),
                confidence: 0.92,
            }
        );
    }

    #[test]
    fn test_no_match() {
        let detections = vec![det("HELLO", 0.80)];
        assert_eq!(extract_target_line(&detections), Extraction::NotFound);
    }

    #[test]
    fn test_empty_sequence() {
        assert_eq!(extract_target_line(&[]), Extraction::NotFound);
    }

    #[test]
    fn test_first_match_wins() {
        let detections = vec![det("X_1_Y", 0.5), det("Z_1_W", 0.9)];
        assert_eq!(
            extract_target_line(&detections),
            Extraction::Found {
                text: "X_1_Y".to_string(),
                confidence: 0.5,
            }
        );
    }

    #[test]
    fn test_match_after_non_matching_lines() {
        let detections = vec![
            det("SHIP TO", 0.99),
            det("1_1 MAIN ST", 0.95),
            det("REF_1_0042", 0.71),
        ];
        let result = extract_target_line(&detections);
        assert_eq!(result.text(), Some("REF_1_0042"));
        assert_eq!(result.confidence(), Some(0.71));
    }

    #[test]
    fn test_marker_inside_token() {
        let detections = vec![det("ABC_1_XYZ", 0.6)];
        assert!(extract_target_line(&detections).is_found());

        let detections = vec![det("_1_", 0.6)];
        assert!(extract_target_line(&detections).is_found());
    }

    #[test]
    fn test_near_misses_do_not_match() {
        let detections = vec![
            det("_1", 0.9),
            det("1_", 0.9),
            det("_ 1 _", 0.9),
            det("-1-", 0.9),
            det("_l_", 0.9),
        ];
        assert_eq!(extract_target_line(&detections), Extraction::NotFound);
    }

    #[test]
    fn test_confidence_is_bit_identical() {
        let confidence = f32::from_bits(0x3f6b_851f); // 0.92 with full f32 precision
        let detections = vec![det("A_1_B", confidence)];

        let found = extract_target_line(&detections).confidence().unwrap();
        assert_eq!(found.to_bits(), confidence.to_bits());
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let detections = vec![det("foo", 0.3), det("bar_1_", 0.4), det("_1_baz", 0.99)];
        let first = extract_target_line(&detections);
        let second = extract_target_line(&detections);
        assert_eq!(first, second);
        assert_eq!(detections.len(), 3);
    }

    #[test]
    fn test_extraction_serializes_with_status_tag() {
        let found = Extraction::Found {
            text: "A_1_B".to_string(),
            confidence: 0.5,
        };
        let json = serde_json::to_value(&found).unwrap();
        assert_eq!(json["status"], "found");
        assert_eq!(json["text"], "A_1_B");

        let json = serde_json::to_value(Extraction::NotFound).unwrap();
        assert_eq!(json["status"], "not_found");
    }

    #[test]
    fn test_region_bounds() {
        let region = Region {
            points: [(12.4, 8.0), (80.9, 10.0), (81.0, 30.5), (11.0, 29.0)],
        };
        assert_eq!(region.bounds(), (11, 8, 70, 22));

        let rect = Region::from_rect(5.0, 6.0, 20.0, 10.0);
        assert_eq!(rect.bounds(), (5, 6, 20, 10));
    }
}
