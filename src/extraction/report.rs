//! Per-request label report
//!
//! Bundles the OCR detections with the extracted target line so the
//! dashboard and the headless CLI render the same outcome.

use serde::{Deserialize, Serialize};

use super::{extract_target_line, Detection, Extraction, MARKER};

/// What the user should be told about a processed label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    /// OCR produced no detections at all
    NothingDetected,
    /// OCR produced text, but no line carries the marker
    MarkerNotFound,
    /// The marker line was extracted
    MarkerFound,
}

/// Result of running OCR and extraction on one upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelReport {
    /// Every detection, in OCR scan order
    pub detections: Vec<Detection>,
    /// The extracted marker line
    pub extraction: Extraction,
    /// OCR processing time in milliseconds
    pub processing_time_ms: u64,
}

impl LabelReport {
    /// Build a report, running the extractor over the detections
    pub fn new(detections: Vec<Detection>, processing_time_ms: u64) -> Self {
        let extraction = extract_target_line(&detections);
        Self {
            detections,
            extraction,
            processing_time_ms,
        }
    }

    pub fn status(&self) -> ReportStatus {
        if self.detections.is_empty() {
            ReportStatus::NothingDetected
        } else if self.extraction.is_found() {
            ReportStatus::MarkerFound
        } else {
            ReportStatus::MarkerNotFound
        }
    }

    /// One `"<text> (conf=<0.00>)"` line per detection
    pub fn ocr_lines(&self) -> Vec<String> {
        self.detections
            .iter()
            .map(|d| format!("{} (conf={:.2})", d.text, d.confidence))
            .collect()
    }

    /// Plain-text rendering used by the headless mode
    pub fn render_text(&self) -> String {
        let mut out = String::new();

        out.push_str("Full OCR Output\n");
        if self.detections.is_empty() {
            out.push_str(nothing_detected_message());
            out.push('\n');
        } else {
            for line in self.ocr_lines() {
                out.push_str(&line);
                out.push('\n');
            }
        }

        out.push('\n');
        out.push_str(&format!("Target `{}` Line\n", MARKER));
        match &self.extraction {
            Extraction::Found { text, confidence } => {
                out.push_str(&format!("Extracted: `{}`\n", text));
                out.push_str(&format!("Confidence: {:.2}\n", confidence));
            }
            Extraction::NotFound => {
                out.push_str(&not_found_message());
                out.push('\n');
            }
        }

        out
    }
}

pub fn nothing_detected_message() -> &'static str {
    "No text detected by OCR."
}

pub fn not_found_message() -> String {
    format!("No line containing `{}` was found in the OCR output.", MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::Region;

    fn det(text: &str, confidence: f32) -> Detection {
        Detection::new(Region::from_rect(0.0, 0.0, 1.0, 1.0), text, confidence)
    }

    #[test]
    fn test_status_nothing_detected() {
        let report = LabelReport::new(vec![], 12);
        assert_eq!(report.status(), ReportStatus::NothingDetected);
        assert_eq!(report.extraction, Extraction::NotFound);
    }

    #[test]
    fn test_status_marker_not_found() {
        let report = LabelReport::new(vec![det("HELLO", 0.8)], 5);
        assert_eq!(report.status(), ReportStatus::MarkerNotFound);
    }

    #[test]
    fn test_status_marker_found() {
        let report = LabelReport::new(vec![det("HELLO", 0.8), det("TRACK_1_ABC", 0.92)], 5);
        assert_eq!(report.status(), ReportStatus::MarkerFound);
        assert_eq!(report.extraction.text(), Some("TRACK_1_ABC"));
    }

    #[test]
    fn test_ocr_lines_format() {
        let report = LabelReport::new(vec![det("HELLO", 0.8), det("A_1_B", 0.456)], 0);
        assert_eq!(
            report.ocr_lines(),
            vec!["HELLO (conf=0.80)".to_string(), "A_1_B (conf=0.46)".to_string()]
        );
    }

    #[test]
    fn test_render_text_found() {
        let report = LabelReport::new(vec![det("TRACK_1_ABC", 0.92)], 0);
        let text = report.render_text();
        assert!(text.contains("TRACK_1_ABC (conf=0.92)"));
        assert!(text.contains("Extracted: `TRACK_1_ABC`"));
        assert!(text.contains("Confidence: 0.92"));
    }

    #[test]
    fn test_render_text_empty_and_missing() {
        let empty = LabelReport::new(vec![], 0).render_text();
        assert!(empty.contains(nothing_detected_message()));
        assert!(empty.contains(&not_found_message()));

        let missing = LabelReport::new(vec![det("HELLO", 0.5)], 0).render_text();
        assert!(!missing.contains(nothing_detected_message()));
        assert!(missing.contains(&not_found_message()));
    }

    #[test]
    fn test_report_json_roundtrip_keeps_confidence() {
        let report = LabelReport::new(vec![det("X_1_Y", 0.5), det("Z_1_W", 0.9)], 42);
        let json = serde_json::to_string(&report).unwrap();
        let parsed: LabelReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report);
        assert_eq!(parsed.extraction.confidence(), Some(0.5));
    }
}
