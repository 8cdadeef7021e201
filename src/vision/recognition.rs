//! Text recognition decoding
//!
//! Greedy CTC decoding of the recognition model output against the
//! character dictionary shipped with the model.

use anyhow::{Context, Result};
use ndarray::{ArrayView2, ArrayViewD, Axis};
use std::path::Path;
use tracing::debug;

/// Character dictionary for CTC decoding.
///
/// Index 0 is the CTC blank, file lines fill indices `1..=n` and a trailing
/// space is appended, matching how PaddleOCR models are exported.
#[derive(Debug, Clone)]
pub struct CharDictionary {
    symbols: Vec<String>,
}

impl CharDictionary {
    /// Build a dictionary from newline-separated symbols
    pub fn parse(content: &str) -> Self {
        let mut symbols = vec![String::new()];
        symbols.extend(
            content
                .lines()
                .map(|line| line.trim_end_matches('\r'))
                .filter(|line| !line.is_empty())
                .map(str::to_string),
        );
        symbols.push(" ".to_string());
        Self { symbols }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read character dictionary {:?}", path))?;
        let dictionary = Self::parse(&content);
        debug!("Loaded {} dictionary symbols from {:?}", dictionary.len() - 1, path);
        Ok(dictionary)
    }

    /// Number of classes, including the blank
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// True when the file contributed no symbols (only blank and space remain)
    pub fn is_empty(&self) -> bool {
        self.symbols.len() <= 2
    }

    fn symbol(&self, index: usize) -> Option<&str> {
        if index == 0 {
            None
        } else {
            self.symbols.get(index).map(String::as_str)
        }
    }
}

/// Recognized text with confidence score
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedText {
    pub text: String,
    /// Mean probability of the emitted characters, in [0, 1]
    pub confidence: f32,
}

/// Greedy CTC decode of a `[seq_len, num_classes]` probability matrix.
///
/// Repeated classes collapse unless separated by a blank. Class indices the
/// dictionary does not cover are skipped.
pub fn ctc_decode(probs: ArrayView2<f32>, dictionary: &CharDictionary) -> RecognizedText {
    let mut text = String::new();
    let mut total = 0.0f32;
    let mut emitted = 0usize;
    let mut prev_index: Option<usize> = None;

    for step in probs.axis_iter(Axis(0)) {
        let (max_index, max_prob) = step
            .iter()
            .enumerate()
            .fold((0usize, f32::NEG_INFINITY), |best, (i, &p)| {
                if p > best.1 {
                    (i, p)
                } else {
                    best
                }
            });

        if max_index != 0 && Some(max_index) != prev_index {
            if let Some(symbol) = dictionary.symbol(max_index) {
                text.push_str(symbol);
                total += max_prob;
                emitted += 1;
            }
        }

        prev_index = if max_index == 0 { None } else { Some(max_index) };
    }

    let confidence = if emitted == 0 {
        0.0
    } else {
        (total / emitted as f32).clamp(0.0, 1.0)
    };

    RecognizedText { text, confidence }
}

/// Decode a raw model output of shape `[1, seq_len, classes]` or `[seq_len, classes]`
pub fn decode_output(output: ArrayViewD<f32>, dictionary: &CharDictionary) -> Result<RecognizedText> {
    let shape = output.shape().to_vec();
    let view = match shape.len() {
        3 => output.index_axis_move(Axis(0), 0),
        2 => output,
        _ => anyhow::bail!("Unexpected recognition output shape: {:?}", shape),
    };
    let view = view
        .into_dimensionality::<ndarray::Ix2>()
        .context("Recognition output is not two-dimensional")?;

    if view.ncols() != dictionary.len() {
        debug!(
            "Recognition output has {} classes, dictionary has {}",
            view.ncols(),
            dictionary.len()
        );
    }

    Ok(ctc_decode(view, dictionary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array3};

    /// Dictionary "A", "B", "_", "1" at indices 1..=4, space at 5
    fn dictionary() -> CharDictionary {
        CharDictionary::parse("A\nB\n_\n1\n")
    }

    /// One-hot-ish matrix: each step puts `prob` on the given class
    fn steps(classes: &[usize], prob: f32, num_classes: usize) -> Array2<f32> {
        let mut m = Array2::<f32>::from_elem((classes.len(), num_classes), (1.0 - prob) / (num_classes - 1) as f32);
        for (t, &c) in classes.iter().enumerate() {
            m[[t, c]] = prob;
        }
        m
    }

    #[test]
    fn test_parse_dictionary() {
        let dict = dictionary();
        assert_eq!(dict.len(), 6);
        assert_eq!(dict.symbol(0), None);
        assert_eq!(dict.symbol(1), Some("A"));
        assert_eq!(dict.symbol(5), Some(" "));
        assert_eq!(dict.symbol(6), None);
        assert!(!dict.is_empty());
        assert!(CharDictionary::parse("").is_empty());
    }

    #[test]
    fn test_parse_handles_crlf() {
        let dict = CharDictionary::parse("A\r\nB\r\n");
        assert_eq!(dict.symbol(1), Some("A"));
        assert_eq!(dict.symbol(2), Some("B"));
    }

    #[test]
    fn test_decode_collapses_repeats_and_blanks() {
        // A A blank A _ 1 _ B B
        let probs = steps(&[1, 1, 0, 1, 3, 4, 3, 2, 2], 0.9, 6);
        let result = ctc_decode(probs.view(), &dictionary());
        assert_eq!(result.text, "AA_1_B");
        assert!((result.confidence - 0.9).abs() < 1e-5);
    }

    #[test]
    fn test_decode_all_blank() {
        let probs = steps(&[0, 0, 0], 0.99, 6);
        let result = ctc_decode(probs.view(), &dictionary());
        assert_eq!(result.text, "");
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_decode_ignores_out_of_range_class() {
        let probs = steps(&[1, 7, 2], 0.8, 8);
        let result = ctc_decode(probs.view(), &dictionary());
        assert_eq!(result.text, "AB");
    }

    #[test]
    fn test_confidence_clamped() {
        let probs = steps(&[1], 3.5, 6);
        let result = ctc_decode(probs.view(), &dictionary());
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_decode_output_with_batch_axis() {
        let probs = steps(&[2, 5, 1], 0.7, 6);
        let batched: Array3<f32> = probs.insert_axis(Axis(0));
        let result = decode_output(batched.view().into_dyn(), &dictionary()).unwrap();
        assert_eq!(result.text, "B A");
    }

    #[test]
    fn test_decode_output_rejects_bad_shape() {
        let flat = ndarray::Array1::<f32>::zeros(4);
        assert!(decode_output(flat.view().into_dyn(), &dictionary()).is_err());
    }

    #[test]
    fn test_load_dictionary_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dict.txt");
        std::fs::write(&path, "x\ny\n").unwrap();

        let dict = CharDictionary::load(&path).unwrap();
        assert_eq!(dict.len(), 4);
        assert!(CharDictionary::load(&dir.path().join("missing.txt")).is_err());
    }
}
