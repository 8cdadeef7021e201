//! OCR (Optical Character Recognition) module
//!
//! Uses PaddleOCR models via ONNX Runtime for text detection and recognition.

use anyhow::{Context, Result};
use image::RgbImage;
use ndarray::{Axis, Ix4};
use ort::value::Value;
use std::path::Path;
use tracing::{debug, info};

use super::detection::{DbPostProcess, TextBox};
use super::models::OnnxSession;
use super::preprocess::{self, PreprocessConfig};
use super::recognition::{self, CharDictionary};
use crate::config::OcrSettings;
use crate::extraction::Detection;

/// OCR engine using PaddleOCR via ONNX Runtime
pub struct OcrEngine {
    detector: OnnxSession,
    recognizer: OnnxSession,
    dictionary: CharDictionary,
    postprocess: DbPostProcess,
    preprocess: PreprocessConfig,
    min_confidence: f32,
}

impl OcrEngine {
    /// Initialize OCR engine with model paths
    pub fn new(
        detection_model: &Path,
        recognition_model: &Path,
        dictionary_path: &Path,
        settings: &OcrSettings,
    ) -> Result<Self> {
        let detector = OnnxSession::load(detection_model, settings.use_gpu)
            .context("Failed to load detection model")?;
        let recognizer = OnnxSession::load(recognition_model, settings.use_gpu)
            .context("Failed to load recognition model")?;
        let dictionary = CharDictionary::load(dictionary_path)?;

        if dictionary.is_empty() {
            anyhow::bail!("Character dictionary {:?} has no symbols", dictionary_path);
        }

        info!("OCR engine ready ({} dictionary classes)", dictionary.len());

        Ok(Self {
            detector,
            recognizer,
            dictionary,
            postprocess: DbPostProcess::from_settings(settings),
            preprocess: PreprocessConfig {
                det_max_side: settings.det_max_side,
                rec_max_width: settings.rec_max_width,
                ..Default::default()
            },
            min_confidence: settings.min_confidence,
        })
    }

    /// Run detection and recognition over an image.
    ///
    /// Detections come back in reading order. Empty recognitions and those
    /// below the configured minimum confidence are dropped.
    pub fn recognize(&mut self, image: &RgbImage) -> Result<Vec<Detection>> {
        let boxes = self.detect(image)?;
        debug!("Detected {} text regions", boxes.len());

        let mut detections = Vec::with_capacity(boxes.len());
        for text_box in boxes {
            let Some(crop) = preprocess::crop_region(image, &text_box.region) else {
                continue;
            };

            let recognized = self.recognize_crop(&crop)?;
            let text = recognized.text.trim();
            if text.is_empty() || recognized.confidence < self.min_confidence {
                continue;
            }

            detections.push(Detection::new(text_box.region, text, recognized.confidence));
        }

        Ok(detections)
    }

    fn detect(&mut self, image: &RgbImage) -> Result<Vec<TextBox>> {
        let input = preprocess::preprocess_for_detection(image, &self.preprocess);
        let value = Value::from_array(input.tensor).context("Failed to create detection tensor")?;

        let input_name = self.detector.input_name().to_string();
        let outputs = self
            .detector
            .session_mut()
            .run(ort::inputs![input_name.as_str() => value])
            .context("Detection inference failed")?;

        let output = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract detection output")?;

        // [1, 1, H, W] probability map
        let prob = output
            .into_dimensionality::<Ix4>()
            .context("Unexpected detection output shape")?;
        let prob = prob.index_axis_move(Axis(0), 0).index_axis_move(Axis(0), 0);

        Ok(self
            .postprocess
            .boxes(prob, input.scale_x, input.scale_y, image.dimensions()))
    }

    fn recognize_crop(&mut self, crop: &RgbImage) -> Result<recognition::RecognizedText> {
        let tensor = preprocess::preprocess_for_recognition(crop, &self.preprocess);
        let value = Value::from_array(tensor).context("Failed to create recognition tensor")?;

        let input_name = self.recognizer.input_name().to_string();
        let outputs = self
            .recognizer
            .session_mut()
            .run(ort::inputs![input_name.as_str() => value])
            .context("Recognition inference failed")?;

        let output = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract recognition output")?;

        recognition::decode_output(output, &self.dictionary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::models::{ModelManager, ModelType};

    #[test]
    fn test_new_fails_without_models() {
        let dir = tempfile::tempdir().unwrap();
        let result = OcrEngine::new(
            &dir.path().join("det.onnx"),
            &dir.path().join("rec.onnx"),
            &dir.path().join("dict.txt"),
            &OcrSettings::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    #[ignore = "requires downloaded models"]
    fn test_recognize_blank_image() {
        let manager = ModelManager::new(false).unwrap();
        manager.ensure_all_models().unwrap();

        let mut engine = OcrEngine::new(
            &manager.model_path(ModelType::Detection),
            &manager.model_path(ModelType::Recognition),
            &manager.model_path(ModelType::Dictionary),
            &OcrSettings::default(),
        )
        .unwrap();

        let blank = RgbImage::from_pixel(320, 160, image::Rgb([255, 255, 255]));
        assert!(engine.recognize(&blank).unwrap().is_empty());
    }
}
