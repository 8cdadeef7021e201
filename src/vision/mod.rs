//! Vision/OCR Layer
//!
//! Decodes uploaded labels and runs PaddleOCR (via ONNX Runtime) over them.
//! The engine is heavy to create, so [`VisionPipeline`] builds it on first use
//! and keeps it until it is released or reconfigured.

pub mod detection;
pub mod models;
pub mod normalize;
pub mod ocr;
pub mod preprocess;
pub mod recognition;

use anyhow::{Context, Result};
use image::RgbImage;
use std::time::Instant;
use tracing::{debug, info};

use crate::config::{AppConfig, OcrSettings};
use crate::extraction::{Detection, LabelReport};

pub use models::{ModelManager, ModelType};
pub use normalize::{preprocess_image, NormalizedImage};
pub use ocr::OcrEngine;

/// Configuration for the vision pipeline
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisionConfig {
    /// Model location and detection/recognition parameters
    pub ocr: OcrSettings,
    /// Honour the EXIF orientation tag when decoding for OCR
    pub apply_exif_orientation: bool,
}

impl From<&AppConfig> for VisionConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            ocr: config.ocr.clone(),
            apply_exif_orientation: config.preprocessing.apply_exif_orientation,
        }
    }
}

/// Result of running OCR over one image
#[derive(Debug, Clone)]
pub struct VisionResult {
    /// Recognized text regions in reading order
    pub detections: Vec<Detection>,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

impl VisionResult {
    /// Run the target-line extractor and bundle everything for display
    pub fn into_report(self) -> LabelReport {
        LabelReport::new(self.detections, self.processing_time_ms)
    }
}

/// Vision processing pipeline owning the lazily created OCR engine
pub struct VisionPipeline {
    /// PaddleOCR engine, created on first use
    engine: Option<OcrEngine>,
    /// Current configuration
    config: VisionConfig,
    /// Model manager for PaddleOCR
    model_manager: ModelManager,
}

impl VisionPipeline {
    /// Create a new vision pipeline with custom configuration
    pub fn with_config(config: VisionConfig) -> Result<Self> {
        let model_manager = Self::model_manager_for(&config.ocr)?;

        Ok(Self {
            engine: None,
            config,
            model_manager,
        })
    }

    fn model_manager_for(settings: &OcrSettings) -> Result<ModelManager> {
        match &settings.model_dir {
            Some(dir) => ModelManager::with_dir(dir.clone(), settings.offline),
            None => ModelManager::new(settings.offline),
        }
    }

    pub fn config(&self) -> &VisionConfig {
        &self.config
    }

    /// Apply a new configuration. The engine is released and rebuilt on the next request.
    pub fn reconfigure(&mut self, config: VisionConfig) -> Result<()> {
        if config == self.config {
            return Ok(());
        }

        self.model_manager = Self::model_manager_for(&config.ocr)?;
        self.release_engine();
        self.config = config;
        info!("Vision pipeline reconfigured");
        Ok(())
    }

    /// Check if the model files are present
    pub fn are_models_ready(&self) -> bool {
        self.model_manager.are_models_ready()
    }

    /// Get model status
    pub fn get_model_status(&self) -> Vec<(ModelType, bool, Option<u64>)> {
        self.model_manager.get_model_status()
    }

    /// Download whatever models are missing
    pub fn download_models(&self) -> Result<()> {
        self.model_manager.ensure_all_models()
    }

    /// Whether the engine is currently loaded
    pub fn is_engine_ready(&self) -> bool {
        self.engine.is_some()
    }

    /// Create the engine if needed and return it
    pub fn ensure_engine(&mut self) -> Result<&mut OcrEngine> {
        if self.engine.is_none() {
            info!("Initializing PaddleOCR engine");

            let det_path = self.model_manager.ensure_model(ModelType::Detection)?;
            let rec_path = self.model_manager.ensure_model(ModelType::Recognition)?;
            let dict_path = self.model_manager.ensure_model(ModelType::Dictionary)?;

            let engine = OcrEngine::new(&det_path, &rec_path, &dict_path, &self.config.ocr)?;
            self.engine = Some(engine);
            info!("PaddleOCR initialized successfully");
        }

        self.engine.as_mut().context("OCR engine is not available")
    }

    /// Drop the engine and its ONNX sessions
    pub fn release_engine(&mut self) {
        if self.engine.take().is_some() {
            info!("OCR engine released");
        }
    }

    /// Decode raw upload bytes and run OCR on them
    pub fn run_ocr(&mut self, bytes: &[u8]) -> Result<VisionResult> {
        let (image, _) = normalize::decode_image(bytes, self.config.apply_exif_orientation)?;
        self.recognize_image(&image.to_rgb8())
    }

    /// Run OCR on an already decoded image
    pub fn recognize_image(&mut self, image: &RgbImage) -> Result<VisionResult> {
        let start = Instant::now();

        let detections = self.ensure_engine()?.recognize(image)?;

        let processing_time = start.elapsed();
        debug!(
            "Vision processing complete in {:?}: {} detections",
            processing_time,
            detections.len()
        );

        Ok(VisionResult {
            detections,
            processing_time_ms: processing_time.as_millis() as u64,
        })
    }
}

impl Drop for VisionPipeline {
    fn drop(&mut self) {
        self.release_engine();
    }
}
