//! Application Configuration
//!
//! User settings and preferences stored in TOML format.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// OCR engine settings
    pub ocr: OcrSettings,
    /// Display preprocessing settings
    pub preprocessing: PreprocessSettings,
    /// Dashboard settings
    pub interface: InterfaceSettings,
}

/// OCR engine and model settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Directory holding det.onnx / rec.onnx / dict.txt (None = app data dir)
    pub model_dir: Option<PathBuf>,
    /// Try GPU execution providers before falling back to CPU
    pub use_gpu: bool,
    /// Never download models
    pub offline: bool,
    /// Probability above which a pixel counts as text
    pub det_threshold: f32,
    /// Minimum mean probability for a detected box to be kept
    pub box_threshold: f32,
    /// How far detected boxes are expanded
    pub unclip_ratio: f32,
    /// Longest side of the detection model input
    pub det_max_side: u32,
    /// Maximum width of a recognition crop
    pub rec_max_width: u32,
    /// Detections recognized below this confidence are dropped
    pub min_confidence: f32,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            model_dir: None,
            use_gpu: false,
            offline: false,
            det_threshold: 0.3,
            box_threshold: 0.6,
            unclip_ratio: 1.5,
            det_max_side: 960,
            rec_max_width: 640,
            min_confidence: 0.0,
        }
    }
}

/// Settings for the auto-rotated display image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessSettings {
    /// Honour the EXIF orientation tag
    pub apply_exif_orientation: bool,
    /// Turn the image when the text appears to run vertically
    pub auto_rotate: bool,
    /// How much more structured the column profile must be before rotating
    pub rotation_ratio: f32,
    /// Longest side of the normalized image (larger images are scaled down)
    pub max_side: u32,
}

impl Default for PreprocessSettings {
    fn default() -> Self {
        Self {
            apply_exif_orientation: true,
            auto_rotate: true,
            rotation_ratio: 1.3,
            max_side: 1600,
        }
    }
}

/// Dashboard settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceSettings {
    /// Draw detection boxes over the original image
    pub show_bounding_boxes: bool,
    /// Directory of the last loaded upload
    pub last_directory: Option<PathBuf>,
}

impl Default for InterfaceSettings {
    fn default() -> Self {
        Self {
            show_bounding_boxes: true,
            last_directory: None,
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {:?}", path))?;
    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config {:?}", path))?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {:?}", parent))?;
    }
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();

        // OCR defaults
        assert!(config.ocr.model_dir.is_none());
        assert!(!config.ocr.use_gpu);
        assert!(!config.ocr.offline);
        assert!((config.ocr.det_threshold - 0.3).abs() < 0.01);
        assert!((config.ocr.box_threshold - 0.6).abs() < 0.01);
        assert_eq!(config.ocr.det_max_side, 960);
        assert_eq!(config.ocr.min_confidence, 0.0);

        // Preprocessing defaults
        assert!(config.preprocessing.apply_exif_orientation);
        assert!(config.preprocessing.auto_rotate);
        assert_eq!(config.preprocessing.max_side, 1600);

        // Interface defaults
        assert!(config.interface.show_bounding_boxes);
        assert!(config.interface.last_directory.is_none());
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let mut config = AppConfig::default();
        config.ocr.model_dir = Some(PathBuf::from("/opt/models"));
        config.ocr.use_gpu = true;
        config.preprocessing.max_side = 1024;

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [ocr]
            offline = true

            [preprocessing]
            auto_rotate = false
            "#,
        )
        .unwrap();

        assert!(parsed.ocr.offline);
        assert_eq!(parsed.ocr.det_max_side, 960);
        assert!(!parsed.preprocessing.auto_rotate);
        assert_eq!(parsed.preprocessing.max_side, 1600);
        assert!(parsed.interface.show_bounding_boxes);
    }

    #[test]
    fn test_save_and_load_config() {
        let mut config = AppConfig::default();
        config.interface.show_bounding_boxes = false;

        let temp_file = NamedTempFile::new().unwrap();
        save_config(&config, temp_file.path()).unwrap();
        let loaded = load_config(temp_file.path()).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }
}
