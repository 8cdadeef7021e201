//! Shared application state between the dashboard and the OCR worker

use crate::config::AppConfig;
use crate::vision::VisionConfig;

/// Central shared state
#[derive(Debug, Clone, Default)]
pub struct SharedAppState {
    /// Application configuration
    pub config: AppConfig,
    /// Runtime state (not persisted)
    pub runtime: RuntimeState,
}

impl SharedAppState {
    /// Create a new shared state with the given configuration
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            runtime: RuntimeState::default(),
        }
    }

    /// Pipeline configuration derived from the application configuration
    pub fn vision_config(&self) -> VisionConfig {
        VisionConfig::from(&self.config)
    }
}

/// Runtime state that is not persisted
#[derive(Debug, Clone, Default)]
pub struct RuntimeState {
    /// An OCR request is in flight
    pub is_processing: bool,
    /// Models are being downloaded
    pub is_downloading: bool,
    /// All model files are present
    pub models_ready: bool,
    /// The worker has a loaded OCR engine
    pub engine_loaded: bool,
    /// Number of OCR requests answered
    pub requests_completed: u64,
    /// Last error message (if any)
    pub last_error: Option<String>,
}

impl RuntimeState {
    /// Whether a new OCR request may be submitted
    pub fn can_submit(&self) -> bool {
        !self.is_processing && !self.is_downloading
    }

    /// Clear any error state
    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Set an error message
    pub fn set_error(&mut self, error: impl Into<String>) {
        self.last_error = Some(error.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_state() {
        let mut runtime = RuntimeState::default();
        runtime.set_error("boom");
        assert_eq!(runtime.last_error.as_deref(), Some("boom"));
        runtime.clear_error();
        assert!(runtime.last_error.is_none());
    }

    #[test]
    fn test_single_request_gate() {
        let mut runtime = RuntimeState::default();
        assert!(runtime.can_submit());
        runtime.is_processing = true;
        assert!(!runtime.can_submit());
        runtime.is_processing = false;
        runtime.is_downloading = true;
        assert!(!runtime.can_submit());
    }

    #[test]
    fn test_vision_config_follows_app_config() {
        let mut config = AppConfig::default();
        config.ocr.offline = true;
        let state = SharedAppState::new(config);
        assert!(state.vision_config().ocr.offline);
    }
}
