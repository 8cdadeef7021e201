//! Dashboard view state management

use anyhow::Result;
use image::RgbImage;
use std::path::PathBuf;

use crate::config::PreprocessSettings;
use crate::extraction::LabelReport;
use crate::shared::{OcrResponse, RequestId, RuntimeState};
use crate::upload::Upload;
use crate::vision::normalize::{self, NormalizedImage};

/// Longest side of the original image texture
const DISPLAY_MAX_SIDE: u32 = 2048;

/// Actions requested by the views, carried out by the dashboard app
#[derive(Debug, Clone, PartialEq)]
pub enum LabelCommand {
    /// Read the file named in the path field
    LoadPath(PathBuf),
    /// Submit the current upload to the worker
    RunOcr,
    /// Fetch missing model files
    DownloadModels,
    /// Write config.toml and reconfigure the worker
    SaveSettings,
}

/// Main page state
#[derive(Default)]
pub struct LabelViewState {
    /// Contents of the path text field
    pub path_input: String,
    /// The accepted upload
    pub upload: Option<Upload>,
    /// Original image for display, possibly downscaled
    pub original_image: Option<RgbImage>,
    /// Size of the image OCR coordinates refer to
    pub original_size: (u32, u32),
    /// Upright, size-limited image for display
    pub preprocessed: Option<NormalizedImage>,
    /// Texture for the original image
    pub original_texture: Option<egui::TextureHandle>,
    /// Texture for the preprocessed image
    pub preprocessed_texture: Option<egui::TextureHandle>,
    /// Textures need rebuilding from the images above
    pub textures_dirty: bool,
    /// Report for the current upload
    pub report: Option<LabelReport>,
    /// Request whose response we are waiting for
    pub pending_request: Option<RequestId>,
    /// In-flight request whose upload was replaced; its answer is discarded
    pub superseded_request: Option<RequestId>,
    /// Problem with the last load attempt
    pub upload_error: Option<String>,
    /// Command for the app to carry out after rendering
    pub pending_command: Option<LabelCommand>,
    /// Settings panel state
    pub settings: SettingsViewState,
}

impl LabelViewState {
    /// Make `upload` current: decode it for display and drop the previous report
    pub fn accept_upload(
        &mut self,
        upload: Upload,
        settings: &PreprocessSettings,
    ) -> Result<()> {
        let (original, _) = normalize::decode_image(&upload.bytes, settings.apply_exif_orientation)?;
        let original_size = (original.width(), original.height());
        let preprocessed = normalize::preprocess_image(&upload.bytes, settings)?;

        self.original_image = Some(normalize::limit_size(original, DISPLAY_MAX_SIDE).to_rgb8());
        self.original_size = original_size;
        self.preprocessed = Some(preprocessed);
        self.upload = Some(upload);
        self.report = None;
        if let Some(request_id) = self.pending_request.take() {
            self.superseded_request = Some(request_id);
        }
        self.upload_error = None;
        self.textures_dirty = true;
        Ok(())
    }

    /// Redo the display preprocessing after the settings changed
    pub fn refresh_preprocessed(&mut self, settings: &PreprocessSettings) -> Result<()> {
        if let Some(upload) = &self.upload {
            self.preprocessed = Some(normalize::preprocess_image(&upload.bytes, settings)?);
            self.textures_dirty = true;
        }
        Ok(())
    }

    /// Fold a worker response into the view and runtime state
    pub fn apply_response(&mut self, response: OcrResponse, runtime: &mut RuntimeState) {
        match response {
            OcrResponse::Completed { request_id, report } => {
                runtime.engine_loaded = true;
                if self.pending_request == Some(request_id) {
                    self.pending_request = None;
                    self.report = Some(report);
                    runtime.is_processing = false;
                    runtime.requests_completed += 1;
                    runtime.clear_error();
                } else {
                    self.release_superseded(request_id, runtime);
                }
            }
            OcrResponse::Failed { request_id, error } => {
                if self.pending_request == Some(request_id) {
                    self.pending_request = None;
                    runtime.is_processing = false;
                    runtime.set_error(error);
                } else {
                    self.release_superseded(request_id, runtime);
                }
            }
            OcrResponse::ModelsDownloaded => {
                runtime.is_downloading = false;
                runtime.models_ready = true;
                runtime.clear_error();
            }
            OcrResponse::DownloadFailed(error) => {
                runtime.is_downloading = false;
                runtime.set_error(format!("Model download failed: {}", error));
            }
            OcrResponse::Reconfigured { models_ready } => {
                runtime.models_ready = models_ready;
                runtime.engine_loaded = false;
            }
            OcrResponse::Error(error) => runtime.set_error(error),
        }
    }

    /// The worker finished a request nobody wants any more; reopen the gate
    fn release_superseded(&mut self, request_id: RequestId, runtime: &mut RuntimeState) {
        if self.superseded_request == Some(request_id) {
            self.superseded_request = None;
            if self.pending_request.is_none() {
                runtime.is_processing = false;
            }
        }
    }

    /// Whether the Run button should be enabled
    pub fn can_run(&self, runtime: &RuntimeState) -> bool {
        self.upload.is_some() && runtime.can_submit()
    }
}

/// Settings view state
#[derive(Debug, Default)]
pub struct SettingsViewState {
    /// Whether the panel is open
    pub open: bool,
    /// Currently expanded section
    pub expanded_section: Option<SettingsSection>,
    /// Unsaved changes flag
    pub has_unsaved_changes: bool,
}

/// Settings sections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsSection {
    Ocr,
    Preprocessing,
    Interface,
}
