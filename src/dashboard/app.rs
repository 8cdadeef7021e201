//! Dashboard application entry point

use eframe::egui;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::app::OcrWorker;
use crate::config::save_config;
use crate::dashboard::state::{LabelCommand, LabelViewState};
use crate::dashboard::theme;
use crate::dashboard::views::{render_label_view, render_settings_view};
use crate::shared::SharedAppState;
use crate::upload::{Upload, UploadError};

/// Repaint interval while the worker is busy
const BUSY_REPAINT: Duration = Duration::from_millis(100);

/// The label dashboard application
pub struct LabelApp {
    /// Shared application state
    shared_state: Arc<RwLock<SharedAppState>>,
    /// Page state
    view_state: LabelViewState,
    /// Whether theme has been applied
    theme_applied: bool,
    /// OCR worker, absent if it failed to start
    worker: Option<OcrWorker>,
    /// Where settings are saved
    config_path: PathBuf,
}

impl LabelApp {
    /// Create the dashboard and start the OCR worker
    pub fn new(shared_state: Arc<RwLock<SharedAppState>>, config_path: PathBuf) -> Self {
        let (vision_config, last_directory) = {
            let state = shared_state.read();
            (state.vision_config(), state.config.interface.last_directory.clone())
        };

        let worker = match OcrWorker::spawn(vision_config) {
            Ok(worker) => Some(worker),
            Err(e) => {
                error!("Failed to start OCR worker: {:#}", e);
                shared_state
                    .write()
                    .runtime
                    .set_error(format!("OCR worker unavailable: {:#}", e));
                None
            }
        };

        let mut view_state = LabelViewState::default();
        if let Some(dir) = last_directory {
            view_state.path_input = format!("{}{}", dir.display(), std::path::MAIN_SEPARATOR);
        }

        Self {
            shared_state,
            view_state,
            theme_applied: false,
            worker,
            config_path,
        }
    }

    /// Create eframe options for the dashboard window
    pub fn options() -> eframe::NativeOptions {
        eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default()
                .with_inner_size([1200.0, 860.0])
                .with_min_inner_size([800.0, 600.0])
                .with_drag_and_drop(true)
                .with_title("Shipping Label OCR"),
            ..Default::default()
        }
    }

    /// Fold every waiting worker response into the state
    fn poll_worker(&mut self) {
        let Some(worker) = &self.worker else {
            return;
        };

        while let Some(response) = worker.try_recv() {
            let mut state = self.shared_state.write();
            self.view_state.apply_response(response, &mut state.runtime);
        }

        if !worker.is_running() {
            warn!("OCR worker stopped");
            self.worker = None;
            let mut state = self.shared_state.write();
            state.runtime.is_processing = false;
            state.runtime.is_downloading = false;
            state.runtime.set_error("OCR worker stopped unexpectedly");
        }
    }

    /// Accept the first file dropped onto the window
    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped = ctx.input(|i| i.raw.dropped_files.clone());
        let Some(file) = dropped.into_iter().next() else {
            return;
        };

        let result = match (&file.bytes, &file.path) {
            (Some(bytes), _) => {
                let name = if file.name.is_empty() {
                    file.path
                        .as_ref()
                        .and_then(|p| p.file_name())
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default()
                } else {
                    file.name.clone()
                };
                Upload::from_dropped(&name, bytes.clone())
            }
            (None, Some(path)) => {
                self.view_state.path_input = path.display().to_string();
                Upload::from_path(path)
            }
            (None, None) => return,
        };

        self.accept(result);
    }

    /// Carry out whatever the views asked for this frame
    fn process_command(&mut self) {
        let Some(command) = self.view_state.pending_command.take() else {
            return;
        };

        match command {
            LabelCommand::LoadPath(path) => self.load_path(&path),
            LabelCommand::RunOcr => self.run_ocr(),
            LabelCommand::DownloadModels => self.download_models(),
            LabelCommand::SaveSettings => self.save_settings(),
        }
    }

    fn load_path(&mut self, path: &Path) {
        let result = Upload::from_path(path);
        if result.is_ok() {
            if let Some(dir) = path.parent() {
                self.shared_state.write().config.interface.last_directory = Some(dir.to_path_buf());
            }
        }
        self.accept(result);
    }

    fn accept(&mut self, result: Result<Upload, UploadError>) {
        let upload = match result {
            Ok(upload) => upload,
            Err(e) => {
                warn!("Upload rejected: {}", e);
                self.view_state.upload_error = Some(e.to_string());
                return;
            }
        };

        let settings = self.shared_state.read().config.preprocessing.clone();
        let name = upload.name.clone();
        match self.view_state.accept_upload(upload, &settings) {
            Ok(()) => {
                info!("Loaded {}", name);
                self.shared_state.write().runtime.clear_error();
            }
            Err(e) => {
                warn!("Could not decode {}: {:#}", name, e);
                self.view_state.upload_error = Some(format!("Could not decode {}: {:#}", name, e));
            }
        }
    }

    fn run_ocr(&mut self) {
        let Some(bytes) = self.view_state.upload.as_ref().map(|u| u.bytes.clone()) else {
            return;
        };
        let Some(worker) = self.worker.as_mut() else {
            self.shared_state.write().runtime.set_error("OCR worker is not running");
            return;
        };

        let mut state = self.shared_state.write();
        if !state.runtime.can_submit() {
            return;
        }

        match worker.submit(bytes) {
            Ok(request_id) => {
                self.view_state.pending_request = Some(request_id);
                self.view_state.report = None;
                state.runtime.is_processing = true;
                state.runtime.clear_error();
            }
            Err(e) => state.runtime.set_error(format!("{:#}", e)),
        }
    }

    fn download_models(&mut self) {
        let Some(worker) = &self.worker else {
            return;
        };

        let mut state = self.shared_state.write();
        if state.runtime.is_downloading {
            return;
        }
        match worker.download_models() {
            Ok(()) => {
                state.runtime.is_downloading = true;
                state.runtime.clear_error();
            }
            Err(e) => state.runtime.set_error(format!("{:#}", e)),
        }
    }

    fn save_settings(&mut self) {
        let (config, vision_config) = {
            let state = self.shared_state.read();
            (state.config.clone(), state.vision_config())
        };

        if let Err(e) = save_config(&config, &self.config_path) {
            error!("Failed to save settings: {:#}", e);
            self.shared_state.write().runtime.set_error(format!("{:#}", e));
            return;
        }
        info!("Settings saved to {:?}", self.config_path);
        self.view_state.settings.has_unsaved_changes = false;

        if let Err(e) = self.view_state.refresh_preprocessed(&config.preprocessing) {
            warn!("Could not refresh preview: {:#}", e);
        }

        if let Some(worker) = &self.worker {
            if let Err(e) = worker.reconfigure(vision_config) {
                self.shared_state.write().runtime.set_error(format!("{:#}", e));
            }
        }
    }
}

impl eframe::App for LabelApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Apply theme once
        if !self.theme_applied {
            theme::apply_theme(ctx);
            self.theme_applied = true;
        }

        self.poll_worker();
        self.handle_dropped_files(ctx);

        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(egui::RichText::new("Label OCR").strong());
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let label = if self.view_state.settings.open { "Hide Settings" } else { "Settings" };
                    if ui.button(label).clicked() {
                        self.view_state.settings.open = !self.view_state.settings.open;
                    }
                });
            });
        });

        if self.view_state.settings.open {
            egui::SidePanel::right("settings_panel")
                .resizable(true)
                .default_width(340.0)
                .show(ctx, |ui| {
                    render_settings_view(
                        ui,
                        &mut self.view_state.settings,
                        &mut self.view_state.pending_command,
                        &self.shared_state,
                    );
                });
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().id_salt("label_scroll").show(ui, |ui| {
                egui::Frame::none()
                    .inner_margin(24.0)
                    .show(ui, |ui| {
                        render_label_view(ui, &mut self.view_state, &self.shared_state);
                    });
            });
        });

        self.process_command();

        let busy = {
            let state = self.shared_state.read();
            state.runtime.is_processing || state.runtime.is_downloading
        };
        if busy {
            ctx.request_repaint_after(BUSY_REPAINT);
        }
    }
}

/// Run the dashboard application
pub fn run_dashboard(
    shared_state: Arc<RwLock<SharedAppState>>,
    config_path: PathBuf,
) -> Result<(), eframe::Error> {
    let app = LabelApp::new(shared_state, config_path);
    eframe::run_native(
        "Shipping Label OCR",
        LabelApp::options(),
        Box::new(|_cc| Ok(Box::new(app))),
    )
}
