//! Label view - upload, preview, OCR output and the extracted line

use egui::{Color32, RichText};
use egui_extras::{Column, TableBuilder};
use image::RgbImage;
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;

use crate::dashboard::components::{CardStatus, StatusCard};
use crate::dashboard::state::{LabelCommand, LabelViewState};
use crate::dashboard::theme::{self, ThemeColors};
use crate::extraction::report::{not_found_message, nothing_detected_message};
use crate::extraction::{Detection, Extraction, LabelReport, MARKER};
use crate::shared::{RuntimeState, SharedAppState};
use crate::upload::UploadFormat;

/// Height reserved for each image preview
const PREVIEW_HEIGHT: f32 = 360.0;

/// Render the label view
pub fn render_label_view(
    ui: &mut egui::Ui,
    view_state: &mut LabelViewState,
    shared_state: &Arc<RwLock<SharedAppState>>,
) {
    let (runtime, show_boxes) = {
        let state = shared_state.read();
        (state.runtime.clone(), state.config.interface.show_bounding_boxes)
    };

    render_header(ui);
    ui.add_space(16.0);

    render_status_row(ui, view_state, &runtime);
    ui.add_space(16.0);

    render_upload_row(ui, view_state, &runtime);
    ui.add_space(16.0);

    if view_state.textures_dirty {
        rebuild_textures(ui.ctx(), view_state);
    }

    if view_state.upload.is_some() {
        render_previews(ui, view_state, show_boxes);
        ui.add_space(16.0);
        render_run_row(ui, view_state, &runtime);
        ui.add_space(16.0);
    }

    if let Some(error) = &runtime.last_error {
        ui.label(
            RichText::new(format!("Error: {}", error))
                .color(ThemeColors::ACCENT_ERROR)
                .size(14.0),
        );
        ui.add_space(12.0);
    }

    if let Some(report) = &view_state.report {
        render_ocr_output(ui, report);
        ui.add_space(16.0);
        render_target_line(ui, report);
    }
}

fn render_header(ui: &mut egui::Ui) {
    ui.heading(
        RichText::new(format!("Shipping Label OCR: `{}` Line Extractor", MARKER))
            .size(24.0)
            .strong(),
    );
    ui.add_space(8.0);
    ui.label(
        RichText::new("Upload a shipping label or waybill image and this app will:")
            .size(14.0)
            .color(ThemeColors::TEXT_SECONDARY),
    );
    for (i, step) in [
        "Auto-rotate the image if needed".to_string(),
        "Run OCR with PaddleOCR models on ONNX Runtime".to_string(),
        format!("Extract the complete line containing `{}`", MARKER),
        "Show the result along with its confidence".to_string(),
    ]
    .iter()
    .enumerate()
    {
        ui.label(
            RichText::new(format!("{}. {}", i + 1, step))
                .size(14.0)
                .color(ThemeColors::TEXT_SECONDARY),
        );
    }
}

fn render_status_row(ui: &mut egui::Ui, view_state: &mut LabelViewState, runtime: &RuntimeState) {
    ui.horizontal(|ui| {
        let (models_value, models_status) = if runtime.is_downloading {
            ("Downloading", CardStatus::Busy)
        } else if runtime.models_ready {
            ("Installed", CardStatus::Ready)
        } else {
            ("Missing", CardStatus::Error)
        };
        StatusCard::new("Model Files", models_value, models_status).show(ui);

        ui.add_space(16.0);

        let (engine_value, engine_status) = if runtime.is_processing {
            ("Processing", CardStatus::Busy)
        } else if runtime.engine_loaded {
            ("Loaded", CardStatus::Ready)
        } else {
            ("Not loaded", CardStatus::Idle)
        };
        StatusCard::new("OCR Engine", engine_value, engine_status)
            .with_detail(format!("{} labels processed", runtime.requests_completed))
            .show(ui);

        ui.add_space(16.0);

        let (time_value, time_status) = match &view_state.report {
            Some(report) => (format!("{} ms", report.processing_time_ms), CardStatus::Ready),
            None => ("-".to_string(), CardStatus::Idle),
        };
        StatusCard::new("Last Processing Time", time_value, time_status).show(ui);
    });

    if !runtime.models_ready && !runtime.is_downloading {
        ui.add_space(8.0);
        ui.horizontal(|ui| {
            if ui
                .add(egui::Button::new("Download Models").min_size(egui::vec2(140.0, 32.0)))
                .on_hover_text("Fetch the detection and recognition models")
                .clicked()
            {
                view_state.pending_command = Some(LabelCommand::DownloadModels);
            }
            ui.label(
                RichText::new("OCR needs the model files before the first run")
                    .size(12.0)
                    .color(ThemeColors::TEXT_MUTED),
            );
        });
    }
}

fn render_upload_row(ui: &mut egui::Ui, view_state: &mut LabelViewState, runtime: &RuntimeState) {
    let hovering = ui.ctx().input(|i| !i.raw.hovered_files.is_empty());

    theme::section_frame()
        .stroke(theme::drop_zone_stroke(hovering))
        .show(ui, |ui| {
            ui.set_min_width(ui.available_width());
            ui.label(RichText::new("Upload label image").size(17.0).strong());
            ui.add_space(6.0);

            ui.horizontal(|ui| {
                let field = ui.add(
                    egui::TextEdit::singleline(&mut view_state.path_input)
                        .hint_text("Path to a .jpg, .jpeg or .png file")
                        .desired_width(420.0),
                );
                let submitted = field.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));

                let load = ui.add_enabled(
                    !runtime.is_processing && !view_state.path_input.trim().is_empty(),
                    egui::Button::new("Load"),
                );

                if (load.clicked() || submitted) && !view_state.path_input.trim().is_empty() {
                    let path = PathBuf::from(view_state.path_input.trim());
                    view_state.pending_command = Some(LabelCommand::LoadPath(path));
                }
            });

            ui.label(
                RichText::new(format!(
                    "or drop an image onto this window ({})",
                    UploadFormat::EXTENSIONS.join(", ")
                ))
                .size(12.0)
                .color(ThemeColors::TEXT_MUTED),
            );

            if let Some(upload) = &view_state.upload {
                ui.add_space(4.0);
                ui.label(
                    RichText::new(format!(
                        "Loaded {} ({}, {:.1} KB)",
                        upload.name,
                        upload.format,
                        upload.size_bytes() as f32 / 1024.0
                    ))
                    .size(13.0)
                    .color(ThemeColors::TEXT_SECONDARY),
                );
            }

            if let Some(error) = &view_state.upload_error {
                ui.add_space(4.0);
                ui.label(RichText::new(error).size(13.0).color(ThemeColors::ACCENT_ERROR));
            }
        });
}

fn rebuild_textures(ctx: &egui::Context, view_state: &mut LabelViewState) {
    view_state.original_texture = view_state
        .original_image
        .as_ref()
        .map(|image| ctx.load_texture("label_original", color_image(image), egui::TextureOptions::LINEAR));
    view_state.preprocessed_texture = view_state
        .preprocessed
        .as_ref()
        .map(|pre| ctx.load_texture("label_preprocessed", color_image(&pre.image), egui::TextureOptions::LINEAR));
    view_state.textures_dirty = false;
}

fn color_image(image: &RgbImage) -> egui::ColorImage {
    egui::ColorImage::from_rgb([image.width() as usize, image.height() as usize], image.as_raw())
}

fn render_previews(ui: &mut egui::Ui, view_state: &LabelViewState, show_boxes: bool) {
    let detections = view_state
        .report
        .as_ref()
        .filter(|_| show_boxes)
        .map(|r| r.detections.as_slice());

    ui.columns(2, |columns| {
        columns[0].label(RichText::new("Original Image").size(17.0).strong());
        columns[0].add_space(6.0);
        if let Some(texture) = &view_state.original_texture {
            theme::preview_frame().show(&mut columns[0], |ui| {
                show_image(ui, texture, view_state.original_size, detections);
            });
        }

        let mut title = "Preprocessed (Auto-rotated) Image".to_string();
        if let Some(pre) = &view_state.preprocessed {
            if pre.auto_rotated {
                title.push_str(" - rotated");
            }
        }
        columns[1].label(RichText::new(title).size(17.0).strong());
        columns[1].add_space(6.0);
        if let Some(texture) = &view_state.preprocessed_texture {
            let size = texture.size();
            theme::preview_frame().show(&mut columns[1], |ui| {
                show_image(ui, texture, (size[0] as u32, size[1] as u32), None);
            });
        }
    });
}

/// Draw a texture scaled to fit, with optional detection boxes in `source_size` coordinates
fn show_image(
    ui: &mut egui::Ui,
    texture: &egui::TextureHandle,
    source_size: (u32, u32),
    detections: Option<&[Detection]>,
) {
    let available = egui::vec2(ui.available_width(), PREVIEW_HEIGHT);
    let tex_size = texture.size_vec2();
    let scale = (available.x / tex_size.x).min(available.y / tex_size.y);
    let scaled_size = tex_size * scale;

    let (rect, _) = ui.allocate_exact_size(scaled_size, egui::Sense::hover());
    ui.painter().image(
        texture.id(),
        rect,
        egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
        Color32::WHITE,
    );

    let Some(detections) = detections else {
        return;
    };
    if source_size.0 == 0 || source_size.1 == 0 {
        return;
    }

    let scale_x = scaled_size.x / source_size.0 as f32;
    let scale_y = scaled_size.y / source_size.1 as f32;
    for detection in detections {
        let color = if detection.has_marker() {
            ThemeColors::MARKER
        } else {
            ThemeColors::ACCENT_PRIMARY
        };
        let (x, y, w, h) = detection.region.bounds();
        let box_rect = egui::Rect::from_min_size(
            rect.min + egui::vec2(x as f32 * scale_x, y as f32 * scale_y),
            egui::vec2(w as f32 * scale_x, h as f32 * scale_y),
        );
        ui.painter()
            .rect_stroke(box_rect, egui::Rounding::ZERO, egui::Stroke::new(1.5, color));
    }
}

fn render_run_row(ui: &mut egui::Ui, view_state: &mut LabelViewState, runtime: &RuntimeState) {
    ui.horizontal(|ui| {
        let button = ui.add_enabled(
            view_state.can_run(runtime),
            egui::Button::new(RichText::new("Run OCR & Extract").strong())
                .min_size(egui::vec2(180.0, 36.0)),
        );
        if button.clicked() {
            view_state.pending_command = Some(LabelCommand::RunOcr);
        }

        if runtime.is_processing {
            ui.spinner();
            ui.label(
                RichText::new("Running OCR...")
                    .size(14.0)
                    .color(ThemeColors::TEXT_SECONDARY),
            );
        }
    });
}

fn render_ocr_output(ui: &mut egui::Ui, report: &LabelReport) {
    theme::section_frame().show(ui, |ui| {
        ui.set_min_width(ui.available_width());
        ui.label(RichText::new("Full OCR Output").size(17.0).strong());
        ui.add_space(8.0);

        if report.detections.is_empty() {
            theme::callout_frame(ThemeColors::ACCENT_WARNING).show(ui, |ui| {
                ui.label(RichText::new(nothing_detected_message()).color(ThemeColors::ACCENT_WARNING));
            });
            return;
        }

        TableBuilder::new(ui)
            .striped(true)
            .vscroll(false)
            .column(Column::exact(40.0))
            .column(Column::remainder().at_least(200.0))
            .column(Column::exact(100.0))
            .header(24.0, |mut header| {
                header.col(|ui| {
                    ui.label(RichText::new("#").strong());
                });
                header.col(|ui| {
                    ui.label(RichText::new("Text").strong());
                });
                header.col(|ui| {
                    ui.label(RichText::new("Confidence").strong());
                });
            })
            .body(|mut body| {
                for (i, detection) in report.detections.iter().enumerate() {
                    body.row(22.0, |mut row| {
                        row.col(|ui| {
                            ui.label(RichText::new(format!("{}", i + 1)).color(ThemeColors::TEXT_MUTED));
                        });
                        row.col(|ui| {
                            let text = RichText::new(&detection.text).monospace();
                            if detection.has_marker() {
                                ui.label(text.color(ThemeColors::MARKER));
                            } else {
                                ui.label(text);
                            }
                        });
                        row.col(|ui| {
                            ui.label(format!("{:.2}", detection.confidence));
                        });
                    });
                }
            });
    });
}

fn render_target_line(ui: &mut egui::Ui, report: &LabelReport) {
    theme::section_frame().show(ui, |ui| {
        ui.set_min_width(ui.available_width());
        ui.label(RichText::new(format!("Target `{}` Line", MARKER)).size(17.0).strong());
        ui.add_space(8.0);

        match &report.extraction {
            Extraction::Found { text, confidence } => {
                theme::callout_frame(ThemeColors::ACCENT_SUCCESS).show(ui, |ui| {
                    ui.label(
                        RichText::new(format!("Extracted: `{}`", text))
                            .size(16.0)
                            .color(ThemeColors::ACCENT_SUCCESS),
                    );
                });
                ui.add_space(6.0);
                ui.horizontal(|ui| {
                    ui.label("Confidence:");
                    ui.label(RichText::new(format!("{:.2}", confidence)).strong());
                    if ui.small_button("Copy").clicked() {
                        ui.ctx().copy_text(text.clone());
                    }
                });
            }
            Extraction::NotFound => {
                theme::callout_frame(ThemeColors::ACCENT_ERROR).show(ui, |ui| {
                    ui.label(RichText::new(not_found_message()).color(ThemeColors::ACCENT_ERROR));
                });
            }
        }
    });
}
