//! Settings panel - OCR, preprocessing and interface configuration

use egui::RichText;
use parking_lot::RwLock;
use std::cell::Cell;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::dashboard::state::{LabelCommand, SettingsSection, SettingsViewState};
use crate::dashboard::theme::{self, ThemeColors};
use crate::shared::SharedAppState;

/// Render the settings panel
pub fn render_settings_view(
    ui: &mut egui::Ui,
    view_state: &mut SettingsViewState,
    pending_command: &mut Option<LabelCommand>,
    shared_state: &Arc<RwLock<SharedAppState>>,
) {
    ui.heading(RichText::new("Settings").size(20.0).strong());
    ui.add_space(4.0);
    ui.label(
        RichText::new("Changes apply to the next OCR run once saved")
            .size(13.0)
            .color(ThemeColors::TEXT_SECONDARY)
    );
    ui.add_space(12.0);

    // Track changes using Cell to avoid borrow issues
    let changed = Cell::new(false);

    egui::ScrollArea::vertical().id_salt("settings_scroll").show(ui, |ui| {
        section(ui, view_state, SettingsSection::Ocr, "OCR", |ui| {
            let mut state = shared_state.write();
            let ocr = &mut state.config.ocr;

            ui.horizontal(|ui| {
                ui.label("Model directory:");
                let dir = ocr
                    .model_dir
                    .as_ref()
                    .map(|d| d.display().to_string())
                    .unwrap_or_else(|| "default".to_string());
                ui.label(RichText::new(dir).monospace().color(ThemeColors::TEXT_SECONDARY));
            });

            if ui.checkbox(&mut ocr.use_gpu, "Use GPU execution provider").changed() {
                changed.set(true);
            }
            if ui.checkbox(&mut ocr.offline, "Offline (never download models)").changed() {
                changed.set(true);
            }

            ui.add_space(8.0);
            slider(ui, "Pixel threshold:", &mut ocr.det_threshold, 0.05..=0.9, &changed);
            slider(ui, "Box threshold:", &mut ocr.box_threshold, 0.1..=0.95, &changed);
            slider(ui, "Unclip ratio:", &mut ocr.unclip_ratio, 1.0..=3.0, &changed);
            slider(ui, "Minimum confidence:", &mut ocr.min_confidence, 0.0..=1.0, &changed);

            ui.horizontal(|ui| {
                ui.label("Detection max side:");
                ui.add_space(8.0);
                if ui
                    .add(egui::Slider::new(&mut ocr.det_max_side, 320..=2560).step_by(32.0).suffix(" px"))
                    .changed()
                {
                    changed.set(true);
                }
            });

            ui.horizontal(|ui| {
                ui.label("Recognition max width:");
                ui.add_space(8.0);
                if ui
                    .add(egui::Slider::new(&mut ocr.rec_max_width, 160..=1280).suffix(" px"))
                    .changed()
                {
                    changed.set(true);
                }
            });
        });

        ui.add_space(12.0);

        section(ui, view_state, SettingsSection::Preprocessing, "Preprocessing", |ui| {
            let mut state = shared_state.write();
            let pre = &mut state.config.preprocessing;

            if ui.checkbox(&mut pre.apply_exif_orientation, "Apply EXIF orientation").changed() {
                changed.set(true);
            }
            if ui.checkbox(&mut pre.auto_rotate, "Auto-rotate sideways labels").changed() {
                changed.set(true);
            }

            ui.add_enabled_ui(pre.auto_rotate, |ui| {
                slider(ui, "Rotation ratio:", &mut pre.rotation_ratio, 1.0..=3.0, &changed);
            });

            ui.horizontal(|ui| {
                ui.label("Preview max side:");
                ui.add_space(8.0);
                if ui
                    .add(egui::Slider::new(&mut pre.max_side, 400..=4096).suffix(" px"))
                    .changed()
                {
                    changed.set(true);
                }
            });
            ui.label(
                RichText::new("Only affects the preprocessed preview")
                    .size(11.0)
                    .color(ThemeColors::TEXT_MUTED)
            );
        });

        ui.add_space(12.0);

        section(ui, view_state, SettingsSection::Interface, "Interface", |ui| {
            let mut state = shared_state.write();
            if ui
                .checkbox(&mut state.config.interface.show_bounding_boxes, "Draw detection boxes")
                .changed()
            {
                changed.set(true);
            }
        });

        ui.add_space(16.0);

        ui.horizontal(|ui| {
            if ui
                .add_enabled(
                    view_state.has_unsaved_changes || changed.get(),
                    egui::Button::new("Save").min_size(egui::vec2(100.0, 32.0)),
                )
                .clicked()
            {
                *pending_command = Some(LabelCommand::SaveSettings);
            }

            if ui
                .add(egui::Button::new("Reset to Defaults").min_size(egui::vec2(120.0, 32.0)))
                .clicked()
            {
                let mut state = shared_state.write();
                let model_dir = state.config.ocr.model_dir.take();
                state.config = AppConfig::default();
                state.config.ocr.model_dir = model_dir;
                changed.set(true);
            }

            if view_state.has_unsaved_changes {
                ui.add_space(8.0);
                ui.label(
                    RichText::new("Unsaved changes")
                        .size(12.0)
                        .color(ThemeColors::ACCENT_WARNING)
                );
            }
        });
    });

    if changed.get() {
        view_state.has_unsaved_changes = true;
    }
}

/// Collapsible settings section with a clickable header
fn section(
    ui: &mut egui::Ui,
    view_state: &mut SettingsViewState,
    which: SettingsSection,
    title: &str,
    add_contents: impl FnOnce(&mut egui::Ui),
) {
    let is_expanded = view_state.expanded_section == Some(which);
    theme::section_frame().show(ui, |ui| {
        ui.set_min_width(ui.available_width());
        let header_response = ui.horizontal(|ui| {
            let arrow = if is_expanded { "v" } else { ">" };
            ui.label(RichText::new(arrow).size(12.0).color(ThemeColors::TEXT_MUTED));
            ui.add_space(8.0);
            ui.heading(RichText::new(title).size(16.0));
        }).response;

        if header_response.interact(egui::Sense::click()).clicked() {
            view_state.expanded_section = if is_expanded { None } else { Some(which) };
        }

        if is_expanded {
            ui.add_space(12.0);
            ui.separator();
            ui.add_space(8.0);
            add_contents(ui);
        }
    });
}

fn slider(
    ui: &mut egui::Ui,
    label: &str,
    value: &mut f32,
    range: std::ops::RangeInclusive<f32>,
    changed: &Cell<bool>,
) {
    ui.horizontal(|ui| {
        ui.label(label);
        ui.add_space(8.0);
        if ui
            .add(egui::Slider::new(value, range).step_by(0.05).fixed_decimals(2))
            .changed()
        {
            changed.set(true);
        }
    });
}
