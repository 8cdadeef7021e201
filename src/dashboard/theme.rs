//! Dashboard theme and styling
//!
//! Dark slate surfaces with an amber accent for the `_1_` marker, so the
//! extracted line stands out from the rest of the OCR output.

use egui::{Color32, FontFamily, FontId, Rounding, Stroke, TextStyle, Visuals};

/// Color palette
pub struct ThemeColors;

impl ThemeColors {
    // Surfaces, darkest first
    pub const BG_DARK: Color32 = Color32::from_rgb(20, 22, 27);
    pub const BG_MEDIUM: Color32 = Color32::from_rgb(30, 33, 40);
    pub const BG_LIGHT: Color32 = Color32::from_rgb(41, 45, 54);
    pub const BG_HOVER: Color32 = Color32::from_rgb(53, 58, 69);

    pub const ACCENT_PRIMARY: Color32 = Color32::from_rgb(96, 165, 250);
    pub const ACCENT_SUCCESS: Color32 = Color32::from_rgb(74, 196, 128);
    pub const ACCENT_WARNING: Color32 = Color32::from_rgb(245, 180, 60);
    pub const ACCENT_ERROR: Color32 = Color32::from_rgb(232, 90, 80);

    /// Rows and boxes carrying the marker
    pub const MARKER: Color32 = Color32::from_rgb(255, 196, 0);

    pub const TEXT_PRIMARY: Color32 = Color32::from_rgb(236, 238, 242);
    pub const TEXT_SECONDARY: Color32 = Color32::from_rgb(163, 169, 181);
    pub const TEXT_MUTED: Color32 = Color32::from_rgb(108, 114, 128);

    pub const BORDER: Color32 = Color32::from_rgb(58, 63, 76);
}

const WIDGET_ROUNDING: Rounding = Rounding::same(5.0);

/// Apply the dashboard theme to egui
pub fn apply_theme(ctx: &egui::Context) {
    let mut style = (*ctx.style()).clone();
    let mut visuals = Visuals::dark();

    visuals.window_fill = ThemeColors::BG_MEDIUM;
    visuals.panel_fill = ThemeColors::BG_DARK;
    visuals.faint_bg_color = ThemeColors::BG_LIGHT;
    visuals.extreme_bg_color = ThemeColors::BG_DARK;

    // (state, fill, text) for every interaction state
    let widgets = &mut visuals.widgets;
    for (state, fill, text) in [
        (&mut widgets.noninteractive, ThemeColors::BG_MEDIUM, ThemeColors::TEXT_SECONDARY),
        (&mut widgets.inactive, ThemeColors::BG_LIGHT, ThemeColors::TEXT_PRIMARY),
        (&mut widgets.hovered, ThemeColors::BG_HOVER, ThemeColors::TEXT_PRIMARY),
        (&mut widgets.active, ThemeColors::ACCENT_PRIMARY, ThemeColors::BG_DARK),
        (&mut widgets.open, ThemeColors::BG_HOVER, ThemeColors::TEXT_PRIMARY),
    ] {
        state.bg_fill = fill;
        state.weak_bg_fill = fill;
        state.fg_stroke = Stroke::new(1.0, text);
        state.rounding = WIDGET_ROUNDING;
    }

    visuals.selection.bg_fill = color_with_alpha(ThemeColors::MARKER, 70);
    visuals.selection.stroke = Stroke::new(1.0, ThemeColors::MARKER);
    visuals.hyperlink_color = ThemeColors::ACCENT_PRIMARY;

    visuals.window_rounding = Rounding::same(8.0);
    visuals.window_stroke = Stroke::new(1.0, ThemeColors::BORDER);
    visuals.menu_rounding = WIDGET_ROUNDING;

    style.visuals = visuals;
    style.spacing.item_spacing = egui::vec2(8.0, 6.0);
    style.spacing.button_padding = egui::vec2(12.0, 6.0);

    style.text_styles = [
        (TextStyle::Small, FontId::new(12.0, FontFamily::Proportional)),
        (TextStyle::Body, FontId::new(15.0, FontFamily::Proportional)),
        (TextStyle::Monospace, FontId::new(15.0, FontFamily::Monospace)),
        (TextStyle::Button, FontId::new(15.0, FontFamily::Proportional)),
        (TextStyle::Heading, FontId::new(22.0, FontFamily::Proportional)),
    ]
    .into();

    ctx.set_style(style);
}

/// Helper to create a color with modified alpha
pub fn color_with_alpha(color: Color32, alpha: u8) -> Color32 {
    Color32::from_rgba_unmultiplied(color.r(), color.g(), color.b(), alpha)
}

/// Rounded panel used for every section of the page
pub fn section_frame() -> egui::Frame {
    egui::Frame::none()
        .fill(ThemeColors::BG_MEDIUM)
        .stroke(Stroke::new(1.0, ThemeColors::BG_LIGHT))
        .rounding(Rounding::same(8.0))
        .inner_margin(16.0)
}

/// Dark well behind the image previews
pub fn preview_frame() -> egui::Frame {
    egui::Frame::none()
        .fill(ThemeColors::BG_DARK)
        .stroke(Stroke::new(1.0, ThemeColors::BORDER))
        .rounding(Rounding::same(4.0))
        .inner_margin(4.0)
}

/// Tinted panel for result messages
pub fn callout_frame(accent: Color32) -> egui::Frame {
    egui::Frame::none()
        .fill(color_with_alpha(accent, 30))
        .stroke(Stroke::new(1.0, accent))
        .rounding(Rounding::same(6.0))
        .inner_margin(12.0)
}

/// Stroke color for an upload area, highlighted while a file hovers over the window
pub fn drop_zone_stroke(hovering: bool) -> Stroke {
    if hovering {
        Stroke::new(1.5, ThemeColors::MARKER)
    } else {
        Stroke::new(1.0, ThemeColors::BORDER)
    }
}
