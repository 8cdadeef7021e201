//! Status card component for the pipeline status row

use egui::{Color32, RichText, Vec2};
use crate::dashboard::theme::{self, ThemeColors};

/// A card displaying one piece of pipeline status
pub struct StatusCard {
    pub title: String,
    pub value: String,
    pub status: CardStatus,
    pub detail: Option<String>,
}

/// Status types for cards
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CardStatus {
    Ready,
    Idle,
    Busy,
    Error,
}

impl CardStatus {
    pub fn color(&self) -> Color32 {
        match self {
            CardStatus::Ready => ThemeColors::ACCENT_SUCCESS,
            CardStatus::Idle => ThemeColors::TEXT_SECONDARY,
            CardStatus::Busy => ThemeColors::ACCENT_WARNING,
            CardStatus::Error => ThemeColors::ACCENT_ERROR,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CardStatus::Ready => "Ready",
            CardStatus::Idle => "Idle",
            CardStatus::Busy => "Working",
            CardStatus::Error => "Attention",
        }
    }
}

impl StatusCard {
    pub fn new(title: impl Into<String>, value: impl Into<String>, status: CardStatus) -> Self {
        Self {
            title: title.into(),
            value: value.into(),
            status,
            detail: None,
        }
    }

    /// Extra line shown under the status label
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn show(&self, ui: &mut egui::Ui) {
        theme::section_frame().show(ui, |ui| {
            ui.set_min_width(180.0);

            ui.horizontal(|ui| {
                // Status indicator dot
                let dot_center = ui.cursor().left_top() + Vec2::new(6.0, 10.0);
                ui.painter().circle_filled(dot_center, 4.0, self.status.color());
                ui.add_space(16.0);

                ui.vertical(|ui| {
                    ui.label(
                        RichText::new(&self.title)
                            .size(12.0)
                            .color(ThemeColors::TEXT_MUTED)
                    );

                    ui.add_space(4.0);

                    ui.label(
                        RichText::new(&self.value)
                            .size(18.0)
                            .color(ThemeColors::TEXT_PRIMARY)
                            .strong()
                    );

                    ui.add_space(4.0);

                    ui.label(
                        RichText::new(self.status.label())
                            .size(11.0)
                            .color(self.status.color())
                    );

                    if let Some(detail) = &self.detail {
                        ui.label(
                            RichText::new(detail)
                                .size(11.0)
                                .color(ThemeColors::TEXT_SECONDARY)
                        );
                    }
                });
            });
        });
    }
}
