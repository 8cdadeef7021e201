//! Dashboard UI Module
//!
//! Single-page egui dashboard: load a label, preview it, run OCR on the
//! worker thread and show the extracted `_1_` line.

pub mod app;
pub mod components;
pub mod state;
pub mod theme;
pub mod views;

pub use app::{run_dashboard, LabelApp};
pub use state::{LabelCommand, LabelViewState};
