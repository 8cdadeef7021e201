//! Dashboard views

pub mod label;
pub mod settings;

pub use label::render_label_view;
pub use settings::render_settings_view;
