//! Shared state and messaging between the dashboard and the OCR worker
//!
//! This module provides thread-safe shared state and message passing
//! for communication between the dashboard UI and the worker thread.

pub mod messages;
pub mod state;

pub use messages::{OcrRequest, OcrResponse, RequestId};
pub use state::{RuntimeState, SharedAppState};
