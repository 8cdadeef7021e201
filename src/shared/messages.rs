//! Message types for communication between dashboard and OCR worker

use std::sync::Arc;

use crate::extraction::LabelReport;
use crate::vision::VisionConfig;

/// Identifies one OCR request so stale responses can be ignored
pub type RequestId = u64;

/// Messages sent to the OCR worker
#[derive(Debug, Clone)]
pub enum OcrRequest {
    /// Run OCR and extraction on raw upload bytes
    Run { request_id: RequestId, bytes: Arc<[u8]> },
    /// Replace the pipeline configuration (releases the engine)
    Reconfigure(VisionConfig),
    /// Download any missing models
    DownloadModels,
    /// Stop the worker thread
    Shutdown,
}

/// Messages sent from the OCR worker
#[derive(Debug, Clone)]
pub enum OcrResponse {
    /// OCR finished for a request
    Completed { request_id: RequestId, report: LabelReport },
    /// OCR failed for a request
    Failed { request_id: RequestId, error: String },
    /// All models are present
    ModelsDownloaded,
    /// Model download failed
    DownloadFailed(String),
    /// New configuration is active
    Reconfigured { models_ready: bool },
    /// Error not tied to a request
    Error(String),
}

impl OcrResponse {
    /// Request this response answers, if any
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            OcrResponse::Completed { request_id, .. } | OcrResponse::Failed { request_id, .. } => {
                Some(*request_id)
            }
            _ => None,
        }
    }
}
