//! OCR Worker
//!
//! Owns the vision pipeline on a dedicated thread so the dashboard never
//! blocks on model loading, downloads, or inference. Requests are handled
//! one at a time, in the order they arrive.

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::shared::{OcrRequest, OcrResponse, RequestId};
use crate::vision::{VisionConfig, VisionPipeline};

/// Handle to the OCR worker thread
pub struct OcrWorker {
    /// Channel to send requests to the worker
    to_worker: Sender<OcrRequest>,
    /// Channel to receive responses from the worker
    from_worker: Receiver<OcrResponse>,
    /// Handle to worker thread
    handle: Option<JoinHandle<()>>,
    /// Id handed to the next `Run` request
    next_request_id: RequestId,
}

impl OcrWorker {
    /// Create the pipeline and start the worker thread
    pub fn spawn(config: VisionConfig) -> Result<Self> {
        let pipeline = VisionPipeline::with_config(config)?;
        let (to_worker, requests) = unbounded();
        let (responses, from_worker) = unbounded();

        let handle = std::thread::Builder::new()
            .name("ocr-worker".to_string())
            .spawn(move || {
                info!("OCR worker starting...");
                run_worker(pipeline, requests, responses);
                info!("OCR worker exiting...");
            })
            .context("Failed to spawn OCR worker thread")?;

        Ok(Self {
            to_worker,
            from_worker,
            handle: Some(handle),
            next_request_id: 1,
        })
    }

    fn send(&self, request: OcrRequest) -> Result<()> {
        self.to_worker
            .send(request)
            .map_err(|_| anyhow::anyhow!("OCR worker is not running"))
    }

    /// Queue raw upload bytes for OCR, returning the request id
    pub fn submit(&mut self, bytes: Arc<[u8]>) -> Result<RequestId> {
        let request_id = self.next_request_id;
        self.send(OcrRequest::Run { request_id, bytes })?;
        self.next_request_id += 1;
        Ok(request_id)
    }

    /// Replace the pipeline configuration
    pub fn reconfigure(&self, config: VisionConfig) -> Result<()> {
        self.send(OcrRequest::Reconfigure(config))
    }

    /// Ask the worker to download missing models
    pub fn download_models(&self) -> Result<()> {
        self.send(OcrRequest::DownloadModels)
    }

    /// Next response, if one is waiting
    pub fn try_recv(&self) -> Option<OcrResponse> {
        self.from_worker.try_recv().ok()
    }

    /// Wait up to `timeout` for the next response
    pub fn recv_timeout(&self, timeout: Duration) -> Option<OcrResponse> {
        match self.from_worker.recv_timeout(timeout) {
            Ok(response) => Some(response),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Check if the worker thread is alive
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for OcrWorker {
    fn drop(&mut self) {
        // Signal worker to stop
        let _ = self.to_worker.send(OcrRequest::Shutdown);

        // Wait for worker thread to finish
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("OCR worker thread panicked");
            }
        }
    }
}

fn run_worker(
    mut pipeline: VisionPipeline,
    requests: Receiver<OcrRequest>,
    responses: Sender<OcrResponse>,
) {
    let models_ready = pipeline.are_models_ready();
    if responses.send(OcrResponse::Reconfigured { models_ready }).is_err() {
        return;
    }

    for request in requests.iter() {
        let response = match request {
            OcrRequest::Run { request_id, bytes } => {
                debug!("Processing OCR request {} ({} bytes)", request_id, bytes.len());
                match pipeline.run_ocr(&bytes) {
                    Ok(result) => {
                        let report = result.into_report();
                        info!(
                            "Request {}: {} detections in {} ms, status {:?}",
                            request_id,
                            report.detections.len(),
                            report.processing_time_ms,
                            report.status()
                        );
                        OcrResponse::Completed { request_id, report }
                    }
                    Err(e) => {
                        warn!("OCR request {} failed: {:#}", request_id, e);
                        OcrResponse::Failed {
                            request_id,
                            error: format!("{:#}", e),
                        }
                    }
                }
            }
            OcrRequest::Reconfigure(config) => match pipeline.reconfigure(config) {
                Ok(()) => OcrResponse::Reconfigured {
                    models_ready: pipeline.are_models_ready(),
                },
                Err(e) => {
                    warn!("Reconfiguration failed: {:#}", e);
                    OcrResponse::Error(format!("{:#}", e))
                }
            },
            OcrRequest::DownloadModels => match pipeline.download_models() {
                Ok(()) => OcrResponse::ModelsDownloaded,
                Err(e) => {
                    warn!("Model download failed: {:#}", e);
                    OcrResponse::DownloadFailed(format!("{:#}", e))
                }
            },
            OcrRequest::Shutdown => break,
        };

        if responses.send(response).is_err() {
            // Nobody is listening any more
            break;
        }
    }

    pipeline.release_engine();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OcrSettings;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use tempfile::TempDir;

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn offline_config(dir: &TempDir) -> VisionConfig {
        VisionConfig {
            ocr: OcrSettings {
                model_dir: Some(dir.path().join("models")),
                offline: true,
                ..Default::default()
            },
            apply_exif_orientation: true,
        }
    }

    fn white_png() -> Arc<[u8]> {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 32, Rgb([255, 255, 255])));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes.into()
    }

    fn spawn_offline(dir: &TempDir) -> OcrWorker {
        let worker = OcrWorker::spawn(offline_config(dir)).unwrap();
        match worker.recv_timeout(TIMEOUT) {
            Some(OcrResponse::Reconfigured { models_ready }) => assert!(!models_ready),
            other => panic!("unexpected startup response: {:?}", other),
        }
        worker
    }

    #[test]
    fn test_worker_reports_missing_models() {
        let dir = TempDir::new().unwrap();
        let mut worker = spawn_offline(&dir);
        assert!(worker.is_running());

        let id = worker.submit(white_png()).unwrap();
        match worker.recv_timeout(TIMEOUT) {
            Some(OcrResponse::Failed { request_id, error }) => {
                assert_eq!(request_id, id);
                assert!(error.contains("Offline mode"));
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[test]
    fn test_request_ids_increase() {
        let dir = TempDir::new().unwrap();
        let mut worker = spawn_offline(&dir);

        let first = worker.submit(white_png()).unwrap();
        let second = worker.submit(white_png()).unwrap();
        assert!(second > first);

        let answered: Vec<_> = (0..2)
            .filter_map(|_| worker.recv_timeout(TIMEOUT))
            .filter_map(|r| r.request_id())
            .collect();
        assert_eq!(answered, vec![first, second]);
    }

    #[test]
    fn test_offline_download_fails() {
        let dir = TempDir::new().unwrap();
        let worker = spawn_offline(&dir);

        worker.download_models().unwrap();
        assert!(matches!(
            worker.recv_timeout(TIMEOUT),
            Some(OcrResponse::DownloadFailed(_))
        ));
    }

    #[test]
    fn test_reconfigure_acknowledged() {
        let dir = TempDir::new().unwrap();
        let worker = spawn_offline(&dir);

        let mut config = offline_config(&dir);
        config.ocr.box_threshold = 0.5;
        worker.reconfigure(config).unwrap();

        assert!(matches!(
            worker.recv_timeout(TIMEOUT),
            Some(OcrResponse::Reconfigured { models_ready: false })
        ));
    }

    #[test]
    fn test_drop_stops_worker() {
        let dir = TempDir::new().unwrap();
        let worker = spawn_offline(&dir);
        drop(worker);
    }
}
