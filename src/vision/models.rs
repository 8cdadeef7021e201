//! Model management for ONNX Runtime
//!
//! Handles downloading, caching, and loading of the PaddleOCR models.

use anyhow::{Context, Result};
use futures_util::StreamExt;
use ort::execution_providers::CPUExecutionProvider;
use ort::session::{builder::GraphOptimizationLevel, Session};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

/// Environment variable that forbids model downloads
pub const OFFLINE_ENV: &str = "LABEL_OCR_OFFLINE";

/// Model identifier for PaddleOCR components
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelType {
    /// Text detection model (DBNet)
    Detection,
    /// Text recognition model (CRNN)
    Recognition,
    /// Character dictionary for recognition
    Dictionary,
}

impl ModelType {
    /// Everything the engine needs to start
    pub const REQUIRED: [ModelType; 3] = [
        ModelType::Detection,
        ModelType::Recognition,
        ModelType::Dictionary,
    ];

    /// Get the filename for this model type
    pub fn filename(&self) -> &'static str {
        match self {
            ModelType::Detection => "det.onnx",
            ModelType::Recognition => "rec.onnx",
            ModelType::Dictionary => "dict.txt",
        }
    }

    /// Get the download URL for this model
    /// Using PaddleOCR models from Hugging Face (monkt/paddleocr-onnx)
    pub fn download_url(&self) -> &'static str {
        match self {
            ModelType::Detection => {
                "https://huggingface.co/monkt/paddleocr-onnx/resolve/main/detection/v3/det.onnx"
            }
            ModelType::Recognition => {
                "https://huggingface.co/monkt/paddleocr-onnx/resolve/main/languages/english/rec.onnx"
            }
            ModelType::Dictionary => {
                "https://huggingface.co/monkt/paddleocr-onnx/resolve/main/languages/english/dict.txt"
            }
        }
    }

    /// Expected file size for integrity check (approximate, in bytes)
    pub fn expected_size_range(&self) -> (u64, u64) {
        match self {
            ModelType::Detection => (2_000_000, 5_000_000),    // ~2.43 MB
            ModelType::Recognition => (7_000_000, 10_000_000), // ~7.83 MB
            ModelType::Dictionary => (500, 10_000),            // ~1.42 KB
        }
    }

    /// Display name for progress reporting
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelType::Detection => "Text Detection",
            ModelType::Recognition => "Text Recognition",
            ModelType::Dictionary => "Character Dictionary",
        }
    }
}

/// Model manifest tracking downloaded models
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ModelManifest {
    pub version: String,
    pub models: Vec<ModelInfo>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ModelInfo {
    pub model_type: String,
    pub filename: String,
    pub size_bytes: u64,
    pub sha256: Option<String>,
    pub downloaded_at: String,
}

impl Default for ModelManifest {
    fn default() -> Self {
        Self {
            version: "1.0.0".to_string(),
            models: Vec::new(),
        }
    }
}

/// Progress callback for download operations
pub type DownloadProgressCallback = Box<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// Model manager for downloading and caching ONNX models
pub struct ModelManager {
    models_dir: PathBuf,
    offline: bool,
}

impl ModelManager {
    /// Create a model manager rooted in the application data directory
    pub fn new(offline: bool) -> Result<Self> {
        let data_dir = crate::storage::get_data_dir()?;
        Self::with_dir(data_dir.join("models"), offline)
    }

    /// Create model manager with custom directory
    pub fn with_dir(models_dir: PathBuf, offline: bool) -> Result<Self> {
        std::fs::create_dir_all(&models_dir)
            .with_context(|| format!("Failed to create models directory {:?}", models_dir))?;
        Ok(Self { models_dir, offline })
    }

    /// Get the models directory path
    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Whether downloads are disabled by config or environment
    pub fn is_offline(&self) -> bool {
        self.offline || std::env::var_os(OFFLINE_ENV).is_some()
    }

    /// Get the path to a specific model file
    pub fn model_path(&self, model_type: ModelType) -> PathBuf {
        self.models_dir.join(model_type.filename())
    }

    /// Check if a model is already downloaded
    pub fn is_model_available(&self, model_type: ModelType) -> bool {
        let path = self.model_path(model_type);
        match std::fs::metadata(&path) {
            Ok(metadata) => {
                let (min, max) = model_type.expected_size_range();
                let size = metadata.len();
                size >= min && size <= max
            }
            Err(_) => false,
        }
    }

    /// Check if all required models are available
    pub fn are_models_ready(&self) -> bool {
        ModelType::REQUIRED
            .iter()
            .all(|&model_type| self.is_model_available(model_type))
    }

    /// Get status of all models
    pub fn get_model_status(&self) -> Vec<(ModelType, bool, Option<u64>)> {
        ModelType::REQUIRED
            .iter()
            .map(|&model_type| {
                let path = self.model_path(model_type);
                let available = self.is_model_available(model_type);
                let size = std::fs::metadata(&path).ok().map(|m| m.len());
                (model_type, available, size)
            })
            .collect()
    }

    /// Download a model if not already available
    /// Returns the path to the model file
    pub fn ensure_model(&self, model_type: ModelType) -> Result<PathBuf> {
        let path = self.model_path(model_type);

        if self.is_model_available(model_type) {
            if self.verify_model(model_type)? {
                debug!("Model {:?} already available at {:?}", model_type, path);
                return Ok(path);
            }
            warn!("Model {:?} does not match its manifest checksum", model_type);
        }

        info!("Downloading model {:?}...", model_type);
        self.download_model_with_progress(model_type, None)?;

        Ok(path)
    }

    /// Compare a model file against the SHA256 recorded in the manifest.
    /// Files the manifest does not know about (placed by hand) pass.
    pub fn verify_model(&self, model_type: ModelType) -> Result<bool> {
        let manifest = self.load_manifest().unwrap_or_default();
        let Some(expected) = manifest
            .models
            .iter()
            .find(|m| m.filename == model_type.filename())
            .and_then(|m| m.sha256.clone())
        else {
            return Ok(true);
        };

        let data = std::fs::read(self.model_path(model_type))
            .with_context(|| format!("Failed to read {}", model_type.filename()))?;
        Ok(format!("{:x}", Sha256::digest(&data)) == expected)
    }

    /// Download every required model that is missing
    pub fn ensure_all_models(&self) -> Result<()> {
        for model_type in ModelType::REQUIRED {
            if self.is_model_available(model_type) {
                info!("Model {:?} already available, skipping download", model_type);
                continue;
            }

            let progress: DownloadProgressCallback = Box::new(move |downloaded, total| {
                debug!("{:?}: {} / {:?} bytes", model_type, downloaded, total);
            });
            self.download_model_with_progress(model_type, Some(progress))?;
        }
        Ok(())
    }

    /// Download a specific model with optional progress callback
    pub fn download_model_with_progress(
        &self,
        model_type: ModelType,
        progress: Option<DownloadProgressCallback>,
    ) -> Result<()> {
        let url = model_type.download_url();
        let path = self.model_path(model_type);

        if self.is_offline() {
            anyhow::bail!(
                "Offline mode: cannot download models. Please download manually from {} and place at {:?}",
                url,
                path
            );
        }

        info!("Downloading {} model from {}", model_type.display_name(), url);

        // Create a tokio runtime for async download
        let rt = Runtime::new().context("Failed to create tokio runtime")?;

        let hash = rt.block_on(async { self.download_file_async(url, &path, progress).await })?;

        if !self.is_model_available(model_type) {
            anyhow::bail!(
                "Downloaded {} but its size is outside the expected range",
                model_type.filename()
            );
        }

        self.record_in_manifest(model_type, hash)?;

        info!("Successfully downloaded {} model", model_type.display_name());
        Ok(())
    }

    /// Async download implementation, returns the SHA256 of the payload
    async fn download_file_async(
        &self,
        url: &str,
        path: &Path,
        progress: Option<DownloadProgressCallback>,
    ) -> Result<String> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300)) // 5 minute timeout
            .build()
            .context("Failed to create HTTP client")?;

        let response = client
            .get(url)
            .send()
            .await
            .context("Failed to send download request")?;

        if !response.status().is_success() {
            anyhow::bail!("Download failed with status {}: {}", response.status(), url);
        }

        let total_size = response.content_length();
        debug!("Download size: {:?} bytes", total_size);

        // Download next to the target so the rename stays on one filesystem
        let temp_path = path.with_extension("tmp");
        let mut file = std::fs::File::create(&temp_path).context("Failed to create temp file")?;

        let mut hasher = Sha256::new();
        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Error reading download stream")?;

            file.write_all(&chunk).context("Failed to write to temp file")?;

            hasher.update(&chunk);
            downloaded += chunk.len() as u64;

            if let Some(ref callback) = progress {
                callback(downloaded, total_size);
            }
        }

        file.flush().context("Failed to flush temp file")?;
        drop(file);

        std::fs::rename(&temp_path, path)
            .context("Failed to move downloaded file to final location")?;

        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Update manifest after successful download
    fn record_in_manifest(&self, model_type: ModelType, hash: String) -> Result<()> {
        let mut manifest = self.load_manifest().unwrap_or_default();
        let metadata = std::fs::metadata(self.model_path(model_type))?;

        let model_info = ModelInfo {
            model_type: format!("{:?}", model_type),
            filename: model_type.filename().to_string(),
            size_bytes: metadata.len(),
            sha256: Some(hash),
            downloaded_at: unix_timestamp(),
        };

        if let Some(existing) = manifest
            .models
            .iter_mut()
            .find(|m| m.filename == model_info.filename)
        {
            *existing = model_info;
        } else {
            manifest.models.push(model_info);
        }

        self.save_manifest(&manifest)
    }

    /// Load the model manifest
    pub fn load_manifest(&self) -> Result<ModelManifest> {
        let manifest_path = self.models_dir.join("manifest.json");
        if manifest_path.exists() {
            let content = std::fs::read_to_string(&manifest_path)?;
            let manifest: ModelManifest = serde_json::from_str(&content)?;
            Ok(manifest)
        } else {
            Ok(ModelManifest::default())
        }
    }

    /// Save the model manifest
    pub fn save_manifest(&self, manifest: &ModelManifest) -> Result<()> {
        let manifest_path = self.models_dir.join("manifest.json");
        let content = serde_json::to_string_pretty(manifest)?;
        std::fs::write(manifest_path, content)?;
        Ok(())
    }
}

/// ONNX Runtime session plus the name of its single input
pub struct OnnxSession {
    session: Session,
    input_name: String,
}

impl OnnxSession {
    /// Load a model, trying GPU execution providers first when asked to
    pub fn load(model_path: &Path, use_gpu: bool) -> Result<Self> {
        info!("Loading ONNX model from {:?}", model_path);

        let session = if use_gpu {
            match Self::build_gpu(model_path) {
                Ok(session) => session,
                Err(e) => {
                    warn!("GPU execution provider failed: {}", e);
                    warn!("Falling back to CPU execution provider");
                    Self::build_cpu(model_path)?
                }
            }
        } else {
            Self::build_cpu(model_path)?
        };

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "x".to_string());

        let output_names: Vec<String> = session
            .outputs
            .iter()
            .map(|output| output.name.clone())
            .collect();

        info!(
            "Model loaded. Input: {}, Outputs: {:?}",
            input_name, output_names
        );

        Ok(Self { session, input_name })
    }

    fn build_cpu(model_path: &Path) -> Result<Session> {
        Session::builder()?
            .with_execution_providers([CPUExecutionProvider::default().build()])?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(model_path)
            .with_context(|| format!("Failed to load ONNX model {:?}", model_path))
    }

    // DirectML on Windows, CUDA elsewhere
    fn build_gpu(model_path: &Path) -> Result<Session> {
        #[cfg(target_os = "windows")]
        let provider = ort::execution_providers::DirectMLExecutionProvider::default()
            .build()
            .error_on_failure();

        #[cfg(not(target_os = "windows"))]
        let provider = ort::execution_providers::CUDAExecutionProvider::default()
            .build()
            .error_on_failure();

        let session = Session::builder()?
            .with_execution_providers([provider])?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(model_path)?;

        info!("GPU execution provider initialized");
        Ok(session)
    }

    /// Name of the model input tensor
    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    /// Get the underlying session mutably for running inference
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }
}

/// Seconds since the Unix epoch, as a string
fn unix_timestamp() -> String {
    use std::time::SystemTime;

    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    format!("{}", now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager(offline: bool) -> (TempDir, ModelManager) {
        let dir = TempDir::new().unwrap();
        let manager = ModelManager::with_dir(dir.path().join("models"), offline).unwrap();
        (dir, manager)
    }

    #[test]
    fn test_model_type_filenames() {
        assert_eq!(ModelType::Detection.filename(), "det.onnx");
        assert_eq!(ModelType::Recognition.filename(), "rec.onnx");
        assert_eq!(ModelType::Dictionary.filename(), "dict.txt");
    }

    #[test]
    fn test_with_dir_creates_directory() {
        let (_dir, manager) = manager(true);
        assert!(manager.models_dir().is_dir());
        assert_eq!(
            manager.model_path(ModelType::Detection),
            manager.models_dir().join("det.onnx")
        );
    }

    #[test]
    fn test_empty_dir_is_not_ready() {
        let (_dir, manager) = manager(true);
        assert!(!manager.are_models_ready());

        let status = manager.get_model_status();
        assert_eq!(status.len(), 3);
        assert!(status.iter().all(|(_, available, size)| !available && size.is_none()));
    }

    #[test]
    fn test_size_range_check() {
        let (_dir, manager) = manager(true);
        let dict = manager.model_path(ModelType::Dictionary);

        std::fs::write(&dict, b"abc").unwrap();
        assert!(!manager.is_model_available(ModelType::Dictionary));

        std::fs::write(&dict, vec![b'a'; 1_000]).unwrap();
        assert!(manager.is_model_available(ModelType::Dictionary));
    }

    #[test]
    fn test_offline_refuses_download() {
        let (_dir, manager) = manager(true);
        assert!(manager.is_offline());

        let err = manager.ensure_model(ModelType::Detection).unwrap_err();
        assert!(err.to_string().contains("Offline mode"));
        assert!(!manager.model_path(ModelType::Detection).exists());
    }

    #[test]
    fn test_manifest_roundtrip() {
        let (_dir, manager) = manager(true);
        assert_eq!(manager.load_manifest().unwrap(), ModelManifest::default());

        let manifest = ModelManifest {
            version: "1.0.0".to_string(),
            models: vec![ModelInfo {
                model_type: "Detection".to_string(),
                filename: "det.onnx".to_string(),
                size_bytes: 42,
                sha256: None,
                downloaded_at: "0".to_string(),
            }],
        };
        manager.save_manifest(&manifest).unwrap();
        assert_eq!(manager.load_manifest().unwrap(), manifest);
    }

    const ABC_SHA256: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    #[test]
    fn test_record_in_manifest_replaces_entry() {
        let (_dir, manager) = manager(true);
        std::fs::write(manager.model_path(ModelType::Dictionary), b"abc").unwrap();

        manager
            .record_in_manifest(ModelType::Dictionary, "stale".to_string())
            .unwrap();
        manager
            .record_in_manifest(ModelType::Dictionary, ABC_SHA256.to_string())
            .unwrap();

        let manifest = manager.load_manifest().unwrap();
        assert_eq!(manifest.models.len(), 1);
        assert_eq!(manifest.models[0].size_bytes, 3);
        assert_eq!(manifest.models[0].sha256.as_deref(), Some(ABC_SHA256));
    }

    #[test]
    fn test_verify_model_against_manifest() {
        let (_dir, manager) = manager(true);
        let dict = manager.model_path(ModelType::Dictionary);
        std::fs::write(&dict, b"abc").unwrap();

        // Unknown to the manifest
        assert!(manager.verify_model(ModelType::Dictionary).unwrap());

        manager
            .record_in_manifest(ModelType::Dictionary, ABC_SHA256.to_string())
            .unwrap();
        assert!(manager.verify_model(ModelType::Dictionary).unwrap());

        std::fs::write(&dict, b"abd").unwrap();
        assert!(!manager.verify_model(ModelType::Dictionary).unwrap());
    }

    #[test]
    #[ignore = "requires network access"]
    fn test_download_all_models() {
        let (_dir, manager) = manager(false);
        manager.ensure_all_models().unwrap();
        assert!(manager.are_models_ready());
    }
}
