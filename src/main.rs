//! Label OCR - extracts the `_1_` line from shipping label photos
//!
//! Runs PaddleOCR models locally through ONNX Runtime. Starts the dashboard
//! by default; `--image` processes one file headlessly and prints the report.

mod app;
mod config;
mod dashboard;
mod extraction;
mod shared;
mod storage;
mod upload;
mod vision;

use anyhow::{Context, Result};
use clap::Parser;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::extraction::LabelReport;
use crate::shared::SharedAppState;
use crate::upload::Upload;
use crate::vision::{VisionConfig, VisionPipeline};

/// Label OCR - find the line carrying the `_1_` marker on a shipping label
#[derive(Parser, Debug)]
#[command(name = "label-ocr")]
#[command(about = "Extracts the `_1_` line from shipping label images")]
struct Args {
    /// Process this image headlessly instead of opening the dashboard
    #[arg(short, long, value_name = "PATH")]
    image: Option<PathBuf>,

    /// Print the report as JSON (with --image)
    #[arg(long, requires = "image")]
    json: bool,

    /// Write the preprocessed (auto-rotated) image here (with --image)
    #[arg(long, value_name = "PATH", requires = "image")]
    save_preprocessed: Option<PathBuf>,

    /// Configuration file to use instead of the platform default
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory holding the OCR models
    #[arg(long, value_name = "DIR")]
    models_dir: Option<PathBuf>,

    /// Try a GPU execution provider first
    #[arg(long)]
    gpu: bool,

    /// Download the OCR models and exit
    #[arg(long, conflicts_with = "image")]
    download_models: bool,
}

fn main() -> Result<()> {
    // Logs go to stderr so headless output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => storage::default_config_path()?,
    };
    let mut config = load_or_create_config(&config_path);
    apply_overrides(&mut config, &args);

    if args.download_models {
        return download_models(&config);
    }

    if let Some(image) = &args.image {
        return run_headless(image, &args, &config);
    }

    info!("Label OCR starting...");
    let shared_state = Arc::new(RwLock::new(SharedAppState::new(config)));
    run_with_dashboard(shared_state, config_path)?;
    info!("Label OCR shutdown complete");

    Ok(())
}

/// Load configuration from file, falling back to defaults
fn load_or_create_config(config_path: &Path) -> AppConfig {
    if config_path.exists() {
        match config::load_config(config_path) {
            Ok(config) => {
                info!("Loaded configuration from {:?}", config_path);
                return config;
            }
            Err(e) => warn!("Ignoring configuration: {:#}", e),
        }
    }
    info!("Using default configuration");
    AppConfig::default()
}

/// Command-line flags win over the configuration file
fn apply_overrides(config: &mut AppConfig, args: &Args) {
    if let Some(dir) = &args.models_dir {
        config.ocr.model_dir = Some(dir.clone());
    }
    if args.gpu {
        config.ocr.use_gpu = true;
    }
}

fn download_models(config: &AppConfig) -> Result<()> {
    let pipeline = VisionPipeline::with_config(VisionConfig::from(config))?;
    pipeline.download_models()?;

    for (model, available, size) in pipeline.get_model_status() {
        info!(
            "{}: {} ({} bytes)",
            model.display_name(),
            if available { "ready" } else { "missing" },
            size.unwrap_or(0)
        );
    }
    Ok(())
}

/// Process one image and print the report
fn run_headless(image: &Path, args: &Args, config: &AppConfig) -> Result<()> {
    let upload = Upload::from_path(image)?;
    info!("Processing {} ({} bytes)", upload.name, upload.size_bytes());

    if let Some(out) = &args.save_preprocessed {
        let normalized = vision::preprocess_image(&upload.bytes, &config.preprocessing)?;
        normalized
            .image
            .save(out)
            .with_context(|| format!("Failed to write preprocessed image {:?}", out))?;
        info!(
            "Saved preprocessed image to {:?} (auto-rotated: {})",
            out, normalized.auto_rotated
        );
    }

    let mut pipeline = VisionPipeline::with_config(VisionConfig::from(config))?;
    let report = pipeline.run_ocr(&upload.bytes)?.into_report();

    if args.json {
        println!("{}", report_json(&upload.name, &report)?);
    } else {
        print!("{}", report.render_text());
    }

    Ok(())
}

fn report_json(file: &str, report: &LabelReport) -> Result<String> {
    let value = serde_json::json!({
        "file": file,
        "status": report.status(),
        "extraction": report.extraction,
        "detections": report.detections,
        "processing_time_ms": report.processing_time_ms,
    });
    Ok(serde_json::to_string_pretty(&value)?)
}

/// Run the dashboard (blocking)
fn run_with_dashboard(shared_state: Arc<RwLock<SharedAppState>>, config_path: PathBuf) -> Result<()> {
    info!("Running in dashboard mode");

    if let Err(e) = dashboard::run_dashboard(shared_state, config_path) {
        tracing::error!("Dashboard error: {}", e);
    }

    Ok(())
}
