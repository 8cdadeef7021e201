//! Storage Layer
//!
//! Platform directories for the configuration file and downloaded models.

use anyhow::Result;
use std::path::PathBuf;

/// Name of the configuration file inside the config directory
pub const CONFIG_FILE: &str = "config.toml";

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "labelocr", "LabelOcr")
        .ok_or_else(|| anyhow::anyhow!("Could not determine the home directory"))
}

/// Get the application data directory
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = project_dirs()?.data_dir().to_path_buf();
    std::fs::create_dir_all(&data_dir)?;

    Ok(data_dir)
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = project_dirs()?.config_dir().to_path_buf();
    std::fs::create_dir_all(&config_dir)?;

    Ok(config_dir)
}

/// Default location of the configuration file
pub fn default_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join(CONFIG_FILE))
}
