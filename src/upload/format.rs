//! Accepted upload formats

use std::fmt;
use std::path::Path;

use super::UploadError;

/// Image formats accepted for upload, decided by file extension only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFormat {
    Jpeg,
    Png,
}

impl UploadFormat {
    /// Extensions offered to the user
    pub const EXTENSIONS: [&'static str; 3] = ["jpg", "jpeg", "png"];

    /// Match an extension (without the dot), ignoring ASCII case
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(UploadFormat::Jpeg),
            "png" => Some(UploadFormat::Png),
            _ => None,
        }
    }

    /// Determine the format from a file name or path
    pub fn from_path(path: &Path) -> Result<Self, UploadError> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
            .ok_or_else(|| UploadError::UnsupportedExtension(path.display().to_string()))
    }
}

impl fmt::Display for UploadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadFormat::Jpeg => write!(f, "JPEG"),
            UploadFormat::Png => write!(f, "PNG"),
        }
    }
}
