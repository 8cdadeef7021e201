//! Upload Intake
//!
//! Accepts a label image from a file path or a drag-and-drop event and
//! keeps the raw encoded bytes. Decoding happens later in the vision layer.

pub mod format;

pub use format::UploadFormat;

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::debug;

/// Errors raised while accepting an upload
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Unsupported file type: {0} (expected .jpg, .jpeg or .png)")]
    UnsupportedExtension(String),

    #[error("Uploaded file is empty: {0}")]
    Empty(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// An accepted label image
#[derive(Debug, Clone)]
pub struct Upload {
    /// File name shown to the user
    pub name: String,
    /// Format implied by the extension
    pub format: UploadFormat,
    /// Raw encoded image bytes
    pub bytes: Arc<[u8]>,
    /// When the upload was accepted
    pub received_at: Instant,
}

impl Upload {
    /// Read an upload from disk
    pub fn from_path(path: &Path) -> Result<Self, UploadError> {
        let format = UploadFormat::from_path(path)?;
        let bytes = std::fs::read(path).map_err(|source| UploadError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Self::build(name, format, bytes.into())
    }

    /// Accept a dropped file whose bytes are already in memory
    pub fn from_dropped(name: &str, bytes: Arc<[u8]>) -> Result<Self, UploadError> {
        let format = UploadFormat::from_path(Path::new(name))?;
        Self::build(name.to_string(), format, bytes)
    }

    fn build(name: String, format: UploadFormat, bytes: Arc<[u8]>) -> Result<Self, UploadError> {
        if bytes.is_empty() {
            return Err(UploadError::Empty(name));
        }

        debug!("Accepted upload {} ({}, {} bytes)", name, format, bytes.len());

        Ok(Self {
            name,
            format,
            bytes,
            received_at: Instant::now(),
        })
    }

    /// Size of the encoded image in bytes
    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_path_reads_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("label.png");
        std::fs::File::create(&path).unwrap().write_all(&[1, 2, 3]).unwrap();

        let upload = Upload::from_path(&path).unwrap();
        assert_eq!(upload.name, "label.png");
        assert_eq!(upload.format, UploadFormat::Png);
        assert_eq!(&*upload.bytes, &[1, 2, 3]);
        assert_eq!(upload.size_bytes(), 3);
    }

    #[test]
    fn test_from_path_missing_file() {
        let result = Upload::from_path(Path::new("/nonexistent/path/label.jpg"));
        assert!(matches!(result, Err(UploadError::Io { .. })));
    }

    #[test]
    fn test_extension_checked_before_reading() {
        let result = Upload::from_path(Path::new("/nonexistent/path/label.bmp"));
        assert!(matches!(result, Err(UploadError::UnsupportedExtension(_))));
    }

    #[test]
    fn test_empty_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.jpg");
        std::fs::File::create(&path).unwrap();

        assert!(matches!(Upload::from_path(&path), Err(UploadError::Empty(_))));
    }

    #[test]
    fn test_from_dropped() {
        let bytes: Arc<[u8]> = vec![0xFF, 0xD8, 0xFF].into();
        let upload = Upload::from_dropped("scan.JPG", bytes).unwrap();
        assert_eq!(upload.format, UploadFormat::Jpeg);

        let err = Upload::from_dropped("notes.txt", vec![1u8].into()).unwrap_err();
        assert!(err.to_string().contains("Unsupported file type"));
    }
}
