//! Client-side checks run before a video is sent to the server.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub const ALLOWED_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv"];
pub const MAX_UPLOAD_BYTES: u64 = 500 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadRejection {
    NoFileName,
    UnsupportedType { extension: String },
    TooLarge { bytes: u64 },
}

impl fmt::Display for UploadRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadRejection::NoFileName => write!(f, "No file selected"),
            UploadRejection::UnsupportedType { extension } => write!(
                f,
                "Invalid file type '{}'. Please upload a valid video file (MP4, MOV, AVI, MKV)",
                extension
            ),
            UploadRejection::TooLarge { bytes } => write!(
                f,
                "File size too large ({}). Please upload a video smaller than 500MB.",
                format_file_size(*bytes)
            ),
        }
    }
}

impl std::error::Error for UploadRejection {}

/// A video that passed validation and is ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoUpload {
    pub path: PathBuf,
    pub file_name: String,
    pub size_bytes: u64,
    /// Set when the file name advertises an algal-bloom dive.
    pub algal_bloom_alert: bool,
}

pub fn validate_video(file_name: &str, size_bytes: u64) -> Result<(), UploadRejection> {
    if file_name.trim().is_empty() {
        return Err(UploadRejection::NoFileName);
    }
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(UploadRejection::UnsupportedType { extension });
    }
    if size_bytes > MAX_UPLOAD_BYTES {
        return Err(UploadRejection::TooLarge { bytes: size_bytes });
    }
    Ok(())
}

pub fn has_algal_bloom_marker(file_name: &str) -> bool {
    file_name.to_lowercase().contains("algal_bloom")
}

/// Inspect a file on disk and validate it for upload.
pub fn prepare_upload(path: &Path) -> Result<VideoUpload> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let size_bytes = std::fs::metadata(path)
        .with_context(|| format!("cannot read {}", path.display()))?
        .len();
    validate_video(&file_name, size_bytes)?;
    Ok(VideoUpload {
        path: path.to_path_buf(),
        algal_bloom_alert: has_algal_bloom_marker(&file_name),
        file_name,
        size_bytes,
    })
}

pub fn format_file_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} bytes", bytes)
    } else if bytes < 1_048_576 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / 1_048_576.0)
    }
}
