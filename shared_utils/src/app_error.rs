//! AppError - the error type shared by every stage of a batch run
//!
//! Callers decide scope (fatal / directory / file / soft) from where an error
//! surfaces, not from the variant, so variants only describe *what* failed.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::metadata::jpeg::SegmentError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("input directory does not exist: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("failed to scan {}: {source}", path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("{operation} failed for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error for {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to decode {}: {message}", path.display())]
    Decode { path: PathBuf, message: String },

    #[error("failed to encode {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("metadata segment error: {0}")]
    Metadata(#[from] SegmentError),

    #[error("ffprobe failed for {}: {message}", file_path.display())]
    FfprobeError { file_path: PathBuf, message: String },

    #[error("ffmpeg failed for {} (exit code {exit_code:?}): {stderr}", file_path.display())]
    FfmpegError {
        file_path: PathBuf,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("{tool_name} not found in PATH")]
    ToolNotFound { tool_name: String },
}

impl AppError {
    pub fn io(path: impl AsRef<Path>, operation: &'static str, source: std::io::Error) -> Self {
        AppError::Io {
            path: path.as_ref().to_path_buf(),
            operation,
            source,
        }
    }

    pub fn decode(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        AppError::Decode {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    /// The path the error is about, when there is one.
    pub fn path(&self) -> Option<&Path> {
        match self {
            AppError::InvalidConfig(_) | AppError::Metadata(_) | AppError::ToolNotFound { .. } => {
                None
            }
            AppError::InputNotFound(path) => Some(path),
            AppError::Scan { path, .. }
            | AppError::Io { path, .. }
            | AppError::Json { path, .. }
            | AppError::Decode { path, .. }
            | AppError::Encode { path, .. } => Some(path),
            AppError::FfprobeError { file_path, .. } | AppError::FfmpegError { file_path, .. } => {
                Some(file_path)
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
