//! File routing by extension.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use shared_utils::common_utils::{get_extension_lowercase, is_os_metadata_file};

use crate::config::{ExtensionFilter, RunConfig};

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mkv", "mov", "wmv", "flv", "webm", "m4v"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Heic,
}

impl ImageFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            "heic" => Some(ImageFormat::Heic),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Image(ImageFormat),
    Video,
    Other,
}

impl FileKind {
    /// Verb for the dry-run line ("Would process image: ...").
    pub fn action(self) -> &'static str {
        match self {
            FileKind::Image(_) => "process image",
            FileKind::Video => "process video",
            FileKind::Other => "copy",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// `._*` sidecars: dropped without a trace.
    OsMetadata,
    /// Excluded by the extension filter.
    Filtered,
    Route(FileKind),
}

/// Kind for a lowercase extension. Videos fall back to a copy when video
/// processing is off.
pub fn kind_for_extension(ext: &str, video_enabled: bool) -> FileKind {
    if let Some(format) = ImageFormat::from_extension(ext) {
        FileKind::Image(format)
    } else if video_enabled && VIDEO_EXTENSIONS.contains(&ext) {
        FileKind::Video
    } else {
        FileKind::Other
    }
}

pub struct Classifier<'a> {
    filter: Option<&'a ExtensionFilter>,
    video_enabled: bool,
}

impl<'a> Classifier<'a> {
    pub fn new(config: &'a RunConfig) -> Self {
        Self {
            filter: config.extensions.as_ref(),
            video_enabled: config.video.enabled,
        }
    }

    pub fn classify(&self, path: &Path) -> Classification {
        if is_os_metadata_file(path) {
            return Classification::OsMetadata;
        }
        let ext = get_extension_lowercase(path);
        if let Some(filter) = self.filter {
            if !filter.allows(&ext) {
                return Classification::Filtered;
            }
        }
        Classification::Route(kind_for_extension(&ext, self.video_enabled))
    }
}

/// Where a file's converted output goes. HEIC sources become `.jpg`;
/// everything else keeps its name.
pub fn output_path(out_dir: &Path, file_name: &OsStr, kind: FileKind) -> PathBuf {
    let path = out_dir.join(file_name);
    match kind {
        FileKind::Image(ImageFormat::Heic) => path.with_extension("jpg"),
        _ => path,
    }
}
