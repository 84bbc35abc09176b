//! Shared Utilities for the media_resize batch converter
//!
//! Infrastructure the pipeline builds on:
//! - Error type shared by every stage
//! - Logging (stderr + rotated file) and external tool records
//! - Resumable progress file
//! - Per-file / per-directory / global statistics and the report handoff
//! - JPEG segment codec and Exif orientation access
//! - FFprobe wrapper and deadlock-free ffmpeg invocation
//! - Timestamp-preserving copy

pub mod app_error;
pub mod checkpoint;
pub mod common_utils;
pub mod ffmpeg_process;
pub mod ffprobe;
pub mod file_copier;
pub mod logging;
pub mod metadata;
pub mod progress;
pub mod report;
pub mod stats;

pub use app_error::{AppError, Result};
pub use checkpoint::{progress_file_name, ProgressState, ProgressTracker, ResumeMode};
pub use ffprobe::{is_ffprobe_available, probe_video, HdrTransfer, VideoProbe};
pub use ffmpeg_process::{is_ffmpeg_available, run_ffmpeg};
pub use file_copier::copy_preserving_mtime;
pub use progress::{format_bytes, format_duration};
pub use report::{print_summary_report, ConsoleSummary, JsonReportWriter, RunTotals, StatsSink};
pub use stats::{
    Counters, Dimensions, DirectoryStats, FileRecord, GlobalStats, RecordKind, StatsAggregator,
};
