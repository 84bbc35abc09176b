//! media_resize - resumable batch resizer for photo and video trees
//!
//! The input tree is walked once, deepest directory first, and the list is
//! persisted so an interrupted run picks up where it stopped. Each directory
//! is processed by one worker; its files go one at a time through the image,
//! video or copy pipeline into the mirrored output tree.

pub mod classifier;
pub mod cli;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod heic;
pub mod image_conversion;
pub mod pipeline;
pub mod scanner;
pub mod scheduler;
pub mod threshold;
pub mod video_conversion;

pub use classifier::{FileKind, ImageFormat};
pub use config::{ConfigOptions, RunConfig, ScaleMode, Thresholds, VideoSettings};
pub use context::RunContext;
pub use dispatch::process_directory;
pub use scanner::scan_directories;
pub use scheduler::{run, RunReport};
pub use threshold::{ScaleDirection, ThresholdPolicy};
