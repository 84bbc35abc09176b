use clap::Parser;
use std::path::PathBuf;

use crate::config::{ConfigOptions, VideoSettings, DEFAULT_CRF, DEFAULT_PRESET, DEFAULT_VIDEO_CODEC};

#[derive(Parser, Debug)]
#[command(name = "media-resize")]
#[command(
    version,
    about = "Resize photo and video trees into a mirrored output tree, resumably",
    long_about = None
)]
pub struct Cli {
    /// Input root directory
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output root directory (also holds the progress file)
    #[arg(short, long)]
    pub output: PathBuf,

    /// Scale factor, 0 < ratio <= 10
    #[arg(short, long, conflicts_with = "width")]
    pub ratio: Option<f64>,

    /// Target width in pixels; height keeps the aspect ratio
    #[arg(short, long)]
    pub width: Option<u32>,

    /// Width threshold for skipping (0 = unset)
    #[arg(long, default_value_t = 0)]
    pub threshold_width: u32,

    /// Height threshold for skipping (0 = unset)
    #[arg(long, default_value_t = 0)]
    pub threshold_height: u32,

    /// Do not fill unset thresholds with resolution defaults
    #[arg(long)]
    pub ignore_smart_limit: bool,

    /// Only handle these extensions, comma-separated (e.g. "jpg,png")
    #[arg(short, long)]
    pub extensions: Option<String>,

    /// Log what would happen without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Copy videos instead of transcoding them
    #[arg(long)]
    pub disable_video: bool,

    #[arg(long, default_value = DEFAULT_VIDEO_CODEC)]
    pub video_codec: String,

    /// Target video bitrate (e.g. "5M"); replaces CRF
    #[arg(long)]
    pub video_bitrate: Option<String>,

    /// Explicit output resolution ("1280x720" or an ffmpeg scale expression)
    #[arg(long)]
    pub video_resolution: Option<String>,

    #[arg(long, default_value_t = DEFAULT_CRF)]
    pub crf: u8,

    #[arg(long, default_value = DEFAULT_PRESET)]
    pub preset: String,

    /// Number of directories processed in parallel
    #[arg(short = 'm', long = "multithread", default_value_t = 1)]
    pub workers: usize,

    /// Debug-level logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Directory for rotated log files (system temp dir when unset)
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

impl Cli {
    pub fn to_options(&self) -> ConfigOptions {
        let mut opts = ConfigOptions::new(&self.input, &self.output);
        opts.ratio = self.ratio;
        opts.width = self.width;
        opts.threshold_width = self.threshold_width;
        opts.threshold_height = self.threshold_height;
        opts.ignore_smart_limit = self.ignore_smart_limit;
        opts.extensions = self.extensions.clone();
        opts.dry_run = self.dry_run;
        opts.workers = self.workers;
        opts.video = VideoSettings {
            enabled: !self.disable_video,
            codec: self.video_codec.clone(),
            bitrate: self.video_bitrate.clone(),
            resolution: self.video_resolution.clone(),
            crf: self.crf,
            preset: self.preset.clone(),
        };
        opts
    }
}
