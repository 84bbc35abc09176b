//! Run configuration
//!
//! `ConfigOptions` is the raw, unvalidated input (the CLI fills it);
//! `RunConfig::from_options` validates it once and resolves smart threshold
//! defaults. Nothing mutates a `RunConfig` afterwards.

use std::path::PathBuf;
use tracing::info;

use shared_utils::checkpoint::progress_file_name;
use shared_utils::{AppError, Result};

use crate::threshold::smart_thresholds;

pub const DEFAULT_VIDEO_CODEC: &str = "libx265";
pub const DEFAULT_CRF: u8 = 23;
pub const DEFAULT_PRESET: &str = "medium";
pub const MAX_RATIO: f64 = 10.0;
pub const MAX_CRF: u8 = 51;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScaleMode {
    /// Multiply both sides by the factor.
    Ratio(f64),
    /// Fixed output width, height follows the aspect ratio.
    Width(u32),
    /// Dry-run without a scaling choice.
    Unscaled,
}

/// Resolution limits; 0 disables that axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Thresholds {
    pub width: u32,
    pub height: u32,
}

impl Thresholds {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Lowercase extension allow-list, parsed from `"jpg, PNG,.heic"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionFilter {
    raw: String,
    allowed: Vec<String>,
}

impl ExtensionFilter {
    /// `None` when the string names no extension at all.
    pub fn parse(raw: &str) -> Option<Self> {
        let allowed: Vec<String> = raw
            .split(',')
            .map(|e| e.trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        if allowed.is_empty() {
            return None;
        }
        Some(Self {
            raw: raw.to_string(),
            allowed,
        })
    }

    pub fn allows(&self, extension: &str) -> bool {
        self.allowed.iter().any(|e| e == extension)
    }

    /// The filter as the user typed it; keys the progress file name.
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSettings {
    pub enabled: bool,
    pub codec: String,
    pub bitrate: Option<String>,
    pub resolution: Option<String>,
    pub crf: u8,
    pub preset: String,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            bitrate: None,
            resolution: None,
            crf: DEFAULT_CRF,
            preset: DEFAULT_PRESET.to_string(),
        }
    }
}

/// Unvalidated settings.
#[derive(Debug, Clone)]
pub struct ConfigOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    pub ratio: Option<f64>,
    pub width: Option<u32>,
    pub threshold_width: u32,
    pub threshold_height: u32,
    pub ignore_smart_limit: bool,
    pub extensions: Option<String>,
    pub dry_run: bool,
    pub video: VideoSettings,
    pub workers: usize,
}

impl ConfigOptions {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            ratio: None,
            width: None,
            threshold_width: 0,
            threshold_height: 0,
            ignore_smart_limit: false,
            extensions: None,
            dry_run: false,
            video: VideoSettings::default(),
            workers: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub scale: ScaleMode,
    /// Effective thresholds, smart defaults already applied.
    pub thresholds: Thresholds,
    pub ignore_smart_limit: bool,
    pub extensions: Option<ExtensionFilter>,
    pub video: VideoSettings,
    pub workers: usize,
    pub dry_run: bool,
}

fn invalid(msg: impl Into<String>) -> AppError {
    AppError::InvalidConfig(msg.into())
}

impl RunConfig {
    pub fn from_options(opts: ConfigOptions) -> Result<Self> {
        if opts.input.as_os_str().is_empty() {
            return Err(invalid("input directory is required"));
        }
        if opts.output.as_os_str().is_empty() {
            return Err(invalid("output directory is required"));
        }

        let scale = match (opts.ratio, opts.width) {
            (Some(_), Some(_)) => {
                return Err(invalid("ratio and width are mutually exclusive"));
            }
            (Some(ratio), None) => {
                if !(ratio > 0.0 && ratio <= MAX_RATIO) {
                    return Err(invalid(format!(
                        "ratio must be greater than 0 and at most {}, got {}",
                        MAX_RATIO, ratio
                    )));
                }
                ScaleMode::Ratio(ratio)
            }
            (None, Some(width)) => {
                if width == 0 {
                    return Err(invalid("width must be greater than 0"));
                }
                ScaleMode::Width(width)
            }
            (None, None) if opts.dry_run => ScaleMode::Unscaled,
            (None, None) => {
                return Err(invalid("either ratio or width must be specified"));
            }
        };

        if opts.video.crf > MAX_CRF {
            return Err(invalid(format!(
                "crf must be between 0 and {}, got {}",
                MAX_CRF, opts.video.crf
            )));
        }

        if !opts.input.is_dir() {
            return Err(AppError::InputNotFound(opts.input));
        }

        let requested = Thresholds::new(opts.threshold_width, opts.threshold_height);
        let thresholds = if opts.ignore_smart_limit {
            requested
        } else {
            smart_thresholds(scale, requested)
        };
        if thresholds != requested {
            info!(
                "🧠 Smart limit: threshold {}x{} (use --ignore-smart-limit to disable)",
                thresholds.width, thresholds.height
            );
        }

        Ok(Self {
            input_dir: opts.input,
            output_dir: opts.output,
            scale,
            thresholds,
            ignore_smart_limit: opts.ignore_smart_limit,
            extensions: opts.extensions.as_deref().and_then(ExtensionFilter::parse),
            video: opts.video,
            workers: opts.workers,
            dry_run: opts.dry_run,
        })
    }

    pub fn progress_file(&self) -> PathBuf {
        self.output_dir
            .join(progress_file_name(self.extensions.as_ref().map(|f| f.raw())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn options(temp: &TempDir) -> ConfigOptions {
        ConfigOptions::new(temp.path(), temp.path().join("out"))
    }

    #[test]
    fn test_ratio_xor_width() {
        let temp = TempDir::new().unwrap();

        let mut both = options(&temp);
        both.ratio = Some(0.5);
        both.width = Some(800);
        assert!(matches!(
            RunConfig::from_options(both),
            Err(AppError::InvalidConfig(_))
        ));

        let neither = options(&temp);
        assert!(RunConfig::from_options(neither).is_err());

        let mut dry = options(&temp);
        dry.dry_run = true;
        assert_eq!(RunConfig::from_options(dry).unwrap().scale, ScaleMode::Unscaled);
    }

    #[test]
    fn test_ratio_range() {
        let temp = TempDir::new().unwrap();
        for bad in [0.0, -1.0, 10.5, f64::NAN] {
            let mut opts = options(&temp);
            opts.ratio = Some(bad);
            assert!(RunConfig::from_options(opts).is_err(), "ratio {} accepted", bad);
        }
        for good in [0.01, 1.0, 10.0] {
            let mut opts = options(&temp);
            opts.ratio = Some(good);
            assert!(RunConfig::from_options(opts).is_ok(), "ratio {} rejected", good);
        }
    }

    #[test]
    fn test_width_and_crf_validation() {
        let temp = TempDir::new().unwrap();
        let mut opts = options(&temp);
        opts.width = Some(0);
        assert!(RunConfig::from_options(opts).is_err());

        let mut opts = options(&temp);
        opts.width = Some(800);
        opts.video.crf = 52;
        assert!(RunConfig::from_options(opts).is_err());
    }

    #[test]
    fn test_missing_input_directory() {
        let temp = TempDir::new().unwrap();
        let mut opts = ConfigOptions::new(temp.path().join("missing"), temp.path().join("out"));
        opts.ratio = Some(0.5);
        assert!(matches!(
            RunConfig::from_options(opts),
            Err(AppError::InputNotFound(_))
        ));

        let mut opts = ConfigOptions::new("", temp.path());
        opts.ratio = Some(0.5);
        assert!(matches!(
            RunConfig::from_options(opts),
            Err(AppError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_smart_defaults_applied_unless_ignored() {
        let temp = TempDir::new().unwrap();

        let mut opts = options(&temp);
        opts.ratio = Some(0.5);
        let cfg = RunConfig::from_options(opts).unwrap();
        assert_eq!(cfg.thresholds, Thresholds::new(1920, 1080));

        let mut opts = options(&temp);
        opts.ratio = Some(2.0);
        opts.threshold_width = 5000;
        let cfg = RunConfig::from_options(opts).unwrap();
        assert_eq!(cfg.thresholds, Thresholds::new(5000, 2160));

        let mut opts = options(&temp);
        opts.ratio = Some(0.5);
        opts.ignore_smart_limit = true;
        let cfg = RunConfig::from_options(opts).unwrap();
        assert_eq!(cfg.thresholds, Thresholds::default());
    }

    #[test]
    fn test_extension_filter_parse() {
        let filter = ExtensionFilter::parse(" JPG, .png ,,heic").unwrap();
        assert!(filter.allows("jpg"));
        assert!(filter.allows("png"));
        assert!(filter.allows("heic"));
        assert!(!filter.allows("mp4"));
        assert_eq!(filter.raw(), " JPG, .png ,,heic");
        assert!(ExtensionFilter::parse(" , ").is_none());
    }

    #[test]
    fn test_progress_file_keyed_by_filter() {
        let temp = TempDir::new().unwrap();
        let mut opts = options(&temp);
        opts.ratio = Some(0.5);
        let cfg = RunConfig::from_options(opts.clone()).unwrap();
        assert_eq!(cfg.progress_file(), temp.path().join("out").join("progress.json"));

        opts.extensions = Some("jpg, png".to_string());
        let cfg = RunConfig::from_options(opts).unwrap();
        assert_eq!(
            cfg.progress_file(),
            temp.path().join("out").join("progress_jpg_png.json")
        );
    }
}
